//! Station endpoints.
//!
//! - GET /api/v1/stations
//! - GET /api/v1/stations/current
//! - GET /api/v1/stations/schedule/upcoming
//! - GET /api/v1/stations/:id

use axum::extract::{Path, State};
use axum::Json;
use chrono::Duration;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::dec_to_f64;
use crate::services::calendar::{current_instant, is_announcement_time, week_start};
use crate::services::schedule::{resolve_with_db, ScheduleMatch};

/// Number of weekly schedule rows returned by the upcoming listing.
const UPCOMING_WEEKS: i64 = 4;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationResponse {
    /// Station identifier (e.g. "IMAYAG30")
    pub id: String,
    pub name: String,
    pub location_desc: Option<String>,
    /// Latitude (WGS84)
    pub latitude: f64,
    /// Longitude (WGS84)
    pub longitude: f64,
    /// Weather Underground dashboard URL
    pub wunderground_url: Option<String>,
}

impl From<models::Station> for StationResponse {
    fn from(s: models::Station) -> Self {
        Self {
            id: s.id,
            name: s.name,
            location_desc: s.location_desc,
            latitude: dec_to_f64(s.latitude),
            longitude: dec_to_f64(s.longitude),
            wunderground_url: s.wunderground_url,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentStationResponse {
    pub station: StationResponse,
    /// Monday of the current contest week (YYYY-MM-DD)
    pub week_start: String,
    /// "exact-date" when today is pinned by an override, otherwise "week-start"
    pub matched: String,
    /// True on Friday from 18:00 AST, when next week's station is revealed
    pub is_announcement_time: bool,
    /// Next week's station, only during announcement time
    pub next_week: Option<StationResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleEntry {
    /// Monday of the scheduled week (YYYY-MM-DD)
    pub week_start: String,
    pub station_id: String,
    pub station_name: String,
    /// When the week was announced, RFC 3339
    pub announced_at: Option<String>,
}

impl From<models::ScheduleWithStation> for ScheduleEntry {
    fn from(s: models::ScheduleWithStation) -> Self {
        Self {
            week_start: s.week_start.to_string(),
            station_id: s.station_id,
            station_name: s.station_name,
            announced_at: s.announced_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

async fn load_station(state: &AppState, id: &str) -> Result<models::Station, AppError> {
    queries::get_station(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Station {} not found", id)))
}

/// List all contest stations.
#[utoipa::path(
    get,
    path = "/api/v1/stations",
    tag = "Stations",
    responses(
        (status = 200, description = "All stations", body = Vec<StationResponse>),
    )
)]
pub async fn list_stations(
    State(state): State<AppState>,
) -> Result<Json<Vec<StationResponse>>, AppError> {
    let stations = queries::list_stations(&state.pool).await?;
    Ok(Json(
        stations.into_iter().map(StationResponse::from).collect(),
    ))
}

/// Get one station.
#[utoipa::path(
    get,
    path = "/api/v1/stations/{id}",
    tag = "Stations",
    params(
        ("id" = String, Path, description = "Station identifier"),
    ),
    responses(
        (status = 200, description = "Station details", body = StationResponse),
        (status = 404, description = "Station not found", body = ErrorResponse),
    )
)]
pub async fn get_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StationResponse>, AppError> {
    Ok(Json(load_station(&state, &id).await?.into()))
}

/// Station active today, and next week's station once it is announced.
#[utoipa::path(
    get,
    path = "/api/v1/stations/current",
    tag = "Stations",
    responses(
        (status = 200, description = "Current station", body = CurrentStationResponse),
        (status = 404, description = "No station scheduled this week", body = ErrorResponse),
    )
)]
pub async fn current_station(
    State(state): State<AppState>,
) -> Result<Json<CurrentStationResponse>, AppError> {
    let now = current_instant(state.clock.as_ref());
    let today = now.date_naive();

    let resolved = resolve_with_db(&state.pool, &state.overrides, today).await?;
    let station = load_station(&state, &resolved.station_id).await?;

    let announcing = is_announcement_time(now);
    let next_week: Option<StationResponse> = if announcing {
        let next_monday = week_start(today) + Duration::days(7);
        match resolve_with_db(&state.pool, &state.overrides, next_monday).await {
            Ok(next) => Some(load_station(&state, &next.station_id).await?.into()),
            Err(AppError::Contest(_)) => {
                tracing::warn!("Announcement time but no station scheduled for week of {}", next_monday);
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    Ok(Json(CurrentStationResponse {
        station: station.into(),
        week_start: week_start(today).to_string(),
        matched: match resolved.matched {
            ScheduleMatch::ExactDate => "exact-date".to_string(),
            ScheduleMatch::WeekStart => "week-start".to_string(),
        },
        is_announcement_time: announcing,
        next_week,
    }))
}

/// Scheduled weeks from last week onwards.
#[utoipa::path(
    get,
    path = "/api/v1/stations/schedule/upcoming",
    tag = "Stations",
    responses(
        (status = 200, description = "Upcoming weekly schedule", body = Vec<ScheduleEntry>),
    )
)]
pub async fn upcoming_schedule(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let today = current_instant(state.clock.as_ref()).date_naive();
    let from = week_start(today) - Duration::days(7);
    let rows = queries::get_upcoming_schedules(&state.pool, from, UPCOMING_WEEKS).await?;
    Ok(Json(rows.into_iter().map(ScheduleEntry::from).collect()))
}
