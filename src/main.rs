// Forecast Contest API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::calendar::SystemClock;
use services::normalizer::display_table_agrees;
use services::schedule::ScheduleOverrides;

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// Forecast Contest API: OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Forecast Contest API",
        version = "0.1.0",
        description = "Daily weather forecasting contest. Players predict tomorrow's high, \
            low, peak gust and precipitation bucket at the station of the week before \
            17:00 AST; forecasts are scored against the station's reading and ranked \
            on daily, weekly, monthly and all-time leaderboards.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Stations", description = "Stations and the weekly rotation"),
        (name = "Forecasts", description = "Submission window and forecast submission"),
        (name = "Users", description = "Players, their forecasts and scores"),
        (name = "Scores", description = "Scores per contest date"),
        (name = "Leaderboard", description = "Standings and competition statistics"),
        (name = "Admin", description = "Scoring, reading import and total reconciliation"),
    ),
    paths(
        routes::health::health_check,
        routes::stations::list_stations,
        routes::stations::get_station,
        routes::stations::current_station,
        routes::stations::upcoming_schedule,
        routes::forecasts::forecast_status,
        routes::forecasts::create_forecast,
        routes::users::register_user,
        routes::users::forecast_history,
        routes::users::today_forecast,
        routes::users::score_history,
        routes::scores::scores_by_date,
        routes::leaderboard::get_leaderboard,
        routes::leaderboard::get_stats,
        routes::admin::calculate_scores,
        routes::admin::import_readings,
        routes::admin::reimport,
        routes::admin::reconcile,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::Pagination,
            routes::stations::StationResponse,
            routes::stations::CurrentStationResponse,
            routes::stations::ScheduleEntry,
            routes::forecasts::SubmitForecastRequest,
            routes::forecasts::ForecastResponse,
            routes::forecasts::WindowResponse,
            routes::forecasts::BucketResponse,
            routes::forecasts::ForecastStatusResponse,
            routes::users::RegisterRequest,
            routes::users::UserResponse,
            routes::users::ScorePoints,
            routes::users::ForecastHistoryEntry,
            routes::users::ForecastHistoryResponse,
            routes::users::TodayForecastResponse,
            routes::users::ScoreHistoryEntry,
            routes::users::ScoreSummaryResponse,
            routes::users::ScoreHistoryResponse,
            routes::scores::DateScoreEntry,
            routes::scores::ReadingSummary,
            routes::scores::DateScoresResponse,
            routes::leaderboard::LeaderboardEntry,
            routes::leaderboard::LeaderboardResponse,
            routes::leaderboard::TopScorer,
            routes::leaderboard::StatsResponse,
            routes::admin::ReimportRequest,
            routes::admin::ReimportResponse,
            services::scoring::ScoreResult,
            services::scoring::ScoreBreakdown,
            services::scoring::AxisBreakdown,
            services::score_runner::ScoringTally,
            services::readings::ImportTally,
            services::readings::ImportFailure,
            services::reconcile::ReconcileReport,
            services::reconcile::TotalDrift,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forecast_contest_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Station schedule overrides
    let overrides = match &config.schedule_overrides {
        Some(path) => {
            let overrides =
                ScheduleOverrides::load(Path::new(path)).expect("Failed to load schedule overrides");
            tracing::info!("Loaded {} schedule override(s) from {}", overrides.len(), path);
            overrides
        }
        None => ScheduleOverrides::default(),
    };

    tracing::info!("Precipitation bucket rule: {}", config.bucket_rule.as_str());
    if !display_table_agrees(config.bucket_rule) {
        tracing::warn!(
            "Bucket rule '{}' does not match the published bucket table; \
             players see different boundaries than scoring uses",
            config.bucket_rule.as_str()
        );
    }

    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set; admin routes will reject all requests");
    }

    // Pick up any reading files dropped in while the service was down
    let data_dir = PathBuf::from(&config.data_dir);
    if config.import_on_start {
        match services::readings::import_dir(&pool, &data_dir, config.bucket_rule).await {
            Ok(tally) => {
                if tally.failed > 0 {
                    tracing::warn!("{} reading file(s) failed to import at startup", tally.failed);
                }
            }
            Err(e) => {
                tracing::error!("Failed to import readings from {}: {}", data_dir.display(), e);
            }
        }
    }

    // Build shared application state
    let app_state = AppState {
        pool,
        clock: Arc::new(SystemClock),
        overrides: Arc::new(overrides),
        bucket_rule: config.bucket_rule,
        cron_secret: config.cron_secret.clone(),
        data_dir,
    };

    // CORS: public reads and forecast submission
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stations", get(routes::stations::list_stations))
        .route(
            "/api/v1/stations/current",
            get(routes::stations::current_station),
        )
        .route(
            "/api/v1/stations/schedule/upcoming",
            get(routes::stations::upcoming_schedule),
        )
        .route("/api/v1/stations/:id", get(routes::stations::get_station))
        .route(
            "/api/v1/forecasts/status",
            get(routes::forecasts::forecast_status),
        )
        .route("/api/v1/forecasts", post(routes::forecasts::create_forecast))
        .route("/api/v1/users", post(routes::users::register_user))
        .route(
            "/api/v1/users/:id/forecasts",
            get(routes::users::forecast_history),
        )
        .route(
            "/api/v1/users/:id/forecasts/today",
            get(routes::users::today_forecast),
        )
        .route("/api/v1/users/:id/scores", get(routes::users::score_history))
        .route(
            "/api/v1/scores/date/:date",
            get(routes::scores::scores_by_date),
        )
        .route("/api/v1/leaderboard", get(routes::leaderboard::get_leaderboard))
        .route(
            "/api/v1/leaderboard/stats",
            get(routes::leaderboard::get_stats),
        );

    // Admin routes check X-Cron-Secret in each handler
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/calculate-scores",
            post(routes::admin::calculate_scores),
        )
        .route(
            "/api/v1/admin/import-readings",
            post(routes::admin::import_readings),
        )
        .route(
            "/api/v1/admin/readings/:station_id/:date/reimport",
            post(routes::admin::reimport),
        )
        .route(
            "/api/v1/admin/reconcile-totals",
            post(routes::admin::reconcile),
        );

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
