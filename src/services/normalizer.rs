//! Station reading normalization.
//!
//! Turns a raw daily station record (continuous max/min temperature, peak
//! gust, precipitation total) into the values forecasts are compared against:
//! whole-degree temperatures and a 1–7 precipitation bucket.
//!
//! Two precipitation boundary conventions exist. [`BucketRule::UpperInclusive`]
//! is the one ingestion has always used and it matches the human-facing
//! description table ([`bucket_description`]). [`BucketRule::LowerInclusive`]
//! is the exact-boundary table from the contest rules document; it puts
//! trace amounts in their own bucket and disagrees with the description
//! table at every boundary. Which one is authoritative is still an open
//! product question, so both are kept and the rule is configurable.

use serde::Deserialize;

use crate::errors::ContestError;

/// Lowest and highest valid precipitation bucket.
pub const MIN_BUCKET: i32 = 1;
pub const MAX_BUCKET: i32 = 7;

/// Raw daily record as delivered by the station export.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RawReading {
    #[serde(rename = "MaxTemp")]
    pub max_temp: f64,
    #[serde(rename = "MinTemp")]
    pub min_temp: f64,
    #[serde(rename = "MaxGust")]
    pub max_gust: f64,
    #[serde(rename = "SumPrec")]
    pub sum_prec: f64,
}

impl RawReading {
    /// Parse a raw record from JSON. Missing or non-numeric fields are an
    /// invalid reading, not a parse failure of the whole batch.
    pub fn from_json(json: &str) -> Result<Self, ContestError> {
        serde_json::from_str(json).map_err(|e| ContestError::InvalidReading(e.to_string()))
    }
}

/// Normalized reading fields, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedReading {
    pub max_temp_raw: f64,
    pub max_temp_rounded: i32,
    pub min_temp_raw: f64,
    pub min_temp_rounded: i32,
    /// Peak gust at full precision; rounded only when scored.
    pub wind_gust_max: f64,
    /// Precipitation total in inches at full precision.
    pub precip_total: f64,
    pub precip_bucket: i32,
}

/// Precipitation bucket boundary convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketRule {
    /// `≤0.10→1, ≤0.25→2, ≤0.50→3, ≤1.00→4, ≤1.50→5, ≤2.50→6, else 7`
    #[default]
    UpperInclusive,
    /// `0→1, <0.10→2, <0.25→3, <0.50→4, <1.00→5, <2.00→6, ≥2.00→7`
    LowerInclusive,
}

impl BucketRule {
    /// Parse the `PRECIP_BUCKET_RULE` configuration value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upper-inclusive" | "upper_inclusive" => Some(BucketRule::UpperInclusive),
            "lower-inclusive" | "lower_inclusive" => Some(BucketRule::LowerInclusive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BucketRule::UpperInclusive => "upper-inclusive",
            BucketRule::LowerInclusive => "lower-inclusive",
        }
    }
}

const UPPER_INCLUSIVE_LIMITS: [f64; 6] = [0.10, 0.25, 0.50, 1.00, 1.50, 2.50];
const LOWER_INCLUSIVE_LIMITS: [f64; 5] = [0.10, 0.25, 0.50, 1.00, 2.00];

/// Bucket (1–7) for a precipitation total in inches.
pub fn precip_bucket(inches: f64, rule: BucketRule) -> i32 {
    match rule {
        BucketRule::UpperInclusive => {
            let over = UPPER_INCLUSIVE_LIMITS
                .iter()
                .take_while(|&&limit| inches > limit)
                .count();
            MIN_BUCKET + over as i32
        }
        BucketRule::LowerInclusive => {
            if inches <= 0.0 {
                return MIN_BUCKET;
            }
            let at_or_over = LOWER_INCLUSIVE_LIMITS
                .iter()
                .take_while(|&&limit| inches >= limit)
                .count();
            MIN_BUCKET + 1 + at_or_over as i32
        }
    }
}

/// Round half away from zero (85.5 → 86, −0.5 → −1).
pub fn round_temperature(value: f64) -> i32 {
    value.round() as i32
}

/// Normalize a raw record using the given precipitation rule.
pub fn normalize(raw: &RawReading, rule: BucketRule) -> Result<NormalizedReading, ContestError> {
    let fields = [
        ("MaxTemp", raw.max_temp),
        ("MinTemp", raw.min_temp),
        ("MaxGust", raw.max_gust),
        ("SumPrec", raw.sum_prec),
    ];
    if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(ContestError::InvalidReading(format!(
            "{} is not a finite number ({})",
            name, value
        )));
    }

    Ok(NormalizedReading {
        max_temp_raw: raw.max_temp,
        max_temp_rounded: round_temperature(raw.max_temp),
        min_temp_raw: raw.min_temp,
        min_temp_rounded: round_temperature(raw.min_temp),
        wind_gust_max: raw.max_gust,
        precip_total: raw.sum_prec,
        precip_bucket: precip_bucket(raw.sum_prec, rule),
    })
}

/// Human-facing description of one precipitation bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketDescription {
    pub value: i32,
    /// Lower bound in inches (inclusive).
    pub min: f64,
    /// Upper bound in inches (inclusive); `None` for the open-ended top bucket.
    pub max: Option<f64>,
    pub label: &'static str,
}

/// Display table. Bounds are inclusive at both ends and rounded to cents.
pub static BUCKET_DESCRIPTIONS: [BucketDescription; 7] = [
    BucketDescription { value: 1, min: 0.00, max: Some(0.10), label: "0.00\" - 0.10\"" },
    BucketDescription { value: 2, min: 0.11, max: Some(0.25), label: "0.11\" - 0.25\"" },
    BucketDescription { value: 3, min: 0.26, max: Some(0.50), label: "0.26\" - 0.50\"" },
    BucketDescription { value: 4, min: 0.51, max: Some(1.00), label: "0.51\" - 1.00\"" },
    BucketDescription { value: 5, min: 1.01, max: Some(1.50), label: "1.01\" - 1.50\"" },
    BucketDescription { value: 6, min: 1.51, max: Some(2.50), label: "1.51\" - 2.50\"" },
    BucketDescription { value: 7, min: 2.51, max: None, label: "2.51\" or more" },
];

/// Description for a bucket; unknown buckets fall back to bucket 1.
pub fn bucket_description(bucket: i32) -> &'static BucketDescription {
    BUCKET_DESCRIPTIONS
        .iter()
        .find(|d| d.value == bucket)
        .unwrap_or(&BUCKET_DESCRIPTIONS[0])
}

/// Whether `rule` puts every display-table bound in the bucket the table
/// claims for it.
pub fn display_table_agrees(rule: BucketRule) -> bool {
    BUCKET_DESCRIPTIONS.iter().all(|d| {
        precip_bucket(d.min, rule) == d.value
            && d.max.map_or(true, |max| precip_bucket(max, rule) == d.value)
    })
}
