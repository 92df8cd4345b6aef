use crate::services::normalizer::BucketRule;

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Directory containing station reading exports (`<STATION>_<YYYY-MM-DD>.json`).
    pub data_dir: String,
    /// Shared secret for admin routes. Admin routes reject everything when unset.
    pub cron_secret: Option<String>,
    /// Optional TOML file with station schedule overrides.
    pub schedule_overrides: Option<String>,
    pub bucket_rule: BucketRule,
    /// Import readings from `data_dir` once at startup.
    pub import_on_start: bool,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            cron_secret: non_empty("CRON_SECRET"),
            schedule_overrides: non_empty("SCHEDULE_OVERRIDES"),
            bucket_rule: non_empty("PRECIP_BUCKET_RULE")
                .map(|v| {
                    BucketRule::parse(&v)
                        .expect("PRECIP_BUCKET_RULE must be 'upper-inclusive' or 'lower-inclusive'")
                })
                .unwrap_or_default(),
            import_on_start: std::env::var("IMPORT_ON_START")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}
