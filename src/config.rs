use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::{DateRange, SportTarget};

pub const PROPS_SOURCE_URL: &str =
    "https://dknetwork.draftkings.com/draftkings-sportsbook-player-props/";

/// `tb_view` selector for the "Most Bet Player Props" table.
pub const MOST_BET_VIEW: u8 = 2;

/// Snapshot time-to-live (minutes).
pub const CACHE_TTL_MINUTES: u64 = 30;

/// Upper bound on a single page fetch (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Targets fetched concurrently during one refresh.
pub const FETCH_CONCURRENCY: usize = 4;

/// Default group size for /top-props-by-sport.
pub const TOP_PROPS_LIMIT: usize = 10;

/// Distinct markets reported per sport in the summary.
pub const SUMMARY_MARKET_SAMPLE: usize = 10;

/// Records returned by /test-props.
pub const TEST_PROPS_SAMPLE: usize = 5;

pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://thebettinginsider.com",
    "https://www.thebettinginsider.com",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

const BOTH_DAYS: &[DateRange] = &[DateRange::Today, DateRange::Tomorrow];
const TODAY_ONLY: &[DateRange] = &[DateRange::Today];

/// Every sport scraped on refresh, in iteration order.
/// Soccer competitions only publish same-day props.
pub const SPORT_TARGETS: &[SportTarget] = &[
    SportTarget { key: "mlb", source_id: 84240, name: "MLB", date_ranges: BOTH_DAYS },
    SportTarget { key: "wnba", source_id: 94682, name: "WNBA", date_ranges: BOTH_DAYS },
    SportTarget { key: "nba", source_id: 42648, name: "NBA", date_ranges: BOTH_DAYS },
    SportTarget { key: "nhl", source_id: 42133, name: "NHL", date_ranges: BOTH_DAYS },
    SportTarget { key: "nfl", source_id: 88808, name: "NFL", date_ranges: BOTH_DAYS },
    SportTarget { key: "ufc", source_id: 9034, name: "UFC", date_ranges: BOTH_DAYS },
    SportTarget { key: "ncaaf", source_id: 87637, name: "NCAA Football", date_ranges: BOTH_DAYS },
    SportTarget {
        key: "ncaa_basketball",
        source_id: 92483,
        name: "NCAA Basketball",
        date_ranges: BOTH_DAYS,
    },
    SportTarget {
        key: "ncaa_womens_basketball",
        source_id: 36647,
        name: "NCAA Womens Basketball",
        date_ranges: BOTH_DAYS,
    },
    SportTarget {
        key: "ncaa_baseball",
        source_id: 41151,
        name: "NCAA Baseball",
        date_ranges: BOTH_DAYS,
    },
    SportTarget {
        key: "ncaa_ice_hockey",
        source_id: 84813,
        name: "NCAA Ice Hockey",
        date_ranges: BOTH_DAYS,
    },
    SportTarget { key: "mls", source_id: 89345, name: "MLS", date_ranges: TODAY_ONLY },
    SportTarget {
        key: "premier_league",
        source_id: 40253,
        name: "England Premier League",
        date_ranges: TODAY_ONLY,
    },
    SportTarget {
        key: "champions_league",
        source_id: 40685,
        name: "Champions League",
        date_ranges: TODAY_ONLY,
    },
    SportTarget {
        key: "europa_league",
        source_id: 41410,
        name: "Europa League",
        date_ranges: TODAY_ONLY,
    },
];

#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub log_level: String,
    pub port: u16,
    /// Snapshot TTL (CACHE_TTL_MINUTES)
    pub cache_ttl: Duration,
    /// Per-page fetch timeout (FETCH_TIMEOUT_SECS)
    pub fetch_timeout: Duration,
    /// Concurrent target fetches per refresh (FETCH_CONCURRENCY), never below 1
    pub fetch_concurrency: usize,
    /// CORS origins (ALLOWED_ORIGINS, comma-separated)
    pub allowed_origins: Vec<String>,
    /// Run one refresh before accepting requests (WARM_CACHE)
    pub warm_cache: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let allowed_origins: Vec<String> = match std::env::var("ALLOWED_ORIGINS") {
            Ok(raw) => split_list(&raw),
            Err(_) => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            source_url: std::env::var("PROPS_SOURCE_URL")
                .unwrap_or_else(|_| PROPS_SOURCE_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("PORT must be a valid port number".to_string()))?,
            cache_ttl: ttl_from_minutes(std::env::var("CACHE_TTL_MINUTES").ok().as_deref()),
            fetch_timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(FETCH_TIMEOUT_SECS),
            ),
            fetch_concurrency: std::env::var("FETCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(FETCH_CONCURRENCY)
                .max(1),
            allowed_origins,
            warm_cache: std::env::var("WARM_CACHE")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }
}

/// Unparsable or overflowing values fall back to the default TTL.
fn ttl_from_minutes(raw: Option<&str>) -> Duration {
    let secs = raw
        .and_then(|v| v.trim().parse::<u64>().ok())
        .and_then(|m| m.checked_mul(60))
        .unwrap_or(CACHE_TTL_MINUTES * 60);
    Duration::from_secs(secs)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
