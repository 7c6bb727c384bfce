mod aggregator;
mod api;
mod cache;
mod config;
mod error;
mod extractor;
mod normalizer;
mod query;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::aggregator::Aggregator;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::cache::{CacheSnapshot, PropsCache};
use crate::config::{Config, SPORT_TARGETS};
use crate::error::Result;
use crate::extractor::HttpPropSource;

/// Conversion examples logged after the warm-up refresh.
const WARMUP_CONVERSION_EXAMPLES: usize = 10;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let source = HttpPropSource::new(cfg.source_url.clone(), cfg.fetch_timeout)?;
    let latency = Arc::new(LatencyStats::new());
    let health = Arc::new(HealthState::new());

    let aggregator = Aggregator::new(
        Arc::new(source),
        SPORT_TARGETS,
        cfg.fetch_timeout,
        cfg.fetch_concurrency,
        Arc::clone(&latency),
    );
    let cache = PropsCache::new(aggregator, cfg.cache_ttl, Arc::clone(&health));
    info!(
        sports = SPORT_TARGETS.len(),
        ttl_minutes = cfg.cache_ttl.as_secs() / 60,
        timeout_secs = cfg.fetch_timeout.as_secs(),
        concurrency = cfg.fetch_concurrency,
        "Props cache ready",
    );

    // --- Warm-up: one refresh before serving ---
    if cfg.warm_cache {
        let snapshot = cache.force_refresh().await;
        log_warmup(&snapshot);
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        cache: Arc::clone(&cache),
        health,
        latency,
    };
    let app = router(api_state, &cfg.allowed_origins);
    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");
    info!(
        "Data is cached for {} minutes; GET /refresh-props-cache forces a new scrape",
        cfg.cache_ttl.as_secs() / 60
    );

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_warmup(snapshot: &CacheSnapshot) {
    info!("Warm-up found {} props", snapshot.records.len());
    for (sport, count) in &snapshot.stats.per_sport {
        info!(sport = %sport, props = count, "{sport}: {count} props");
    }

    let converted: Vec<_> = snapshot.records.iter().filter(|r| r.is_converted()).collect();
    for r in converted.iter().take(WARMUP_CONVERSION_EXAMPLES) {
        info!(
            "[CONVERTED] {}: {} -> {}",
            r.market, r.betslip_line, r.converted_betslip_line
        );
    }
    info!("Total conversions: {}", converted.len());
}
