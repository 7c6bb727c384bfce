use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::cache::{CacheRead, PropsCache};
use crate::config::{SPORT_TARGETS, TEST_PROPS_SAMPLE, TOP_PROPS_LIMIT};
use crate::query;
use crate::types::{DateRange, PropRecord};

#[derive(Clone)]
pub struct ApiState {
    pub cache: Arc<PropsCache>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

/// Fixed per-sport routes kept for existing consumers; `/props/:sport` covers the rest.
const SPORT_ALIASES: &[(&str, &str)] = &[
    ("/mlb-props", "MLB"),
    ("/wnba-props", "WNBA"),
    ("/nba-props", "NBA"),
    ("/nfl-props", "NFL"),
    ("/nhl-props", "NHL"),
    ("/ufc-props", "UFC"),
];

pub fn router(state: ApiState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET]);

    let mut app = Router::new()
        .route("/", get(home))
        .route("/all-props", get(get_all_props))
        .route("/props/:sport", get(get_props_for_sport))
        .route("/top-props-by-sport", get(get_top_props_by_sport))
        .route("/test-props", get(get_test_props))
        .route("/refresh-props-cache", get(refresh_props_cache))
        .route("/props-summary", get(get_props_summary))
        .route("/converted-lines", get(get_converted_lines))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency));

    for &(path, sport) in SPORT_ALIASES {
        app = app.route(
            path,
            get(move |State(state): State<ApiState>| sport_props(state, sport.to_string())),
        );
    }

    app.with_state(state).layer(cors)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TopPropsQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PropsResponse<'a> {
    pub props: Vec<&'a PropRecord>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<&'a str>,
    pub cached: bool,
    pub cache_age_minutes: f64,
}

#[derive(Serialize)]
pub struct TopPropsResponse<'a> {
    pub props_by_sport: BTreeMap<&'a str, Vec<&'a PropRecord>>,
    pub total_props: usize,
    pub sports_count: usize,
    pub cached: bool,
    pub cache_age_minutes: f64,
}

#[derive(Serialize)]
pub struct TestPropsResponse<'a> {
    pub first_5_props: &'a [PropRecord],
    pub total_props: usize,
    pub cached: bool,
    pub cache_age_minutes: f64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    pub total_props: usize,
    pub cache_timestamp: Option<String>,
}

#[derive(Serialize)]
pub struct SportBreakdown<'a> {
    pub count: usize,
    pub sample_markets: Vec<&'a str>,
    pub date_ranges: Vec<DateRange>,
}

#[derive(Serialize)]
pub struct SummaryBody<'a> {
    pub total_props: usize,
    pub sports_count: usize,
    pub sports_breakdown: BTreeMap<&'a str, SportBreakdown<'a>>,
    pub cached: bool,
}

#[derive(Serialize)]
pub struct SummaryResponse<'a> {
    pub summary: SummaryBody<'a>,
}

#[derive(Serialize)]
pub struct ConvertedResponse<'a> {
    pub converted_props: Vec<&'a PropRecord>,
    pub count: usize,
    pub total_props: usize,
    pub conversion_rate: String,
    pub cached: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn home(State(state): State<ApiState>) -> Html<String> {
    let snapshot = state.cache.peek();
    let mut cache_status = format!(
        "Cache: {}",
        if snapshot.records.is_empty() { "Empty" } else { "Active" }
    );
    if snapshot.captured_at.is_some() {
        cache_status.push_str(&format!(
            " (Age: {:.1} min, {} props)",
            snapshot.age_minutes(Utc::now()),
            snapshot.records.len()
        ));
    }

    let sport_links: String = SPORT_ALIASES
        .iter()
        .map(|(path, sport)| format!("<li><a href=\"{path}\">{path}</a> - {sport} props only</li>"))
        .collect();

    Html(format!(
        r#"<h1>Player Props Scraper</h1>
<p><strong>{cache_status}</strong></p>
<p>Cache Duration: {ttl} minutes</p>
<h2>Data Endpoints:</h2>
<ul>
    <li><a href="/all-props">/all-props</a> - All player props</li>
    {sport_links}
    <li>/props/&lt;sport&gt; - Props for any configured sport (key or name)</li>
    <li><a href="/top-props-by-sport">/top-props-by-sport</a> - Top {top} props per sport</li>
    <li><a href="/test-props">/test-props</a> - Test endpoint (first {sample} props)</li>
</ul>
<h2>Cache Management:</h2>
<ul>
    <li><a href="/refresh-props-cache">/refresh-props-cache</a> - Force refresh the props cache</li>
</ul>
<h2>Analytics:</h2>
<ul>
    <li><a href="/props-summary">/props-summary</a> - Summary of all props by sport</li>
    <li><a href="/converted-lines">/converted-lines</a> - Props with converted bet lines (1+ -&gt; Over 0.5)</li>
    <li><a href="/health">/health</a> - Refresh health</li>
</ul>
"#,
        ttl = state.cache.ttl().num_minutes(),
        top = TOP_PROPS_LIMIT,
        sample = TEST_PROPS_SAMPLE,
    ))
}

async fn get_all_props(State(state): State<ApiState>) -> Response {
    let read = state.cache.get().await;
    let records = &read.snapshot.records;
    Json(PropsResponse {
        props: records.iter().collect(),
        count: records.len(),
        sport: None,
        cached: read.from_cache,
        cache_age_minutes: age_minutes(&read),
    })
    .into_response()
}

async fn get_props_for_sport(
    State(state): State<ApiState>,
    Path(sport): Path<String>,
) -> Response {
    sport_props(state, resolve_sport(&sport)).await
}

async fn sport_props(state: ApiState, sport: String) -> Response {
    let read = state.cache.get().await;
    let props = query::filter_by_sport(&read.snapshot.records, &sport);
    Json(PropsResponse {
        count: props.len(),
        props,
        sport: Some(&sport),
        cached: read.from_cache,
        cache_age_minutes: age_minutes(&read),
    })
    .into_response()
}

async fn get_top_props_by_sport(
    State(state): State<ApiState>,
    Query(params): Query<TopPropsQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(TOP_PROPS_LIMIT);
    let read = state.cache.get().await;
    let records = &read.snapshot.records;
    let groups = query::top_per_sport(records, limit);

    Json(TopPropsResponse {
        sports_count: groups.len(),
        props_by_sport: groups.into_iter().map(|g| (g.sport, g.records)).collect(),
        total_props: records.len(),
        cached: read.from_cache,
        cache_age_minutes: age_minutes(&read),
    })
    .into_response()
}

async fn get_test_props(State(state): State<ApiState>) -> Response {
    let read = state.cache.get().await;
    let records = &read.snapshot.records;
    Json(TestPropsResponse {
        first_5_props: &records[..records.len().min(TEST_PROPS_SAMPLE)],
        total_props: records.len(),
        cached: read.from_cache,
        cache_age_minutes: age_minutes(&read),
    })
    .into_response()
}

async fn refresh_props_cache(State(state): State<ApiState>) -> Json<RefreshResponse> {
    let snapshot = state.cache.force_refresh().await;
    Json(RefreshResponse {
        message: "Props cache refreshed successfully",
        total_props: snapshot.records.len(),
        cache_timestamp: snapshot
            .captured_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
    })
}

async fn get_props_summary(State(state): State<ApiState>) -> Response {
    let read = state.cache.get().await;
    let summary = query::summary(&read.snapshot.records);

    Json(SummaryResponse {
        summary: SummaryBody {
            total_props: summary.total_props,
            sports_count: summary.sports_count,
            sports_breakdown: summary
                .sports
                .into_iter()
                .map(|s| {
                    (
                        s.sport,
                        SportBreakdown {
                            count: s.count,
                            sample_markets: s.sample_markets,
                            date_ranges: s.date_ranges,
                        },
                    )
                })
                .collect(),
            cached: read.from_cache,
        },
    })
    .into_response()
}

async fn get_converted_lines(State(state): State<ApiState>) -> Response {
    let read = state.cache.get().await;
    let converted = query::converted_only(&read.snapshot.records);
    Json(ConvertedResponse {
        count: converted.records.len(),
        conversion_rate: converted.rate_label(),
        total_props: converted.total,
        converted_props: converted.records,
        cached: read.from_cache,
    })
    .into_response()
}

async fn get_health(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let snapshot = state.cache.peek();
    Json(serde_json::json!({
        "status": "ok",
        "refreshing": state.health.refreshing(),
        "refresh_count": state.health.refresh_count(),
        "last_record_count": state.health.last_record_count(),
        "last_failed_targets": state.health.last_failed_targets(),
        "last_refresh_at_ms": state.health.last_refresh_at_ms(),
        "cache_age_minutes": snapshot.age_minutes(Utc::now()),
        "last_run": snapshot.stats,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(serde_json::json!({
        "samples": state.latency.len(),
        "p50_ms": p50,
        "p95_ms": p95,
        "p99_ms": p99,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn age_minutes(read: &CacheRead) -> f64 {
    read.snapshot.age_minutes(Utc::now())
}

/// Map a sport key (`ncaaf`) to its display name; anything else is used as-is.
fn resolve_sport(raw: &str) -> String {
    SPORT_TARGETS
        .iter()
        .find(|t| t.key.eq_ignore_ascii_case(raw))
        .map(|t| t.name.to_string())
        .unwrap_or_else(|| raw.to_string())
}
