//! REST API
//!
//! Serves the dashboard's data sets as JSON, plus a Server-Sent Events
//! stream backed by the simulated feed.

use crate::{
    analytics::{self, ProtocolRow, RiskSummary, SortKey, SortOrder},
    cache::{CacheStats, LiveDataCache},
    config::Config,
    error::{DashboardError, Result},
    feed::{FeedConfig, SimulatedFeed},
    generator::MetricsGenerator,
    llama::{LiveProtocolData, LlamaClient},
    types::{
        AssetDistribution, ConfidenceIntervalPoint, ConfidenceLevel, OracleEvent, ProtocolId,
        ProtocolMetrics, RiskPosition, TimeSeriesPoint,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Upper bound for any `days`/`count` query parameter
pub const MAX_ITEMS: usize = 1000;

const DEFAULT_DAYS: usize = 30;
const DEFAULT_POSITIONS: usize = 50;
const DEFAULT_ORACLE_EVENTS: usize = 10;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Mutex<MetricsGenerator>>,
    pub llama: Arc<LlamaClient>,
    pub cache: Arc<Mutex<LiveDataCache>>,
    pub feed_config: FeedConfig,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let generator = match config.rng_seed {
            Some(seed) => MetricsGenerator::seeded(seed),
            None => MetricsGenerator::from_entropy(),
        };

        let llama = LlamaClient::new(
            &config.llama_config.base_url,
            config.llama_config.timeout(),
        )?;

        Ok(Self {
            generator: Arc::new(Mutex::new(generator)),
            llama: Arc::new(llama),
            cache: Arc::new(Mutex::new(
                LiveDataCache::new().with_ttl(config.llama_config.cache_ttl()),
            )),
            feed_config: FeedConfig {
                period: config.feed_period(),
            },
        })
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Protocol endpoints
        .route("/api/v1/protocols", get(list_protocols))
        .route("/api/v1/protocols/:protocol/metrics", get(get_metrics))
        .route("/api/v1/protocols/:protocol/overview", get(get_overview))

        // Chart data
        .route("/api/v1/tvl", get(get_tvl))
        .route("/api/v1/confidence", get(get_confidence))
        .route("/api/v1/liquidations", get(get_liquidations))
        .route("/api/v1/oracle-events", get(get_oracle_events))
        .route("/api/v1/assets", get(get_assets))

        // Live updates
        .route("/api/v1/stream/:protocol", get(stream_metrics))

        .route("/api/v1/health", get(health_check))

        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// PROTOCOL ENDPOINTS
// ============================================================================

/// GET /api/v1/protocols
///
/// Comparison table, one fresh snapshot per protocol
///
/// Query params: ?sort=utilizationRate&order=asc
async fn list_protocols(
    State(state): State<AppState>,
    Query(params): Query<ComparisonQuery>,
) -> Json<ListResponse<ProtocolRow>> {
    let key = params.sort.unwrap_or_default();
    let order = params.order.unwrap_or_default();

    let rows = {
        let mut generator = state.generator.lock().await;
        analytics::compare_protocols(&mut *generator, key, order)
    };

    Json(ListResponse::new(rows))
}

/// GET /api/v1/protocols/:protocol/metrics
async fn get_metrics(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Json<DataResponse<ProtocolMetrics>> {
    let metrics = state.generator.lock().await.protocol_metrics(&protocol);
    Json(DataResponse::new(metrics))
}

/// GET /api/v1/protocols/:protocol/overview
///
/// Generated snapshot plus live DeFiLlama data when reachable.
/// A failed lookup never fails the request: `live` is null and
/// `liveDataAvailable` is false.
async fn get_overview(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Json<DataResponse<Overview>> {
    info!("Building overview for {}", protocol);

    let live = live_data(&state, &protocol).await;
    let metrics = state.generator.lock().await.protocol_metrics(&protocol);

    Json(DataResponse::new(Overview {
        live_data_available: live.is_some(),
        metrics,
        live,
    }))
}

/// Cached live data, fetching upstream on a miss.
///
/// The cache lock is released while the request is in flight. A `None`
/// is not cached, so the next request retries upstream.
async fn live_data(state: &AppState, protocol: &str) -> Option<LiveProtocolData> {
    let cached = state.cache.lock().await.get(protocol);
    if cached.is_some() {
        return cached;
    }

    let fetched = state.llama.fetch_protocol_or_none(protocol).await?;
    state.cache.lock().await.insert(protocol, fetched.clone());
    Some(fetched)
}

// ============================================================================
// CHART ENDPOINTS
// ============================================================================

/// GET /api/v1/tvl?days=30
async fn get_tvl(
    State(state): State<AppState>,
    Query(params): Query<SeriesQuery>,
) -> Result<Json<TvlResponse>> {
    let days = bounded("days", params.days, DEFAULT_DAYS)?;
    let series = state.generator.lock().await.time_series(days);

    Ok(Json(TvlResponse {
        success: true,
        percent_change: analytics::percent_change(&series),
        average: analytics::average_value(&series),
        count: series.len(),
        data: series,
    }))
}

/// GET /api/v1/confidence?days=30&level=95
async fn get_confidence(
    State(state): State<AppState>,
    Query(params): Query<ConfidenceQuery>,
) -> Result<Json<ConfidenceResponse>> {
    let days = bounded("days", params.days, DEFAULT_DAYS)?;
    let level = ConfidenceLevel::from_percent(params.level.unwrap_or(95));

    let series = state
        .generator
        .lock()
        .await
        .confidence_interval_series(days, level);

    Ok(Json(ConfidenceResponse {
        success: true,
        confidence_level: level.percent(),
        data: series,
    }))
}

/// GET /api/v1/liquidations?count=50
async fn get_liquidations(
    State(state): State<AppState>,
    Query(params): Query<CountQuery>,
) -> Result<Json<LiquidationResponse>> {
    let count = bounded("count", params.count, DEFAULT_POSITIONS)?;
    let positions = state.generator.lock().await.risk_positions(count);

    Ok(Json(LiquidationResponse {
        success: true,
        summary: RiskSummary::from_positions(&positions),
        data: positions,
    }))
}

/// GET /api/v1/oracle-events?count=10
///
/// Newest first
async fn get_oracle_events(
    State(state): State<AppState>,
    Query(params): Query<CountQuery>,
) -> Result<Json<ListResponse<OracleEvent>>> {
    let count = bounded("count", params.count, DEFAULT_ORACLE_EVENTS)?;
    let events = state.generator.lock().await.oracle_events(count);
    Ok(Json(ListResponse::new(events)))
}

/// GET /api/v1/assets
async fn get_assets(State(state): State<AppState>) -> Json<ListResponse<AssetDistribution>> {
    let distribution = state.generator.lock().await.asset_distribution();
    Json(ListResponse::new(distribution))
}

// ============================================================================
// STREAMING
// ============================================================================

/// GET /api/v1/stream/:protocol
///
/// SSE stream of `metrics` events. Each connection owns its own feed; only
/// snapshots for the requested protocol are forwarded. The feed stops when
/// the client disconnects and the stream is dropped.
async fn stream_metrics(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let protocol: ProtocolId = protocol
        .parse()
        .map_err(DashboardError::InvalidParameter)?;

    let (tx, rx) = mpsc::unbounded_channel::<ProtocolMetrics>();

    let mut feed = SimulatedFeed::new(state.feed_config.clone());
    feed.connect(move |snapshot| {
        if snapshot.protocol == protocol.as_str() {
            // receiver gone means the stream is being torn down
            let _ = tx.send(snapshot);
        }
    })?;

    info!("Streaming live metrics for {}", protocol);

    let events = stream::unfold((rx, feed), |(mut rx, feed)| async move {
        let snapshot = rx.recv().await?;
        let event = match Event::default().event("metrics").json_data(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to encode feed snapshot: {}", e);
                Event::default().comment("encode error")
            }
        };
        Some((Ok(event), (rx, feed)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ============================================================================
// HEALTH
// ============================================================================

/// GET /api/v1/health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.cache.lock().await.stats();

    Json(HealthResponse {
        success: true,
        cache,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn bounded(name: &str, value: Option<usize>, default: usize) -> Result<usize> {
    let value = value.unwrap_or(default);
    if value > MAX_ITEMS {
        return Err(DashboardError::InvalidParameter(format!(
            "{} must be at most {} (got {})",
            name, MAX_ITEMS, value
        )));
    }
    Ok(value)
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ComparisonQuery {
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub days: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConfidenceQuery {
    pub days: Option<usize>,
    pub level: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: i64,
}

impl<T> DataResponse<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub metrics: ProtocolMetrics,
    pub live: Option<LiveProtocolData>,
    pub live_data_available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TvlResponse {
    pub success: bool,
    pub data: Vec<TimeSeriesPoint>,
    pub count: usize,
    pub percent_change: Option<f64>,
    pub average: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceResponse {
    pub success: bool,
    pub confidence_level: u32,
    pub data: Vec<ConfidenceIntervalPoint>,
}

#[derive(Debug, Serialize)]
pub struct LiquidationResponse {
    pub success: bool,
    pub data: Vec<RiskPosition>,
    pub summary: RiskSummary,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub cache: CacheStats,
    pub timestamp: i64,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            DashboardError::Upstream(_)
            | DashboardError::UpstreamStatus { .. }
            | DashboardError::Parse(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Feed(_) => StatusCode::CONFLICT,
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            rng_seed: Some(42),
            llama_config: crate::config::LlamaConfig {
                // nothing listens here, so live lookups always degrade
                base_url: "http://127.0.0.1:9".to_string(),
                timeout_secs: 1,
                cache_ttl_secs: 60,
            },
            ..Config::default()
        };
        AppState::new(&config).unwrap()
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_protocol_comparison_sorted_by_tvl_desc() {
        let (status, body) = get_json("/api/v1/protocols").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 5);

        let tvls: Vec<f64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["tvl"].as_f64().unwrap())
            .collect();
        assert!(tvls.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(body["data"][0]["name"], "Aave");
    }

    #[tokio::test]
    async fn test_protocol_comparison_custom_sort() {
        let (status, body) = get_json("/api/v1/protocols?sort=uniqueUsers&order=asc").await;
        assert_eq!(status, StatusCode::OK);

        let users: Vec<u64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["uniqueUsers"].as_u64().unwrap())
            .collect();
        assert!(users.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_metrics_for_unknown_protocol() {
        let (status, body) = get_json("/api/v1/protocols/sushiswap/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["protocol"], "sushiswap");
        assert!(body["data"]["tvl"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_overview_degrades_without_live_data() {
        let (status, body) = get_json("/api/v1/protocols/aave/overview").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["liveDataAvailable"], false);
        assert!(body["data"]["live"].is_null());
        assert_eq!(body["data"]["metrics"]["protocol"], "aave");
    }

    #[tokio::test]
    async fn test_tvl_series() {
        let (status, body) = get_json("/api/v1/tvl?days=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 7);
        assert!(body["percentChange"].is_number());
        assert!(body["average"].is_number());
    }

    #[tokio::test]
    async fn test_confidence_level_echoed() {
        let (_, body) = get_json("/api/v1/confidence?days=5&level=90").await;
        assert_eq!(body["confidenceLevel"], 90);
        assert_eq!(body["data"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_liquidations_with_summary() {
        let (status, body) = get_json("/api/v1/liquidations?count=20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 20);

        let counts = body["summary"]["counts"].as_object().unwrap();
        let total: u64 = counts.values().map(|v| v.as_u64().unwrap()).sum();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_oracle_events_default_count() {
        let (_, body) = get_json("/api/v1/oracle-events").await;
        assert_eq!(body["count"], 10);
    }

    #[tokio::test]
    async fn test_assets() {
        let (_, body) = get_json("/api/v1/assets").await;
        let sum: f64 = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["percentage"].as_f64().unwrap())
            .sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_oversized_count_rejected() {
        let (status, body) = get_json("/api/v1/liquidations?count=5000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_stream_rejects_unknown_protocol() {
        let (status, _) = get_json("/api/v1/stream/sushiswap").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cache"]["ttlSecs"], 60);
    }

    /// Upstream that accepts connections and never answers
    async fn silent_upstream() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_failed_live_lookup_is_not_cached() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(request("/api/v1/protocols/aave/overview"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request("/api/v1/health")).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["cache"]["totalKeys"], 0);
        assert_eq!(body["cache"]["misses"], 1);
    }

    #[tokio::test]
    async fn test_health_responds_while_overview_fetch_hangs() {
        let config = Config {
            rng_seed: Some(42),
            llama_config: crate::config::LlamaConfig {
                base_url: silent_upstream().await,
                timeout_secs: 30,
                cache_ttl_secs: 60,
            },
            ..Config::default()
        };
        let app = create_router(AppState::new(&config).unwrap());

        let overview = tokio::spawn(
            app.clone()
                .oneshot(request("/api/v1/protocols/aave/overview")),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        let health = tokio::time::timeout(
            Duration::from_secs(2),
            app.clone().oneshot(request("/api/v1/health")),
        )
        .await
        .expect("health blocked behind the overview fetch")
        .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let other = tokio::time::timeout(
            Duration::from_secs(2),
            app.oneshot(request("/api/v1/protocols/curve/metrics")),
        )
        .await
        .expect("metrics blocked behind the overview fetch")
        .unwrap();
        assert_eq!(other.status(), StatusCode::OK);

        assert!(!overview.is_finished());
        overview.abort();
    }
}
