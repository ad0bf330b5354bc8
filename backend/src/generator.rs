//! Metrics Generator
//!
//! Produces plausible-looking protocol risk data so the dashboard has
//! something to render without a real indexer behind it.
//!
//! Every operation is total: unknown protocol ids fall back to a default
//! baseline and zero counts produce empty collections.
//!
//! # Draws
//! ```text
//! snapshot      tvl = base × U[0.95, 1.05]     borrowed = 0.6 × base × same factor
//! time series   v(t+1) = v(t) × (1 + 0.03 × U[-0.45, 0.55])
//! interval      v(t+1) = clamp(v(t) + U[-0.001, 0.001], 0.02, 0.12)
//! positions     hf = U[0.8, 3.3]               borrowed = collateral / hf × 0.75
//! oracle        deviation = U[-2, 2] %         price = base × (1 + deviation / 100)
//! ```

use crate::{
    random::{self, RandomSource},
    types::{
        AssetDistribution, ConfidenceIntervalPoint, ConfidenceLevel, OracleEvent, PriceSource,
        ProtocolId, ProtocolMetrics, RiskLevel, RiskPosition, Severity, TimeSeriesPoint,
        DEFAULT_BASE_TVL, DISTRIBUTION_ASSETS, ORACLE_PAIRS, RISK_ASSETS,
    },
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use tracing::debug;

/// Share of TVL that is borrowed out
const BORROW_RATIO: f64 = 0.6;

/// Collateral factor applied when deriving a position's debt
const COLLATERAL_FACTOR: f64 = 0.75;

/// Oracle events are spread over the trailing hour
const ORACLE_WINDOW_MS: f64 = 3_600_000.0;

/// Randomised generator for every dashboard data set
pub struct MetricsGenerator<R: RandomSource = StdRng> {
    rng: R,
}

impl MetricsGenerator<StdRng> {
    /// Generator seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self::new(random::entropy())
    }

    /// Generator that replays the same data for the same seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(random::seeded(seed))
    }
}

impl<R: RandomSource> MetricsGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Uniformly chosen tracked protocol
    pub fn pick_protocol(&mut self) -> ProtocolId {
        *self.rng.pick(&ProtocolId::ALL)
    }

    /// Snapshot of headline metrics for one protocol.
    ///
    /// Ids outside [`ProtocolId::ALL`] use [`DEFAULT_BASE_TVL`].
    pub fn protocol_metrics(&mut self, protocol: &str) -> ProtocolMetrics {
        let base_tvl = protocol
            .parse::<ProtocolId>()
            .map(|p| p.base_tvl())
            .unwrap_or(DEFAULT_BASE_TVL);

        let jitter = self.rng.uniform(0.95, 1.05);

        let metrics = ProtocolMetrics {
            protocol: protocol.to_string(),
            tvl: base_tvl * jitter,
            total_borrowed: base_tvl * BORROW_RATIO * jitter,
            utilization_rate: self.rng.uniform(0.55, 0.80),
            average_health_factor: self.rng.uniform(1.8, 2.6),
            liquidations_last24h: self.rng.uniform_int(0, 14),
            unique_users: self.rng.uniform_int(25_000, 75_000),
            timestamp: Utc::now(),
        };

        debug!("Generated metrics for {}: tvl=${:.0}", protocol, metrics.tvl);
        metrics
    }

    /// Daily TVL series ending now, oldest first
    pub fn time_series(&mut self, days: usize) -> Vec<TimeSeriesPoint> {
        let now = Utc::now();
        let mut value = self.rng.uniform(5e9, 8e9);

        let series: Vec<TimeSeriesPoint> = (0..days)
            .rev()
            .map(|days_ago| {
                let trend = self.rng.uniform(-0.45, 0.55) * 0.03;
                value *= 1.0 + trend;
                TimeSeriesPoint {
                    timestamp: days_before(now, days_ago),
                    value,
                }
            })
            .collect();

        debug!("Generated {} day TVL series", series.len());
        series
    }

    /// Daily rate series with a confidence band, oldest first
    pub fn confidence_interval_series(
        &mut self,
        days: usize,
        level: ConfidenceLevel,
    ) -> Vec<ConfidenceIntervalPoint> {
        let now = Utc::now();
        let half_width = level.half_width();
        let mut value = self.rng.uniform(0.05, 0.08);

        (0..days)
            .rev()
            .map(|days_ago| {
                value = (value + self.rng.uniform(-0.001, 0.001)).clamp(0.02, 0.12);

                let upper_variation = half_width * self.rng.uniform(0.8, 1.2);
                let lower_variation = half_width * self.rng.uniform(0.8, 1.2);

                ConfidenceIntervalPoint {
                    timestamp: days_before(now, days_ago),
                    value,
                    upper_bound: value + upper_variation,
                    lower_bound: (value - lower_variation).max(0.01),
                }
            })
            .collect()
    }

    /// Borrowing positions with ids `pos-0 .. pos-{count-1}`
    pub fn risk_positions(&mut self, count: usize) -> Vec<RiskPosition> {
        (0..count)
            .map(|i| {
                let health_factor = self.rng.uniform(0.8, 3.3);
                let collateral_usd = self.rng.uniform(50_000.0, 500_000.0);
                let address = (self.rng.next_f64() * 4_294_967_296.0) as u32;

                RiskPosition {
                    id: format!("pos-{}", i),
                    user_address: format!("0x{:08x}...", address),
                    collateral_usd,
                    borrowed_usd: collateral_usd / health_factor * COLLATERAL_FACTOR,
                    health_factor,
                    liquidation_price: self.rng.uniform(1500.0, 2500.0),
                    asset: *self.rng.pick(&RISK_ASSETS),
                    risk_level: RiskLevel::from_health_factor(health_factor),
                }
            })
            .collect()
    }

    /// Oracle deviation events from the last hour, newest first
    pub fn oracle_events(&mut self, count: usize) -> Vec<OracleEvent> {
        let now = Utc::now();

        let mut events: Vec<OracleEvent> = (0..count)
            .map(|i| {
                let asset = *self.rng.pick(&ORACLE_PAIRS);
                let deviation = self.rng.uniform(-2.0, 2.0);
                let age_ms = self.rng.uniform(0.0, ORACLE_WINDOW_MS);

                OracleEvent {
                    id: format!("oracle-{}", i),
                    timestamp: now - Duration::milliseconds(age_ms as i64),
                    asset: asset.to_string(),
                    price_source: *self.rng.pick(&PriceSource::ALL),
                    price: reference_price(asset) * (1.0 + deviation / 100.0),
                    deviation,
                    severity: Severity::from_deviation(deviation),
                }
            })
            .collect();

        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
    }

    /// Collateral mix across [`DISTRIBUTION_ASSETS`]; percentages sum to 1
    pub fn asset_distribution(&mut self) -> Vec<AssetDistribution> {
        let values: Vec<f64> = DISTRIBUTION_ASSETS
            .iter()
            .map(|_| self.rng.uniform(1e9, 4e9))
            .collect();
        let total: f64 = values.iter().sum();

        DISTRIBUTION_ASSETS
            .iter()
            .zip(values)
            .map(|(asset, value)| AssetDistribution {
                asset: *asset,
                value,
                percentage: value / total,
            })
            .collect()
    }
}

/// Reference price a pair's oracle readings deviate from
fn reference_price(pair: &str) -> f64 {
    if pair.starts_with("BTC") {
        45_000.0
    } else if pair.starts_with("ETH") {
        2_500.0
    } else {
        15.0
    }
}

fn days_before(now: DateTime<Utc>, days: usize) -> DateTime<Utc> {
    now - Duration::days(days as i64)
}

// ============================================================================
// ONE-SHOT HELPERS (fresh entropy-seeded generator per call)
// ============================================================================

pub fn generate_protocol_metrics(protocol: &str) -> ProtocolMetrics {
    MetricsGenerator::from_entropy().protocol_metrics(protocol)
}

pub fn generate_time_series(days: usize) -> Vec<TimeSeriesPoint> {
    MetricsGenerator::from_entropy().time_series(days)
}

pub fn generate_confidence_interval_series(
    days: usize,
    confidence_percent: u32,
) -> Vec<ConfidenceIntervalPoint> {
    MetricsGenerator::from_entropy()
        .confidence_interval_series(days, ConfidenceLevel::from_percent(confidence_percent))
}

pub fn generate_risk_positions(count: usize) -> Vec<RiskPosition> {
    MetricsGenerator::from_entropy().risk_positions(count)
}

pub fn generate_oracle_events(count: usize) -> Vec<OracleEvent> {
    MetricsGenerator::from_entropy().oracle_events(count)
}

pub fn generate_asset_distribution() -> Vec<AssetDistribution> {
    MetricsGenerator::from_entropy().asset_distribution()
}
