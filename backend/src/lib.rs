//! Synthetic DeFi risk metrics: randomized generators for the dashboard's
//! data sets, a timer-driven simulated push feed, and the HTTP service that
//! serves both next to live DeFiLlama TVL.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod generator;
pub mod llama;
pub mod random;
pub mod types;

pub use error::{DashboardError, FeedError, Result};
pub use feed::{FeedConfig, SimulatedFeed};
pub use generator::{
    generate_asset_distribution, generate_confidence_interval_series, generate_oracle_events,
    generate_protocol_metrics, generate_risk_positions, generate_time_series, MetricsGenerator,
};
