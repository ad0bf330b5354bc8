use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base TVL used for protocol ids outside the tracked set
pub const DEFAULT_BASE_TVL: f64 = 5e9;

/// Tracked lending/DEX protocols
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolId {
    Aave,
    Compound,
    MakerDao,
    Curve,
    Uniswap,
}

impl ProtocolId {
    pub const ALL: [ProtocolId; 5] = [
        ProtocolId::Aave,
        ProtocolId::Compound,
        ProtocolId::MakerDao,
        ProtocolId::Curve,
        ProtocolId::Uniswap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolId::Aave => "aave",
            ProtocolId::Compound => "compound",
            ProtocolId::MakerDao => "makerdao",
            ProtocolId::Curve => "curve",
            ProtocolId::Uniswap => "uniswap",
        }
    }

    /// Baseline TVL in USD before jitter
    pub fn base_tvl(&self) -> f64 {
        match self {
            ProtocolId::Aave => 8.5e9,
            ProtocolId::Compound => 3.2e9,
            ProtocolId::MakerDao => 6.8e9,
            ProtocolId::Curve => 4.1e9,
            ProtocolId::Uniswap => 5.5e9,
        }
    }

    /// Protocol slug on the DeFiLlama API
    pub fn llama_slug(&self) -> &'static str {
        match self {
            ProtocolId::Aave => "aave",
            ProtocolId::Compound => "compound-finance",
            ProtocolId::MakerDao => "makerdao",
            ProtocolId::Curve => "curve-dex",
            ProtocolId::Uniswap => "uniswap",
        }
    }

    /// Name shown in the comparison table ("aave" -> "Aave")
    pub fn display_name(&self) -> String {
        let id = self.as_str();
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProtocolId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown protocol: {}", s))
    }
}

/// Point-in-time risk metrics for one protocol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolMetrics {
    /// Protocol id as requested (unknown ids are kept verbatim)
    pub protocol: String,

    /// Total value locked (USD)
    pub tvl: f64,

    /// Outstanding borrows (USD)
    pub total_borrowed: f64,

    /// Borrowed / supplied, in [0, 1]
    pub utilization_rate: f64,

    pub average_health_factor: f64,

    pub liquidations_last24h: u32,

    pub unique_users: u32,

    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Series point with an asymmetric band around the value.
///
/// Producers guarantee `lower_bound <= value <= upper_bound`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceIntervalPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
}

/// Confidence level selectable on the interval chart
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfidenceLevel {
    #[serde(rename = "90")]
    Ninety,
    #[serde(rename = "95")]
    NinetyFive,
}

impl ConfidenceLevel {
    /// 95 selects the wide band, every other percentage the narrow one
    pub fn from_percent(percent: u32) -> Self {
        if percent == 95 {
            ConfidenceLevel::NinetyFive
        } else {
            ConfidenceLevel::Ninety
        }
    }

    pub fn percent(&self) -> u32 {
        match self {
            ConfidenceLevel::Ninety => 90,
            ConfidenceLevel::NinetyFive => 95,
        }
    }

    /// Nominal interval half-width before per-point variation
    pub fn half_width(&self) -> f64 {
        match self {
            ConfidenceLevel::NinetyFive => 0.015,
            ConfidenceLevel::Ninety => 0.012,
        }
    }
}

/// Collateral and distribution assets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Asset {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "WBTC")]
    Wbtc,
    #[serde(rename = "USDC")]
    Usdc,
    #[serde(rename = "DAI")]
    Dai,
    #[serde(rename = "LINK")]
    Link,
    #[serde(rename = "UNI")]
    Uni,
    #[serde(rename = "AAVE")]
    Aave,
    #[serde(rename = "stETH")]
    StEth,
}

impl Asset {
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Eth => "ETH",
            Asset::Wbtc => "WBTC",
            Asset::Usdc => "USDC",
            Asset::Dai => "DAI",
            Asset::Link => "LINK",
            Asset::Uni => "UNI",
            Asset::Aave => "AAVE",
            Asset::StEth => "stETH",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Assets a borrowing position can be collateralised with
pub const RISK_ASSETS: [Asset; 7] = [
    Asset::Eth,
    Asset::Wbtc,
    Asset::Usdc,
    Asset::Dai,
    Asset::Link,
    Asset::Uni,
    Asset::Aave,
];

/// Assets in the collateral mix breakdown
pub const DISTRIBUTION_ASSETS: [Asset; 5] = [
    Asset::Eth,
    Asset::Wbtc,
    Asset::StEth,
    Asset::Usdc,
    Asset::Dai,
];

/// Price pairs watched for oracle deviations
pub const ORACLE_PAIRS: [&str; 5] = ["ETH/USD", "BTC/USD", "LINK/USD", "UNI/USD", "AAVE/USD"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Bucket a health factor.
    ///
    /// ```text
    /// hf < 1.2        critical
    /// 1.2 <= hf < 1.5 high
    /// 1.5 <= hf < 2.0 medium
    /// hf >= 2.0       low
    /// ```
    pub fn from_health_factor(health_factor: f64) -> Self {
        if health_factor < 1.2 {
            RiskLevel::Critical
        } else if health_factor < 1.5 {
            RiskLevel::High
        } else if health_factor < 2.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// A single borrowing position at risk of liquidation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskPosition {
    /// "pos-<index>"
    pub id: String,

    /// Display-only shortened address
    pub user_address: String,

    #[serde(rename = "collateralUSD")]
    pub collateral_usd: f64,

    #[serde(rename = "borrowedUSD")]
    pub borrowed_usd: f64,

    pub health_factor: f64,

    pub liquidation_price: f64,

    pub asset: Asset,

    pub risk_level: RiskLevel,
}

/// Price feed an oracle event was observed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriceSource {
    Chainlink,
    #[serde(rename = "Band Protocol")]
    BandProtocol,
    #[serde(rename = "API3")]
    Api3,
    #[serde(rename = "Uniswap TWAP")]
    UniswapTwap,
}

impl PriceSource {
    pub const ALL: [PriceSource; 4] = [
        PriceSource::Chainlink,
        PriceSource::BandProtocol,
        PriceSource::Api3,
        PriceSource::UniswapTwap,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Classify a signed deviation (percent) by its magnitude.
    /// Thresholds are strict: exactly 2.0 is a warning, exactly 1.0 is info.
    pub fn from_deviation(deviation_pct: f64) -> Self {
        let magnitude = deviation_pct.abs();
        if magnitude > 2.0 {
            Severity::Critical
        } else if magnitude > 1.0 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Oracle price observation and its deviation from the reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OracleEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,

    /// Pair, e.g. "ETH/USD"
    pub asset: String,

    pub price_source: PriceSource,
    pub price: f64,

    /// Signed deviation in percent
    pub deviation: f64,

    pub severity: Severity,
}

/// Share of one asset in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetDistribution {
    pub asset: Asset,
    pub value: f64,

    /// value / sum of values in the same batch
    pub percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_health_factor(0.8), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_health_factor(1.19), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_health_factor(1.2), RiskLevel::High);
        assert_eq!(RiskLevel::from_health_factor(1.49), RiskLevel::High);
        assert_eq!(RiskLevel::from_health_factor(1.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_health_factor(1.99), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_health_factor(2.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_health_factor(3.3), RiskLevel::Low);
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::from_deviation(2.01), Severity::Critical);
        assert_eq!(Severity::from_deviation(-2.5), Severity::Critical);
        assert_eq!(Severity::from_deviation(2.0), Severity::Warning);
        assert_eq!(Severity::from_deviation(-1.5), Severity::Warning);
        assert_eq!(Severity::from_deviation(1.0), Severity::Info);
        assert_eq!(Severity::from_deviation(0.5), Severity::Info);
        assert_eq!(Severity::from_deviation(0.0), Severity::Info);
    }

    #[test]
    fn test_protocol_id_parsing() {
        assert_eq!("aave".parse::<ProtocolId>().unwrap(), ProtocolId::Aave);
        assert_eq!("MakerDAO".parse::<ProtocolId>().unwrap(), ProtocolId::MakerDao);
        assert!("sushiswap".parse::<ProtocolId>().is_err());

        for protocol in ProtocolId::ALL {
            assert_eq!(protocol.as_str().parse::<ProtocolId>().unwrap(), protocol);
        }
    }

    #[test]
    fn test_display_name() {
        assert_eq!(ProtocolId::Aave.display_name(), "Aave");
        assert_eq!(ProtocolId::MakerDao.display_name(), "Makerdao");
    }

    #[test]
    fn test_confidence_level() {
        assert_eq!(ConfidenceLevel::from_percent(95), ConfidenceLevel::NinetyFive);
        assert_eq!(ConfidenceLevel::from_percent(90), ConfidenceLevel::Ninety);
        assert_eq!(ConfidenceLevel::from_percent(99), ConfidenceLevel::Ninety);
        assert_eq!(ConfidenceLevel::NinetyFive.half_width(), 0.015);
        assert_eq!(ConfidenceLevel::Ninety.half_width(), 0.012);
    }

    #[test]
    fn test_wire_format() {
        let position = RiskPosition {
            id: "pos-0".to_string(),
            user_address: "0xdeadbeef...".to_string(),
            collateral_usd: 100_000.0,
            borrowed_usd: 50_000.0,
            health_factor: 1.5,
            liquidation_price: 1800.0,
            asset: Asset::StEth,
            risk_level: RiskLevel::Medium,
        };

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["collateralUSD"], 100_000.0);
        assert_eq!(json["riskLevel"], "medium");
        assert_eq!(json["asset"], "stETH");
        assert_eq!(json["userAddress"], "0xdeadbeef...");

        let source = serde_json::to_value(PriceSource::UniswapTwap).unwrap();
        assert_eq!(source, "Uniswap TWAP");
    }
}
