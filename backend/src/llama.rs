//! DeFiLlama client
//!
//! The one live data source: latest TVL and metadata for a protocol from
//! `GET {base}/protocol/{slug}`. Callers on the display path use
//! [`LlamaClient::fetch_protocol_or_none`], which never fails and lets
//! them fall back to generated data.

use crate::{
    error::{DashboardError, Result},
    types::ProtocolId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.llama.fi";

/// Live protocol data shown beside the generated snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveProtocolData {
    /// Latest TVL in USD (0 when DeFiLlama reports none)
    pub tvl: f64,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub chains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProtocolResponse {
    name: Option<String>,
    symbol: Option<String>,
    #[serde(default)]
    chains: Vec<String>,
    #[serde(default)]
    tvl: Vec<TvlEntry>,
    #[serde(default, rename = "chainTvls")]
    chain_tvls: HashMap<String, ChainTvl>,
}

#[derive(Debug, Deserialize)]
struct TvlEntry {
    #[serde(default, rename = "totalLiquidityUSD")]
    total_liquidity_usd: f64,
}

#[derive(Debug, Deserialize)]
struct ChainTvl {
    #[serde(default)]
    tvl: Vec<TvlEntry>,
}

impl ProtocolResponse {
    /// Last aggregate TVL entry, else the first Ethereum entry, else 0
    fn latest_tvl(&self) -> f64 {
        let aggregate = self
            .tvl
            .last()
            .map(|e| e.total_liquidity_usd)
            .filter(|v| *v != 0.0);

        let ethereum = || {
            self.chain_tvls
                .get("Ethereum")
                .and_then(|chain| chain.tvl.first())
                .map(|e| e.total_liquidity_usd)
                .filter(|v| *v != 0.0)
        };

        aggregate.or_else(ethereum).unwrap_or(0.0)
    }
}

/// Map a dashboard protocol id to its DeFiLlama slug; unknown ids pass through
pub fn protocol_slug(protocol: &str) -> String {
    protocol
        .parse::<ProtocolId>()
        .map(|p| p.llama_slug().to_string())
        .unwrap_or_else(|_| protocol.to_string())
}

/// Parse a `/protocol/{slug}` response body
pub fn parse_protocol(body: &str) -> Result<LiveProtocolData> {
    let response: ProtocolResponse = serde_json::from_str(body)
        .map_err(|e| DashboardError::Parse(format!("DeFiLlama response: {}", e)))?;

    Ok(LiveProtocolData {
        tvl: response.latest_tvl(),
        name: response.name.clone(),
        symbol: response.symbol.clone(),
        chains: response.chains.clone(),
    })
}

pub struct LlamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl LlamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn protocol_url(&self, protocol: &str) -> String {
        format!("{}/protocol/{}", self.base_url, protocol_slug(protocol))
    }

    pub async fn fetch_protocol(&self, protocol: &str) -> Result<LiveProtocolData> {
        let url = self.protocol_url(protocol);
        debug!("Fetching DeFiLlama data from {}", url);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DashboardError::UpstreamStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let data = parse_protocol(&body)?;

        debug!("DeFiLlama TVL for {}: ${:.0}", protocol, data.tvl);
        Ok(data)
    }

    /// Like [`fetch_protocol`](Self::fetch_protocol) but logs and swallows
    /// every failure
    pub async fn fetch_protocol_or_none(&self, protocol: &str) -> Option<LiveProtocolData> {
        match self.fetch_protocol(protocol).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("Live data unavailable for {}, using generated data: {}", protocol, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_mapping() {
        assert_eq!(protocol_slug("compound"), "compound-finance");
        assert_eq!(protocol_slug("curve"), "curve-dex");
        assert_eq!(protocol_slug("aave"), "aave");
        assert_eq!(protocol_slug("lido"), "lido");
    }

    #[test]
    fn test_protocol_url() {
        let client = LlamaClient::new("https://api.llama.fi/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.protocol_url("compound"),
            "https://api.llama.fi/protocol/compound-finance"
        );
    }

    #[test]
    fn test_parse_latest_tvl() {
        let body = r#"{
            "name": "Aave",
            "symbol": "AAVE",
            "chains": ["Ethereum", "Polygon"],
            "tvl": [
                {"date": 1700000000, "totalLiquidityUSD": 1000.5},
                {"date": 1700086400, "totalLiquidityUSD": 2000.25}
            ]
        }"#;

        let data = parse_protocol(body).unwrap();
        assert_eq!(data.tvl, 2000.25);
        assert_eq!(data.name.as_deref(), Some("Aave"));
        assert_eq!(data.symbol.as_deref(), Some("AAVE"));
        assert_eq!(data.chains, vec!["Ethereum", "Polygon"]);
    }

    #[test]
    fn test_parse_falls_back_to_ethereum_chain() {
        let body = r#"{
            "name": "Maker",
            "tvl": [],
            "chainTvls": {
                "Ethereum": {"tvl": [{"date": 1, "totalLiquidityUSD": 42.0}]}
            }
        }"#;

        let data = parse_protocol(body).unwrap();
        assert_eq!(data.tvl, 42.0);
        assert!(data.chains.is_empty());
    }

    #[test]
    fn test_parse_defaults_to_zero() {
        let data = parse_protocol(r#"{"name": "Empty"}"#).unwrap();
        assert_eq!(data.tvl, 0.0);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_protocol("not json").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_degrades_to_none() {
        // nothing listens on port 9 of the loopback interface
        let client = LlamaClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(client.fetch_protocol_or_none("aave").await.is_none());
    }

    // Requires network access
    #[tokio::test]
    #[ignore]
    async fn test_live_fetch() {
        let client = LlamaClient::new(DEFAULT_BASE_URL, Duration::from_secs(10)).unwrap();
        let data = client.fetch_protocol("aave").await.unwrap();
        assert!(data.tvl > 0.0);
    }
}
