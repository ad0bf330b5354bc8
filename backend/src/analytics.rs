//! Derived figures the dashboard shows next to the raw series:
//! TVL change over the window, liquidation risk buckets and the sortable
//! protocol comparison table.

use crate::{
    generator::MetricsGenerator,
    random::RandomSource,
    types::{ProtocolId, ProtocolMetrics, RiskLevel, RiskPosition, TimeSeriesPoint},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Percent change between the first and last point of a series
pub fn percent_change(series: &[TimeSeriesPoint]) -> Option<f64> {
    let first = series.first()?.value;
    let last = series.last()?.value;

    if first == 0.0 {
        return None;
    }

    Some((last - first) / first * 100.0)
}

pub fn average_value(series: &[TimeSeriesPoint]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    Some(series.iter().map(|p| p.value).sum::<f64>() / series.len() as f64)
}

/// Liquidation heatmap summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    /// Positions per risk level; every level is present
    pub counts: BTreeMap<String, usize>,

    /// Borrowed USD across high and critical positions
    #[serde(rename = "totalAtRiskUSD")]
    pub total_at_risk_usd: f64,
}

impl RiskSummary {
    pub fn from_positions(positions: &[RiskPosition]) -> Self {
        let mut counts: BTreeMap<String, usize> = RiskLevel::ALL
            .iter()
            .map(|level| (risk_level_name(*level).to_string(), 0))
            .collect();

        let mut total_at_risk_usd = 0.0;

        for position in positions {
            *counts
                .entry(risk_level_name(position.risk_level).to_string())
                .or_insert(0) += 1;

            if matches!(position.risk_level, RiskLevel::High | RiskLevel::Critical) {
                total_at_risk_usd += position.borrowed_usd;
            }
        }

        Self {
            counts,
            total_at_risk_usd,
        }
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        self.counts.get(risk_level_name(level)).copied().unwrap_or(0)
    }
}

fn risk_level_name(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
}

/// Sortable column of the comparison table
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Tvl,
    TotalBorrowed,
    UtilizationRate,
    AverageHealthFactor,
    #[serde(rename = "liquidationsLast24h")]
    LiquidationsLast24h,
    UniqueUsers,
}

impl SortKey {
    fn value(&self, metrics: &ProtocolMetrics) -> f64 {
        match self {
            SortKey::Tvl => metrics.tvl,
            SortKey::TotalBorrowed => metrics.total_borrowed,
            SortKey::UtilizationRate => metrics.utilization_rate,
            SortKey::AverageHealthFactor => metrics.average_health_factor,
            SortKey::LiquidationsLast24h => f64::from(metrics.liquidations_last24h),
            SortKey::UniqueUsers => f64::from(metrics.unique_users),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Stable sort of snapshots by one column
pub fn sort_metrics(metrics: &mut [ProtocolMetrics], key: SortKey, order: SortOrder) {
    metrics.sort_by(|a, b| {
        let ord = key
            .value(a)
            .partial_cmp(&key.value(b))
            .unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

/// Comparison table row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolRow {
    pub name: String,

    #[serde(flatten)]
    pub metrics: ProtocolMetrics,
}

/// One fresh snapshot per tracked protocol, sorted by `key`/`order`
pub fn compare_protocols<R: RandomSource>(
    generator: &mut MetricsGenerator<R>,
    key: SortKey,
    order: SortOrder,
) -> Vec<ProtocolRow> {
    let mut metrics: Vec<ProtocolMetrics> = ProtocolId::ALL
        .iter()
        .map(|p| generator.protocol_metrics(p.as_str()))
        .collect();

    sort_metrics(&mut metrics, key, order);

    metrics
        .into_iter()
        .map(|m| ProtocolRow {
            name: m
                .protocol
                .parse::<ProtocolId>()
                .map(|p| p.display_name())
                .unwrap_or_else(|_| m.protocol.clone()),
            metrics: m,
        })
        .collect()
}
