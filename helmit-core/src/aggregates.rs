//! Aggregation views - chart-ready series derived from a stats snapshot
//!
//! Global invariants enforced:
//! - Series are strictly derived (never stored, always computed)
//! - Backend ordering is preserved unless a sort is stated
//! - A missing snapshot field yields an empty series, never an error

use crate::api::StatsSnapshot;
use crate::labels::{capitalize, humanize};
use crate::risk::{
    bucket_percentage_with_thresholds, round1, tier_for_level, RiskThresholds, Tier,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of most recent timeline points kept for the timeline chart
pub const TIMELINE_WINDOW: usize = 30;

/// Slice of the risk level distribution (pie chart)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionPoint {
    pub name: String,
    pub value: u64,
    pub tier: Tier,
}

/// Average score for one label (bar chart)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelPoint {
    pub name: String,
    pub value: f64,
}

/// One prediction on the risk score timeline (area chart)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelinePoint {
    pub index: usize,
    pub score: f64,
    pub level: String,
}

/// Average score for one calendar day (bar chart)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyAveragePoint {
    pub date: String,
    pub average: f64,
    pub tier: Tier,
}

/// Headline numbers shown above the charts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryCards {
    pub total_predictions: u64,
    pub average_risk_score: f64,
    pub low_count: u64,
    pub high_count: u64,
}

/// All series for the statistics panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSeries {
    pub summary: SummaryCards,
    pub distribution: Vec<DistributionPoint>,
    pub labels: Vec<LabelPoint>,
    pub timeline: Vec<TimelinePoint>,
    pub daily_averages: Vec<DailyAveragePoint>,
}

/// `{name: Capitalized level, value: count}` in backend order
pub fn distribution_series(stats: &StatsSnapshot) -> Vec<DistributionPoint> {
    stats
        .risk_level_distribution
        .iter()
        .map(|(level, count)| DistributionPoint {
            name: capitalize(level),
            value: *count,
            tier: tier_for_level(level),
        })
        .collect()
}

/// `{name: Human Label, value: avg rounded to 0.1}` in backend order
pub fn label_series(stats: &StatsSnapshot) -> Vec<LabelPoint> {
    stats
        .label_distribution
        .iter()
        .map(|(label, avg)| LabelPoint {
            name: humanize(label),
            value: round1(*avg),
        })
        .collect()
}

/// Last [`TIMELINE_WINDOW`] points, re-indexed from 1
pub fn timeline_series(stats: &StatsSnapshot) -> Vec<TimelinePoint> {
    let timeline = &stats.risk_score_timeline;
    let start = timeline.len().saturating_sub(TIMELINE_WINDOW);
    timeline[start..]
        .iter()
        .enumerate()
        .map(|(idx, point)| TimelinePoint {
            index: idx + 1,
            score: round1(point.score),
            level: point.level.clone(),
        })
        .collect()
}

/// Daily averages sorted by ISO date ascending, dates formatted as `Mon D`
pub fn daily_average_series(
    stats: &StatsSnapshot,
    thresholds: &RiskThresholds,
) -> Vec<DailyAveragePoint> {
    let mut days: Vec<(&str, f64)> = stats
        .daily_risk_averages
        .iter()
        .map(|(date, avg)| (date, *avg))
        .collect();

    // ISO dates sort lexicographically
    days.sort_by(|a, b| a.0.cmp(b.0));

    days.into_iter()
        .map(|(date, avg)| {
            let average = round1(avg);
            DailyAveragePoint {
                date: format_iso_date(date),
                average,
                tier: bucket_percentage_with_thresholds(average, thresholds),
            }
        })
        .collect()
}

/// Headline cards; "low" falls back to the backend's "safe" bucket
pub fn summary_cards(stats: &StatsSnapshot) -> SummaryCards {
    let dist = &stats.risk_level_distribution;
    let count = |key: &str| dist.get(key).copied().unwrap_or(0);

    let low_count = match count("low") {
        0 => count("safe"),
        n => n,
    };

    SummaryCards {
        total_predictions: stats.total_predictions,
        average_risk_score: stats.average_risk_score,
        low_count,
        high_count: count("high") + count("critical"),
    }
}

/// Compute every series for the statistics panel
pub fn compute_stats_series(stats: &StatsSnapshot, thresholds: &RiskThresholds) -> StatsSeries {
    StatsSeries {
        summary: summary_cards(stats),
        distribution: distribution_series(stats),
        labels: label_series(stats),
        timeline: timeline_series(stats),
        daily_averages: daily_average_series(stats, thresholds),
    }
}

/// `2024-03-05` → `Mar 5`; anything unparseable is returned verbatim
fn format_iso_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => d.format("%b %-d").to_string(),
        Err(_) => {
            tracing::debug!(date, "daily average key is not an ISO date");
            date.to_string()
        }
    }
}
