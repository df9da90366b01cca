//! Risk bucketing
//!
//! Maps backend risk output onto the three display tiers (green, yellow, red).
//!
//! Global invariants enforced:
//! - Bucketing is total: every input maps to exactly one tier
//! - Percentage rounding is nearest-integer, so re-rendering is idempotent

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display tier shared by chat bubbles, forecast cards and dashboard rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,    // green
    Medium, // yellow
    High,   // red
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }

    /// Capitalized label shown next to a percentage
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Low => "Low",
            Tier::Medium => "Medium",
            Tier::High => "High",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Tier::Low => "green",
            Tier::Medium => "yellow",
            Tier::High => "red",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical risk level emitted by the backend
///
/// The backend also emits `"safe"`, which is an alias for `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            RiskLevel::Critical | RiskLevel::High => Tier::High,
            RiskLevel::Medium => Tier::Medium,
            RiskLevel::Low => Tier::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level string is not one the backend is known to emit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown risk level: {0:?}")]
pub struct UnknownRiskLevel(pub String);

impl FromStr for RiskLevel {
    type Err = UnknownRiskLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "safe" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(UnknownRiskLevel(s.to_string())),
        }
    }
}

/// Percentage thresholds for the numeric bucketing rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    /// Percentages strictly above this are at least Medium
    pub medium: f64,
    /// Percentages strictly above this are High
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds {
            medium: 40.0,
            high: 70.0,
        }
    }
}

/// Bucket a 0-100 percentage with default thresholds
///
/// - `p > 70` → High
/// - `40 < p <= 70` → Medium
/// - `p <= 40` → Low
pub fn bucket_percentage(p: f64) -> Tier {
    bucket_percentage_with_thresholds(p, &RiskThresholds::default())
}

/// Bucket a percentage with custom thresholds
///
/// NaN compares false against both thresholds and lands in Low.
pub fn bucket_percentage_with_thresholds(p: f64, thresholds: &RiskThresholds) -> Tier {
    if p > thresholds.high {
        Tier::High
    } else if p > thresholds.medium {
        Tier::Medium
    } else {
        Tier::Low
    }
}

/// Tier for a raw level string; unrecognized strings fall back to Low
pub fn tier_for_level(level: &str) -> Tier {
    match level.parse::<RiskLevel>() {
        Ok(level) => level.tier(),
        Err(e) => {
            tracing::debug!("{e}, defaulting to low tier");
            Tier::Low
        }
    }
}

/// Canonical bucketing when both a categorical level and a percentage exist
///
/// A recognized backend level wins; otherwise the percentage decides.
pub fn resolve_tier(level: Option<&str>, percent: f64, thresholds: &RiskThresholds) -> Tier {
    match level.map(str::parse::<RiskLevel>) {
        Some(Ok(level)) => level.tier(),
        _ => bucket_percentage_with_thresholds(percent, thresholds),
    }
}

/// Scale a [0,1] score to an integer percentage (nearest, half away from zero)
pub fn to_percent(score: f64) -> i64 {
    (score * 100.0).round() as i64
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
