//! Classifier response normalization
//!
//! Turns a `/predict` response into a [`RiskSummary`] and the analysis text
//! appended to the conversation.

use crate::api::{OrderedMap, PredictResponse};
use crate::labels::{select_top_labels, LabelScore, LABEL_THRESHOLD, TOP_LABELS};
use crate::risk::{resolve_tier, to_percent, RiskLevel, RiskThresholds, Tier};
use serde::{Deserialize, Serialize};

/// Reply shown when prediction fails for any reason
pub const PREDICTION_FAILED_TEXT: &str =
    "Sorry, there was an error processing your message. Please try again.";

/// Normalized result of one classifier call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Level string as sent by the backend (`"low"` when absent)
    pub level: String,
    /// Score in [0, 1]
    pub score: f64,
    pub label_scores: OrderedMap<f64>,
}

impl RiskSummary {
    pub fn from_response(response: PredictResponse) -> Self {
        let summary = response.summary;
        let level = summary
            .risk
            .level
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "low".to_string());
        RiskSummary {
            level,
            score: summary.risk.score.unwrap_or(0.0),
            label_scores: summary.agg_label_scores,
        }
    }

    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.level.parse().ok()
    }

    pub fn score_percent(&self) -> i64 {
        to_percent(self.score)
    }

    pub fn tier(&self, thresholds: &RiskThresholds) -> Tier {
        resolve_tier(Some(&self.level), self.score_percent() as f64, thresholds)
    }

    /// Chat badge category for the classifier's reply
    pub fn category(&self) -> Category {
        match self.risk_level() {
            Some(RiskLevel::Medium) => Category::Bullying,
            Some(RiskLevel::High) | Some(RiskLevel::Critical) => Category::SelfHarm,
            Some(RiskLevel::Low) | None => Category::Safe,
        }
    }
}

/// How detected labels are selected for the analysis text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelSelection {
    pub threshold: f64,
    pub top: usize,
}

impl Default for LabelSelection {
    fn default() -> Self {
        LabelSelection {
            threshold: LABEL_THRESHOLD,
            top: TOP_LABELS,
        }
    }
}

impl LabelSelection {
    pub fn select(&self, summary: &RiskSummary) -> Vec<LabelScore> {
        select_top_labels(summary.label_scores.iter(), self.threshold, self.top)
    }
}

/// Analysis text for a classifier reply
///
/// ```text
/// Analysis: RISK LEVEL HIGH (Score: 82%)
///
/// Detected Categories:
/// Self-Harm: 75%
/// ```
pub fn render_analysis(summary: &RiskSummary, selection: &LabelSelection) -> String {
    let mut text = format!(
        "Analysis: RISK LEVEL {} (Score: {}%)",
        summary.level.to_uppercase(),
        summary.score_percent()
    );

    let detected = selection.select(summary);
    if detected.is_empty() {
        text.push_str("\n\nNo specific risks detected.");
    } else {
        text.push_str("\n\nDetected Categories:\n");
        let lines: Vec<String> = detected.iter().map(LabelScore::render).collect();
        text.push_str(&lines.join("\n"));
    }
    text
}

/// Badge category attached to a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Safe,
    Bullying,
    Harassment,
    SelfHarm,
    Adult,
    Privacy,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Safe => "safe",
            Category::Bullying => "bullying",
            Category::Harassment => "harassment",
            Category::SelfHarm => "self_harm",
            Category::Adult => "adult",
            Category::Privacy => "privacy",
        }
    }

    /// Upper-case badge text (`self_harm` → `SELF HARM`)
    pub fn badge(&self) -> String {
        self.as_str().replacen('_', " ", 1).to_uppercase()
    }

    /// Badge color name
    pub fn color(&self) -> &'static str {
        match self {
            Category::Safe => "green",
            Category::Bullying => "yellow",
            Category::Harassment => "orange",
            Category::SelfHarm => "red",
            Category::Adult => "purple",
            Category::Privacy => "blue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> PredictResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_high_risk_scenario() {
        let resp = response(
            r#"{"summary": {
                "risk": {"level": "high", "score": 0.82},
                "agg_label_scores": {"self_harm": 0.75, "harassment": 0.05}
            }}"#,
        );
        let summary = RiskSummary::from_response(resp);
        let text = render_analysis(&summary, &LabelSelection::default());
        assert!(text.contains("RISK LEVEL HIGH (Score: 82%)"), "{}", text);
        assert!(text.contains("Self-Harm: 75%"), "{}", text);
        assert!(!text.contains("Harassment"), "{}", text);
        assert_eq!(summary.category(), Category::SelfHarm);
        assert_eq!(summary.tier(&RiskThresholds::default()), Tier::High);
    }

    #[test]
    fn test_no_labels_above_threshold() {
        let resp = response(
            r#"{"summary": {
                "risk": {"level": "low", "score": 0.03},
                "agg_label_scores": {"harassment": 0.02}
            }}"#,
        );
        let summary = RiskSummary::from_response(resp);
        let text = render_analysis(&summary, &LabelSelection::default());
        assert_eq!(
            text,
            "Analysis: RISK LEVEL LOW (Score: 3%)\n\nNo specific risks detected."
        );
        assert_eq!(summary.category(), Category::Safe);
    }

    #[test]
    fn test_missing_risk_defaults() {
        let summary = RiskSummary::from_response(response("{}"));
        assert_eq!(summary.level, "low");
        assert_eq!(summary.score, 0.0);
        assert!(summary.label_scores.is_empty());
    }

    #[test]
    fn test_labels_listed_in_descending_order() {
        let resp = response(
            r#"{"summary": {
                "risk": {"level": "medium", "score": 0.5},
                "agg_label_scores": {"harassment": 0.2, "cyberbullying": 0.6}
            }}"#,
        );
        let summary = RiskSummary::from_response(resp);
        let text = render_analysis(&summary, &LabelSelection::default());
        assert!(text.ends_with("Detected Categories:\nCyberbullying: 60%\nHarassment: 20%"));
        assert_eq!(summary.category(), Category::Bullying);
    }

    #[test]
    fn test_category_badges() {
        assert_eq!(Category::SelfHarm.badge(), "SELF HARM");
        assert_eq!(Category::Safe.badge(), "SAFE");
        assert_eq!(Category::Privacy.color(), "blue");
    }

    #[test]
    fn test_critical_maps_to_self_harm_badge() {
        let resp = response(r#"{"summary": {"risk": {"level": "critical", "score": 0.95}}}"#);
        assert_eq!(RiskSummary::from_response(resp).category(), Category::SelfHarm);
    }
}
