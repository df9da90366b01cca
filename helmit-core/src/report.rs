//! Text and JSON rendering for the terminal
//!
//! Global invariants enforced:
//! - Output ordering follows the series ordering exactly
//! - Identical input yields byte-for-byte identical output

use crate::aggregates::StatsSeries;
use crate::forecast::ForecastView;
use crate::session::{ChatMessage, Sender};
use serde::Serialize;

/// Width of the longest bar in text charts
const BAR_WIDTH: usize = 30;

/// Render the statistics panel as text
pub fn render_stats_text(series: &StatsSeries) -> String {
    let mut output = String::new();
    let cards = &series.summary;

    output.push_str("Statistics\n");
    output.push_str(&format!(
        "  Total predictions: {}\n  Avg risk score:    {}%\n  Low risk:          {}\n  High risk:         {}\n",
        cards.total_predictions,
        cards.average_risk_score,
        cards.low_count,
        cards.high_count
    ));

    if !series.distribution.is_empty() {
        output.push_str("\nRisk Level Distribution\n");
        let total: u64 = series.distribution.iter().map(|p| p.value).sum();
        for point in &series.distribution {
            let share = if total == 0 {
                0
            } else {
                ((point.value as f64 / total as f64) * 100.0).round() as i64
            };
            output.push_str(&format!(
                "  {:<10} {:>6} {:>4}%  [{}]\n",
                truncate_or_pad(&point.name, 10),
                point.value,
                share,
                point.tier.color()
            ));
        }
    }

    if !series.labels.is_empty() {
        output.push_str("\nLabel Distribution\n");
        for point in &series.labels {
            output.push_str(&format!(
                "  {:<20} {:>6.1}  {}\n",
                truncate_or_pad(&point.name, 20),
                point.value,
                bar(point.value)
            ));
        }
    }

    if !series.timeline.is_empty() {
        output.push_str("\nRisk Score Timeline\n");
        for point in &series.timeline {
            output.push_str(&format!(
                "  {:>3} {:>6.1}  {:<8} {}\n",
                point.index,
                point.score,
                point.level,
                bar(point.score)
            ));
        }
    }

    if !series.daily_averages.is_empty() {
        output.push_str("\nDaily Risk Averages\n");
        for point in &series.daily_averages {
            output.push_str(&format!(
                "  {:<8} {:>6.1}  {:<6} {}\n",
                point.date,
                point.average,
                point.tier.label(),
                bar(point.average)
            ));
        }
    }

    output
}

/// Render the forecast panel as text
pub fn render_forecast_text(view: &ForecastView) -> String {
    let mut output = String::new();

    if let Some(ref warning) = view.warning {
        output.push_str(&format!("warning: {}\n\n", warning));
    }

    if view.rows.is_empty() && view.daily_cards.is_empty() {
        output.push_str("No forecast available. Start chatting to generate forecast data.\n");
        return output;
    }

    if !view.daily_cards.is_empty() {
        output.push_str("Risk Forecast\n");
        for card in &view.daily_cards {
            output.push_str(&format!(
                "  {:<7} {:>4}%  {}\n",
                card.day_label,
                card.percent,
                card.tier.label().to_uppercase()
            ));
        }
    }

    if !view.rows.is_empty() {
        if !view.daily_cards.is_empty() {
            output.push('\n');
        }
        output.push_str("Detailed Forecast\n");
        output.push_str(&format!(
            "  {:<7} {:<12} {:>5}  {:<9} {}\n",
            "DAY", "DATE", "SCORE", "LEVEL", "TIER"
        ));
        for row in &view.rows {
            output.push_str(&format!(
                "  {:<7} {:<12} {:>4}%  {:<9} {}\n",
                row.day_label,
                row.full_calendar_date,
                row.score_pct,
                row.level.as_deref().unwrap_or("-"),
                row.tier.color()
            ));
        }
    }

    output
}

/// Render one chat message; replies carry their category badge
pub fn render_message(message: &ChatMessage) -> String {
    let prefix = match message.sender {
        Sender::User => "you",
        Sender::Other => "helmit",
    };
    let mut output = String::new();
    for (i, line) in message.text.lines().enumerate() {
        if i == 0 {
            output.push_str(&format!("{:>6} | {}\n", prefix, line));
        } else {
            output.push_str(&format!("{:>6} | {}\n", "", line));
        }
    }
    if let Some(category) = message.category {
        output.push_str(&format!("{:>6} | [{}]\n", "", category.badge()));
    }
    output
}

/// Render any series as pretty JSON
pub fn render_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Proportional bar for a 0-100 value
fn bar(value: f64) -> String {
    let clamped = value.clamp(0.0, 100.0);
    let len = ((clamped / 100.0) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len)
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::compute_stats_series;
    use crate::api::{ForecastResponse, StatsSnapshot};
    use crate::classify::Category;
    use crate::forecast::build_forecast_view;
    use crate::risk::RiskThresholds;
    use chrono::NaiveDate;

    #[test]
    fn test_stats_text_sections() {
        let stats: StatsSnapshot = serde_json::from_str(
            r#"{"total_predictions": 8, "average_risk_score": 25.5,
                "risk_level_distribution": {"low": 5, "medium": 2, "high": 1},
                "label_distribution": {"self_harm": 40.0}}"#,
        )
        .unwrap();
        let text = render_stats_text(&compute_stats_series(&stats, &RiskThresholds::default()));
        assert!(text.contains("Total predictions: 8"));
        assert!(text.contains("Avg risk score:    25.5%"));
        assert!(text.contains("Risk Level Distribution"));
        assert!(text.contains("Self Harm"));
        assert!(!text.contains("Risk Score Timeline"));
        let low = text.find("Low  ").unwrap();
        let medium = text.find("Medium").unwrap();
        assert!(low < medium);
    }

    #[test]
    fn test_forecast_text_empty() {
        let view = build_forecast_view(
            &ForecastResponse::default(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            &RiskThresholds::default(),
        );
        assert!(render_forecast_text(&view).contains("No forecast available"));
    }

    #[test]
    fn test_forecast_text_rows() {
        let resp: ForecastResponse = serde_json::from_str(
            r#"{"forecast": [{"step": 1, "score": 0.8, "risk_level": "critical"}],
                "daily_risk_pct": [80]}"#,
        )
        .unwrap();
        let view = build_forecast_view(
            &resp,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            &RiskThresholds::default(),
        );
        let text = render_forecast_text(&view);
        assert!(text.contains("Day 1"));
        assert!(text.contains("HIGH"));
        assert!(text.contains("Tue, Mar 5"));
        assert!(text.contains("critical"));
    }

    #[test]
    fn test_render_message_badge() {
        let msg = ChatMessage::reply("line one\nline two", Some(Category::SelfHarm));
        let text = render_message(&msg);
        assert_eq!(
            text,
            "helmit | line one\n       | line two\n       | [SELF HARM]\n"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let stats: StatsSnapshot =
            serde_json::from_str(r#"{"daily_risk_averages": {"2024-01-02": 50.0}}"#).unwrap();
        let series = compute_stats_series(&stats, &RiskThresholds::default());
        assert_eq!(render_stats_text(&series), render_stats_text(&series));
        assert_eq!(render_json(&series), render_json(&series));
    }

    #[test]
    fn test_bar_clamps() {
        assert_eq!(bar(150.0).len(), BAR_WIDTH);
        assert_eq!(bar(-5.0).len(), 0);
    }
}
