//! Forecast formatting
//!
//! Converts a multi-day forecast into per-day rows with calendar dates
//! relative to a caller-supplied `today`, so output is reproducible.

use crate::api::ForecastResponse;
use crate::risk::{resolve_tier, to_percent, RiskThresholds, Tier};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// One formatted forecast row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRow {
    pub step: u32,
    /// `Day {step}`
    pub day_label: String,
    /// `Mar 5`
    pub calendar_date: String,
    /// `Tue, Mar 5`
    pub full_calendar_date: String,
    pub score_pct: i64,
    pub level: Option<String>,
    pub tier: Tier,
}

/// Card for one entry of `daily_risk_pct`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyCard {
    pub day_label: String,
    pub percent: i64,
    pub tier: Tier,
}

/// Everything the forecast panel shows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastView {
    pub rows: Vec<ForecastRow>,
    pub daily_cards: Vec<DailyCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Format forecast entries, one row per entry, input order preserved
pub fn format_forecast(
    response: &ForecastResponse,
    today: NaiveDate,
    thresholds: &RiskThresholds,
) -> Vec<ForecastRow> {
    response
        .forecast
        .iter()
        .map(|entry| {
            let score_pct = to_percent(entry.score);
            let date = today.checked_add_days(Days::new(u64::from(entry.step)));
            let (calendar_date, full_calendar_date) = match date {
                Some(d) => (
                    d.format("%b %-d").to_string(),
                    d.format("%a, %b %-d").to_string(),
                ),
                None => (String::new(), String::new()),
            };
            ForecastRow {
                step: entry.step,
                day_label: format!("Day {}", entry.step),
                calendar_date,
                full_calendar_date,
                score_pct,
                level: entry.risk_level.clone(),
                tier: resolve_tier(entry.risk_level.as_deref(), score_pct as f64, thresholds),
            }
        })
        .collect()
}

/// Cards for `daily_risk_pct`, numbered by position
///
/// A card takes the level of the forecast entry at the same position, so a
/// card and its detailed row always agree on the tier.
pub fn daily_cards(response: &ForecastResponse, thresholds: &RiskThresholds) -> Vec<DailyCard> {
    response
        .daily_risk_pct
        .iter()
        .enumerate()
        .map(|(idx, pct)| {
            let level = response
                .forecast
                .get(idx)
                .and_then(|entry| entry.risk_level.as_deref());
            DailyCard {
                day_label: format!("Day {}", idx + 1),
                percent: *pct,
                tier: resolve_tier(level, *pct as f64, thresholds),
            }
        })
        .collect()
}

/// Build the full forecast view
pub fn build_forecast_view(
    response: &ForecastResponse,
    today: NaiveDate,
    thresholds: &RiskThresholds,
) -> ForecastView {
    if let Some(ref err) = response.error {
        tracing::warn!("backend returned a fallback forecast: {}", err);
    }
    ForecastView {
        rows: format_forecast(response, today, thresholds),
        daily_cards: daily_cards(response, thresholds),
        warning: response.error.clone(),
    }
}
