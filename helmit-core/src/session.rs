//! Per-session dashboard state
//!
//! A [`Session`] owns the conversation log and the last stats and forecast
//! the user fetched. It lives for one run of the front end and is never
//! persisted.
//!
//! Global invariants enforced:
//! - Messages are immutable once appended
//! - A failed fetch never overwrites previously fetched panel state
//! - At most one request per action is in flight; other actions stay usable
//! - The state lock is never held across an await point

use crate::aggregates::{compute_stats_series, StatsSeries};
use crate::api::{ForecastResponse, PrivacyFinding, StatsSnapshot};
use crate::classify::{render_analysis, Category, LabelSelection, PREDICTION_FAILED_TEXT};
use crate::client::{ClientError, RiskClient};
use crate::forecast::{build_forecast_view, ForecastView};
use crate::risk::RiskThresholds;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of forecast days requested
pub const DEFAULT_FORECAST_DAYS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "self")]
    User,
    #[serde(rename = "other")]
    Other,
}

/// One entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: Sender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage {
            text: text.into(),
            sender: Sender::User,
            category: None,
        }
    }

    pub fn reply(text: impl Into<String>, category: Option<Category>) -> Self {
        ChatMessage {
            text: text.into(),
            sender: Sender::Other,
            category,
        }
    }
}

/// User-triggered request kinds, each guarded independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Send,
    Stats,
    Forecast,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Send => "send",
            Action::Stats => "stats",
            Action::Forecast => "forecast",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a {0} request is already in progress")]
    Busy(Action),

    #[error("message blocked: {0} detected")]
    PrivacyBlocked(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Rules applied when rendering session data
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub thresholds: RiskThresholds,
    pub labels: LabelSelection,
    pub forecast_days: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            thresholds: RiskThresholds::default(),
            labels: LabelSelection::default(),
            forecast_days: DEFAULT_FORECAST_DAYS,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    messages: Vec<ChatMessage>,
    stats: Option<StatsSnapshot>,
    forecast: Option<ForecastResponse>,
    privacy_alert: Option<PrivacyFinding>,
}

#[derive(Debug, Default)]
struct InFlight {
    send: AtomicBool,
    stats: AtomicBool,
    forecast: AtomicBool,
}

impl InFlight {
    fn flag(&self, action: Action) -> &AtomicBool {
        match action {
            Action::Send => &self.send,
            Action::Stats => &self.stats,
            Action::Forecast => &self.forecast,
        }
    }
}

/// Marks an action as in flight until dropped
#[derive(Debug)]
pub struct ActionGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Conversation and panel state for one user session
#[derive(Debug)]
pub struct Session {
    client: RiskClient,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    in_flight: InFlight,
}

impl Session {
    pub fn new(client: RiskClient, settings: SessionSettings) -> Self {
        Session {
            client,
            settings,
            state: Mutex::new(SessionState::default()),
            in_flight: InFlight::default(),
        }
    }

    pub fn client(&self) -> &RiskClient {
        &self.client
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // State is plain data; a panic elsewhere cannot leave it half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `action`, or fail with [`SessionError::Busy`] if it is already running
    pub fn begin(&self, action: Action) -> Result<ActionGuard<'_>, SessionError> {
        let flag = self.in_flight.flag(action);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy(action))?;
        Ok(ActionGuard { flag })
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.in_flight.flag(action).load(Ordering::Acquire)
    }

    /// Run the privacy scan on a draft
    ///
    /// A flagged draft raises the privacy alert, which blocks sending until
    /// the user dismisses or confirms it. A clean or empty draft clears it.
    pub async fn check_draft(&self, text: &str) -> Result<Option<PrivacyFinding>, SessionError> {
        if text.trim().is_empty() {
            self.clear_privacy_alert();
            return Ok(None);
        }

        let finding = self.client.check_privacy(text).await?;
        let mut state = self.state();
        if finding.flagged {
            tracing::info!(kind = finding.kind_or_default(), "draft flagged by privacy scan");
            state.privacy_alert = Some(finding.clone());
            Ok(Some(finding))
        } else {
            state.privacy_alert = None;
            Ok(None)
        }
    }

    pub fn privacy_alert(&self) -> Option<PrivacyFinding> {
        self.state().privacy_alert.clone()
    }

    /// "Keep it to myself": drop the alert without allowing the draft through
    pub fn dismiss_privacy_alert(&self) {
        self.clear_privacy_alert();
    }

    /// "Send anyway": drop the alert and let the next message through
    pub fn confirm_privacy_alert(&self) {
        self.clear_privacy_alert();
    }

    fn clear_privacy_alert(&self) {
        self.state().privacy_alert = None;
    }

    /// Send a message and append the classifier's analysis to the log
    ///
    /// Classifier failures are not returned as errors: they become an
    /// apology reply in the conversation.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        if let Some(alert) = self.privacy_alert() {
            return Err(SessionError::PrivacyBlocked(
                alert.kind_or_default().to_string(),
            ));
        }

        let _guard = self.begin(Action::Send)?;
        self.state().messages.push(ChatMessage::user(text));

        let reply = match self.client.classify(text).await {
            Ok(summary) => ChatMessage::reply(
                render_analysis(&summary, &self.settings.labels),
                Some(summary.category()),
            ),
            Err(e) => {
                tracing::warn!("prediction failed: {}", e);
                ChatMessage::reply(PREDICTION_FAILED_TEXT, None)
            }
        };

        self.state().messages.push(reply.clone());
        Ok(reply)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    /// Fetch stats; on failure the previous snapshot is kept
    pub async fn refresh_stats(&self) -> Result<StatsSnapshot, SessionError> {
        let _guard = self.begin(Action::Stats)?;
        let stats = self.client.stats().await?;
        self.state().stats = Some(stats.clone());
        Ok(stats)
    }

    /// Fetch the forecast; on failure the previous forecast is kept
    pub async fn refresh_forecast(&self) -> Result<ForecastResponse, SessionError> {
        let _guard = self.begin(Action::Forecast)?;
        let forecast = self.client.forecast(self.settings.forecast_days).await?;
        self.state().forecast = Some(forecast.clone());
        Ok(forecast)
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.state().stats.clone()
    }

    pub fn forecast(&self) -> Option<ForecastResponse> {
        self.state().forecast.clone()
    }

    pub fn stats_series(&self) -> Option<StatsSeries> {
        self.state()
            .stats
            .as_ref()
            .map(|s| compute_stats_series(s, &self.settings.thresholds))
    }

    pub fn forecast_view(&self, today: NaiveDate) -> Option<ForecastView> {
        self.state()
            .forecast
            .as_ref()
            .map(|f| build_forecast_view(f, today, &self.settings.thresholds))
    }
}
