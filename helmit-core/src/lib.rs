//! Helmit core library - client and presentation rules for the message-safety backend

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Backend responses are validated once, at deserialization
// - Bucketing, reshaping and formatting are pure and total
// - No global mutable state; session state is owned by `Session`
// - Identical input yields byte-for-byte identical rendered output

pub mod aggregates;
pub mod api;
pub mod classify;
pub mod client;
pub mod config;
pub mod forecast;
pub mod labels;
pub mod report;
pub mod risk;
pub mod session;

pub use aggregates::{compute_stats_series, StatsSeries};
pub use api::{ForecastResponse, PrivacyFinding, StatsSnapshot};
pub use classify::{render_analysis, RiskSummary};
pub use client::{ClientError, ClientOptions, EndpointLayout, RiskClient};
pub use config::ResolvedConfig;
pub use forecast::{build_forecast_view, ForecastView};
pub use risk::{bucket_percentage, RiskLevel, Tier};
pub use session::{ChatMessage, Session, SessionError};
