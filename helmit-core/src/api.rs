//! Wire types for the Helmit backend
//!
//! Responses are validated here, at the boundary. Every field the backend may
//! omit (or send as `null`) has a defined default, so downstream code never
//! has to guard individual accesses.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// String-keyed map that keeps the insertion order of the JSON object it came from
///
/// Chart series derived from distributions are displayed in backend order,
/// which a `HashMap` would lose.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Treat an explicit `null` like a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageIn {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Body of `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictRequest {
    pub messages: Vec<MessageIn>,
}

impl PredictRequest {
    /// Single message sent by the local user
    pub fn single(text: &str) -> Self {
        PredictRequest {
            messages: vec![MessageIn {
                text: text.to_string(),
                sender: Some("self".to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskOut {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummaryOut {
    #[serde(default, deserialize_with = "nullable")]
    pub agg_label_scores: OrderedMap<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub risk: RiskOut,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerMessageOut {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: OrderedMap<f64>,
}

/// Response of `POST /predict`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: SummaryOut,
    #[serde(default, deserialize_with = "nullable")]
    pub per_message: Vec<PerMessageOut>,
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastStep {
    pub step: u32,
    pub score: f64,
    #[serde(default)]
    pub risk_level: Option<String>,
}

/// Response of `GET /forecast?days=N`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ForecastResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub forecast: Vec<ForecastStep>,
    #[serde(default, deserialize_with = "nullable")]
    pub daily_risk_pct: Vec<i64>,
    /// Set by the backend when it fell back to a default forecast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelinePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "low".to_string()
}

/// Response of `GET /api/stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsSnapshot {
    #[serde(default, deserialize_with = "nullable")]
    pub total_predictions: u64,
    /// Already a percentage (0-100)
    #[serde(default, deserialize_with = "nullable")]
    pub average_risk_score: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub risk_level_distribution: OrderedMap<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub label_distribution: OrderedMap<f64>,
    /// Most recent last
    #[serde(default, deserialize_with = "nullable")]
    pub risk_score_timeline: Vec<TimelinePoint>,
    #[serde(default, deserialize_with = "nullable")]
    pub daily_risk_averages: OrderedMap<f64>,
}

// ---------------------------------------------------------------------------
// Privacy
// ---------------------------------------------------------------------------

/// Body of `POST /privacy/check`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivacyRequest {
    pub text: String,
}

/// Response of `POST /privacy/check`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivacyFinding {
    #[serde(default)]
    pub flagged: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl PrivacyFinding {
    /// Human description of what was detected
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or("sensitive information")
    }
}
