//! Risk label naming and selection

use crate::api::OrderedMap;
use crate::risk::to_percent;

/// Minimum probability for a label to be reported
pub const LABEL_THRESHOLD: f64 = 0.10;

/// Maximum number of labels reported per message
pub const TOP_LABELS: usize = 3;

/// Display name for a classifier label; unknown labels keep their raw key
pub fn display_name(label: &str) -> &str {
    match label {
        "self_harm" => "Self-Harm",
        "mental_health_risk" => "Mental Health Risk",
        "cyberbullying" => "Cyberbullying",
        "harassment" => "Harassment",
        "substance_abuse" => "Substance Abuse",
        "adult_content" => "Adult Content",
        "online_predator" => "Online Predator",
        other => other,
    }
}

/// Underscores become spaces and each word is capitalized (`self_harm` → `Self Harm`)
pub fn humanize(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut at_word_start = true;
    for c in label.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Upper-case the first character, leave the rest untouched
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A label that cleared the reporting threshold
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub probability: f64,
}

impl LabelScore {
    /// `"{Display Name}: {percent}%"`
    pub fn render(&self) -> String {
        format!(
            "{}: {}%",
            display_name(&self.label),
            to_percent(self.probability)
        )
    }
}

/// Labels with probability above `threshold`, highest first, at most `top`
///
/// Ties keep the backend's order. Running the selection on its own output
/// returns the same labels.
pub fn select_top_labels<'a, I>(scores: I, threshold: f64, top: usize) -> Vec<LabelScore>
where
    I: IntoIterator<Item = (&'a str, &'a f64)>,
{
    let mut selected: Vec<LabelScore> = scores
        .into_iter()
        .filter(|(_, p)| **p > threshold)
        .map(|(label, p)| LabelScore {
            label: label.to_string(),
            probability: *p,
        })
        .collect();

    // sort_by is stable
    selected.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    selected.truncate(top);
    selected
}

/// Default selection over a backend score map
pub fn top_labels(scores: &OrderedMap<f64>) -> Vec<LabelScore> {
    select_top_labels(scores.iter(), LABEL_THRESHOLD, TOP_LABELS)
}
