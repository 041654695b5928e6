//! Severity and relevance heuristics. All pure functions.

use riskwatch_common::Severity;
use serde_json::Value;

pub const NEGATIVE_WORDS: &[&str] = &[
    "crisis",
    "disaster",
    "emergency",
    "critical",
    "severe",
    "failure",
    "collapse",
    "shutdown",
];

pub const URGENT_WORDS: &[&str] = &["breaking", "urgent", "alert", "warning", "immediate"];

pub const HIGH_VALUE_TERMS: &[&str] = &[
    "supply chain",
    "port",
    "factory",
    "shipping",
    "logistics",
    "manufacturing",
];

/// Maximum relevance score.
pub const MAX_RELEVANCE: u32 = 10;

/// Map the NWS severity vocabulary onto the standard scale.
pub fn map_noaa_severity(value: &str) -> Severity {
    match value.trim().to_ascii_lowercase().as_str() {
        "extreme" => Severity::Critical,
        "severe" => Severity::High,
        "moderate" => Severity::Medium,
        "minor" => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Step function over a signed tone score; more negative is worse.
pub fn tone_severity(tone: f64) -> Severity {
    if tone < -5.0 {
        Severity::Critical
    } else if tone < -2.0 {
        Severity::High
    } else if tone < 0.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Read an article's `tone`, which may be a number or numeric text.
/// Missing or unparseable tones count as neutral.
pub fn parse_tone(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Keyword sentiment for short social text.
pub fn text_sentiment(text: &str) -> Severity {
    let lower = text.to_lowercase();
    let negative = count_matches(&lower, NEGATIVE_WORDS);
    let urgent = count_matches(&lower, URGENT_WORDS);

    if negative >= 2 || urgent >= 2 {
        Severity::Critical
    } else if negative >= 1 && urgent >= 1 {
        Severity::High
    } else if negative >= 1 || urgent >= 1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Relevance of free text to the given keywords, 0..=10.
/// Two points per matched keyword (at most 8) plus 2 if any high-value term appears.
pub fn relevance_score(text: &str, keywords: &[&str]) -> u32 {
    let lower = text.to_lowercase();
    let matches = keywords
        .iter()
        .filter(|k| lower.contains(&k.to_lowercase()))
        .count() as u32;

    let mut score = (matches * 2).min(8);
    if HIGH_VALUE_TERMS.iter().any(|t| lower.contains(t)) {
        score += 2;
    }
    score.min(MAX_RELEVANCE)
}

fn count_matches(lower: &str, words: &[&str]) -> usize {
    words.iter().filter(|w| lower.contains(*w)).count()
}
