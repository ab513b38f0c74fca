//! Issue classification.
//!
//! [`KeywordClassifier`] is the deterministic engine: it scores categories
//! by keyword occurrences and derives priority from urgency signals.
//! [`Classifier`] puts an optional remote provider in front of it and falls
//! back silently whenever the remote side is unavailable.

use std::sync::Arc;

use super::provider::ClassificationProvider;
use crate::domain::maintenance::ProviderKind;
use crate::domain::{Category, Classification, Priority};

/// Keywords per scored category. Entries with a space are phrases.
const CATEGORY_KEYWORDS: [(Category, &[&str]); 5] = [
    (
        Category::Plumbing,
        &[
            "leak", "leaks", "leaking", "leaky", "water", "pipe", "pipes", "drain", "drains",
            "clog", "clogged", "toilet", "sink", "faucet", "tap", "shower", "bathtub", "plumbing",
            "flush", "drip", "dripping", "sewage", "water pressure",
        ],
    ),
    (
        Category::Electrical,
        &[
            "electric", "electrical", "electricity", "outlet", "outlets", "power", "breaker",
            "wiring", "wire", "wires", "switch", "light", "lights", "socket", "fuse", "spark",
            "sparking", "sparks", "bulb", "flickering", "circuit",
        ],
    ),
    (
        Category::Hvac,
        &[
            "ac", "aircon", "hvac", "heating", "heater", "heat", "furnace", "thermostat",
            "ventilation", "vent", "vents", "cooling", "airflow", "duct", "ducts",
            "air conditioning", "air conditioner", "warm air", "cold air", "air filter",
        ],
    ),
    (
        Category::Structural,
        &[
            "crack", "cracks", "cracked", "wall", "walls", "ceiling", "floor", "roof", "foundation",
            "window", "windows", "door", "doors", "stairs", "hinge", "hinges", "drywall", "tile",
        ],
    ),
    (
        Category::Appliance,
        &[
            "appliance", "refrigerator", "fridge", "freezer", "dishwasher", "washer", "dryer",
            "oven", "stove", "microwave", "disposal", "washing machine", "garbage disposal",
        ],
    ),
];

/// Any of these forces High priority.
const URGENT_KEYWORDS: &[&str] = &[
    "urgent", "emergency", "broken", "flood", "flooding", "fire", "smoke", "sparking", "burst",
    "dangerous", "hazard", "no power", "no heat", "no water", "gas leak", "smell gas",
];

/// Any of these (without an urgent signal) gives Medium priority.
const MEDIUM_KEYWORDS: &[&str] = &[
    "intermittent", "intermittently", "sometimes", "slow", "slowly", "occasionally",
    "occasional", "noisy", "noise", "loud", "weak", "not working",
];

/// Deterministic keyword-scoring classifier.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, description: &str) -> Classification {
        let tokens = tokenize(description);
        Classification::new(Self::category_for(&tokens), Self::priority_for(&tokens))
    }

    fn category_for(tokens: &[String]) -> Category {
        let mut best = (Category::Other, 0usize);
        for (category, keywords) in CATEGORY_KEYWORDS.iter() {
            let score: usize = keywords.iter().map(|k| count_occurrences(tokens, k)).sum();
            // Strictly greater keeps the earlier category on ties
            if score > best.1 {
                best = (*category, score);
            }
        }
        best.0
    }

    fn priority_for(tokens: &[String]) -> Priority {
        let any = |keywords: &[&str]| keywords.iter().any(|k| count_occurrences(tokens, k) > 0);
        if any(URGENT_KEYWORDS) {
            Priority::High
        } else if any(MEDIUM_KEYWORDS) {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// Lower-cased alphanumeric words.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whole-word occurrences of a keyword or phrase.
fn count_occurrences(tokens: &[String], keyword: &str) -> usize {
    let parts: Vec<&str> = keyword.split_whitespace().collect();
    if parts.is_empty() || parts.len() > tokens.len() {
        return 0;
    }
    tokens
        .windows(parts.len())
        .filter(|window| window.iter().zip(&parts).all(|(t, p)| t == p))
        .count()
}

/// Classification pipeline: remote provider first, keyword engine on any failure.
#[derive(Clone)]
pub struct Classifier {
    remote: Option<Arc<dyn ClassificationProvider>>,
    fallback: KeywordClassifier,
}

impl Classifier {
    pub fn new(remote: Option<Arc<dyn ClassificationProvider>>) -> Self {
        Self {
            remote,
            fallback: KeywordClassifier::new(),
        }
    }

    /// Deterministic-only pipeline.
    pub fn deterministic() -> Self {
        Self::new(None)
    }

    pub fn remote(&self) -> Option<&Arc<dyn ClassificationProvider>> {
        self.remote.as_ref()
    }

    /// Never fails: remote errors are logged and the keyword engine answers.
    pub async fn classify(&self, description: &str) -> (Classification, ProviderKind) {
        if let Some(remote) = &self.remote {
            match remote.classify(description).await {
                Ok(classification) => {
                    tracing::debug!(
                        category = %classification.category,
                        priority = %classification.priority,
                        "Remote model classified issue"
                    );
                    return (classification, ProviderKind::Remote);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote classification unavailable, using keyword classifier");
                }
            }
        }

        (self.fallback.classify(description), ProviderKind::Deterministic)
    }
}
