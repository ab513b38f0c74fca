//! Solution domain types
//!
//! Static repair guidance and the recommendation entries built from it.

use serde::{Deserialize, Serialize};

use super::maintenance::Category;

/// Reference repair procedure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub id: i64,
    pub category: Category,
    pub problem_description: String,
    pub steps: Vec<String>,
    pub estimated_cost: Option<f64>,
    pub estimated_time: Option<String>,
    pub difficulty: Option<String>,
}

/// Which source a recommendation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    SolutionsDb,
    KnowledgeBase,
    WebSearch,
}

/// One entry in a recommendation list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub snippet: String,
    pub source: RecommendationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Longest snippet shown before truncation
pub const SNIPPET_CHARS: usize = 200;

/// Truncate on a char boundary, appending "..." when shortened
pub fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > SNIPPET_CHARS {
        let head: String = trimmed.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", head)
    } else {
        trimmed.to_string()
    }
}

impl From<SolutionRecord> for Recommendation {
    fn from(record: SolutionRecord) -> Self {
        let numbered = record
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            title: record.problem_description,
            snippet: snippet(&numbered),
            source: RecommendationSource::SolutionsDb,
            cost: record.estimated_cost,
            time: record.estimated_time,
            difficulty: record.difficulty,
            url: None,
        }
    }
}

/// Query params for listing solutions
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SolutionQuery {
    #[serde(default)]
    pub category: Option<Category>,
}
