//! Interaction audit trail types
//!
//! Every AI exchange shown to a user is recorded with the path that answered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::maintenance::Category;

/// Which sub-path produced an answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSource {
    RemoteModel,
    KnowledgeBase,
    Faq,
    Fallback,
}

impl InteractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteModel => "remote_model",
            Self::KnowledgeBase => "knowledge_base",
            Self::Faq => "faq",
            Self::Fallback => "fallback",
        }
    }
}

impl From<String> for InteractionSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "remote_model" => Self::RemoteModel,
            "knowledge_base" => Self::KnowledgeBase,
            "faq" => Self::Faq,
            _ => Self::Fallback,
        }
    }
}

/// Audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionLog {
    pub id: i64,
    pub tenant_id: Option<i64>,
    pub question: String,
    pub response: String,
    pub source: InteractionSource,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for the tenant assistant
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub tenant_id: Option<i64>,
    pub question: String,
}

/// Response DTO for the tenant assistant
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub source: InteractionSource,
}

/// Request DTO for the stand-alone classification endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionRequest {
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Query params for reading back the audit trail
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InteractionQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}
