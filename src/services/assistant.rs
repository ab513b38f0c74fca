//! Tenant question answering.
//!
//! Answers come from the first path that has one: remote model, a close
//! knowledge base match, a canned FAQ entry, then a generic reply. Every
//! answer is written to the interaction log with the path that produced it.

use std::sync::Arc;

use super::interactions::InteractionLogger;
use super::knowledge::VectorStore;
use super::provider::ClassificationProvider;
use crate::domain::interactions::{AskResponse, InteractionSource};
use crate::domain::solutions::snippet;

/// Minimum similarity for a knowledge base document to count as an answer.
const KNOWLEDGE_MIN_SCORE: f32 = 0.35;

const FALLBACK_ANSWER: &str = "Thanks for your question. Our maintenance team will follow up \
     shortly. If this is an emergency such as flooding, fire, a gas smell or sparking wires, \
     call the emergency maintenance line right away.";

/// Canned answers keyed by the words that must all appear in the question.
const FAQ: &[(&[&str], &str)] = &[
    (
        &["breaker"],
        "Open your electrical panel and find the switch that sits between ON and OFF. Push it \
         fully to OFF, then back to ON. If it trips again immediately, unplug devices on that \
         circuit and submit a maintenance request.",
    ),
    (
        &["sink", "clog"],
        "Remove and clean the drain stopper, then try a plunger with a few inches of water in \
         the basin. Avoid chemical cleaners on repeated clogs and submit a request if the water \
         still will not drain.",
    ),
    (
        &["air", "filter"],
        "Turn the system off, slide out the old filter from the return vent or furnace, and \
         insert a new one of the same size with the airflow arrow pointing toward the unit. \
         Filters should be changed every one to three months.",
    ),
    (
        &["toilet", "running"],
        "Lift the tank lid and check the flapper at the bottom. Adjust the chain so it has a \
         little slack, and lower the float if water is spilling into the overflow tube. A warped \
         flapper needs replacing, which maintenance can do for you.",
    ),
    (
        &["emergency"],
        "For flooding, fire, gas smells, sparking or no heat in winter, call the emergency \
         maintenance line immediately and submit a request marked Emergency. Leave the unit if \
         you smell gas.",
    ),
    (
        &["when", "request"],
        "Emergency requests are handled the same day. Urgent requests are usually scheduled \
         within 24 to 48 hours and normal requests within 3 to 5 business days. You will be \
         contacted when a visit is booked.",
    ),
];

/// Canned FAQ answer for a question, if one applies.
pub fn faq_answer(question: &str) -> Option<&'static str> {
    let lowered = question.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    // Stem match so "clogged" and "clog" both hit
    FAQ.iter()
        .find(|(keys, _)| keys.iter().all(|k| words.iter().any(|w| w.starts_with(k))))
        .map(|(_, answer)| *answer)
}

#[derive(Clone)]
pub struct Assistant {
    remote: Option<Arc<dyn ClassificationProvider>>,
    knowledge: Arc<dyn VectorStore>,
    logger: InteractionLogger,
}

impl Assistant {
    pub fn new(
        remote: Option<Arc<dyn ClassificationProvider>>,
        knowledge: Arc<dyn VectorStore>,
        logger: InteractionLogger,
    ) -> Self {
        Self {
            remote,
            knowledge,
            logger,
        }
    }

    /// Answer a tenant question. Never fails.
    pub async fn answer(&self, tenant_id: Option<i64>, question: &str) -> AskResponse {
        let (answer, source) = self.resolve(question).await;
        self.logger.log(tenant_id, question, &answer, source).await;
        AskResponse { answer, source }
    }

    async fn resolve(&self, question: &str) -> (String, InteractionSource) {
        if let Some(remote) = &self.remote {
            match remote.answer(question).await {
                Ok(answer) if !answer.trim().is_empty() => {
                    return (answer.trim().to_string(), InteractionSource::RemoteModel)
                }
                Ok(_) => tracing::warn!("Remote model returned an empty answer"),
                Err(e) => tracing::warn!(error = %e, "Remote assistant unavailable"),
            }
        }

        match self.knowledge.query(question, 1).await {
            Ok(hits) => {
                if let Some(hit) = hits.into_iter().find(|h| h.score >= KNOWLEDGE_MIN_SCORE) {
                    return (snippet(&hit.text), InteractionSource::KnowledgeBase);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Knowledge base lookup failed"),
        }

        if let Some(answer) = faq_answer(question) {
            return (answer.to_string(), InteractionSource::Faq);
        }

        (FALLBACK_ANSWER.to_string(), InteractionSource::Fallback)
    }
}
