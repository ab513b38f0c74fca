//! Remote classification provider.
//!
//! Wraps the text-generation client behind the [`ClassificationProvider`]
//! capability: a fixed prompt goes out, a constrained-format answer comes
//! back and is parsed. Anything unexpected is a [`ProviderUnavailable`].

use async_trait::async_trait;
use regex::Regex;

use super::ai_client::{AiClient, ProviderUnavailable};
use crate::domain::{Category, Classification, Priority};

/// Lowest and highest cost a remote estimate may report.
pub const MIN_COST: f64 = 25.0;
pub const MAX_COST: f64 = 1000.0;

/// A source of classifications and cost estimates that may be unavailable.
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    async fn classify(&self, description: &str) -> Result<Classification, ProviderUnavailable>;

    async fn estimate_cost(
        &self,
        description: &str,
        category: Category,
    ) -> Result<f64, ProviderUnavailable>;

    /// Free-form answer for the tenant assistant.
    async fn answer(&self, question: &str) -> Result<String, ProviderUnavailable>;
}

/// Provider backed by the hosted language model.
pub struct RemoteModelProvider {
    client: AiClient,
    classification_pattern: Regex,
    number_pattern: Regex,
}

impl RemoteModelProvider {
    pub fn new(client: AiClient) -> Self {
        Self {
            client,
            classification_pattern: Regex::new(
                r"(?i)category\s*:\s*([a-z]+)\s*[,;\n]?\s*priority\s*:\s*([a-z]+)",
            )
            .expect("static classification pattern"),
            number_pattern: Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("static number pattern"),
        }
    }

    fn classification_prompt(description: &str) -> String {
        let categories = Category::ALL
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Classify this property maintenance issue into exactly one category from: {categories}.\n\
             Assign a priority of High, Medium, or Low.\n\
             Respond only in the format: Category: X, Priority: Y\n\n\
             Issue: {description}"
        )
    }

    fn estimate_prompt(description: &str, category: Category) -> String {
        format!(
            "Estimate the repair cost in US dollars for this {} maintenance issue.\n\
             Respond with a single number only, no currency symbol or text.\n\n\
             Issue: {description}",
            category.label()
        )
    }

    fn assistant_prompt(question: &str) -> String {
        format!(
            "You are a helpful property maintenance assistant for apartment tenants. \
             Answer briefly and practically, and recommend contacting maintenance staff \
             for anything involving safety, gas, or electrical hazards.\n\n\
             Question: {question}"
        )
    }

    /// Parse `Category: X, Priority: Y`.
    pub(crate) fn parse_classification(
        &self,
        text: &str,
    ) -> Result<Classification, ProviderUnavailable> {
        let caps = self
            .classification_pattern
            .captures(text)
            .ok_or_else(|| ProviderUnavailable::Malformed(format!("no classification in {text:?}")))?;

        let category = Category::parse(&caps[1])
            .ok_or_else(|| ProviderUnavailable::Malformed(format!("unknown category {:?}", &caps[1])))?;
        let priority = Priority::parse(&caps[2])
            .ok_or_else(|| ProviderUnavailable::Malformed(format!("unknown priority {:?}", &caps[2])))?;

        Ok(Classification::new(category, priority))
    }

    /// Parse the first number in the answer and clamp it to the allowed range.
    pub(crate) fn parse_cost(&self, text: &str) -> Result<f64, ProviderUnavailable> {
        let raw = self
            .number_pattern
            .find(text)
            .ok_or_else(|| ProviderUnavailable::Malformed(format!("no number in {text:?}")))?;

        let value: f64 = raw
            .as_str()
            .replace(',', "")
            .parse()
            .map_err(|_| ProviderUnavailable::Malformed(format!("bad number {:?}", raw.as_str())))?;

        if !value.is_finite() {
            return Err(ProviderUnavailable::Malformed("non-finite cost".to_string()));
        }

        Ok(value.clamp(MIN_COST, MAX_COST))
    }
}

#[async_trait]
impl ClassificationProvider for RemoteModelProvider {
    async fn classify(&self, description: &str) -> Result<Classification, ProviderUnavailable> {
        let text = self
            .client
            .complete(&Self::classification_prompt(description), 20)
            .await?;
        self.parse_classification(&text)
    }

    async fn estimate_cost(
        &self,
        description: &str,
        category: Category,
    ) -> Result<f64, ProviderUnavailable> {
        let text = self
            .client
            .complete(&Self::estimate_prompt(description, category), 10)
            .await?;
        self.parse_cost(&text)
    }

    async fn answer(&self, question: &str) -> Result<String, ProviderUnavailable> {
        self.client
            .complete(&Self::assistant_prompt(question), 300)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RemoteModelProvider {
        let client = AiClient::new("http://127.0.0.1:9/v1", "key", "model", 1).unwrap();
        RemoteModelProvider::new(client)
    }

    #[test]
    fn parses_constrained_classification_format() {
        let p = provider();
        let c = p.parse_classification("Category: HVAC, Priority: Medium").unwrap();
        assert_eq!(c, Classification::new(Category::Hvac, Priority::Medium));

        let c = p
            .parse_classification("Sure!\ncategory: plumbing\npriority: HIGH")
            .unwrap();
        assert_eq!(c, Classification::new(Category::Plumbing, Priority::High));
    }

    #[test]
    fn rejects_unknown_labels_and_free_text() {
        let p = provider();
        assert!(matches!(
            p.parse_classification("Category: Roofing, Priority: High"),
            Err(ProviderUnavailable::Malformed(_))
        ));
        assert!(matches!(
            p.parse_classification("It sounds like a plumbing problem."),
            Err(ProviderUnavailable::Malformed(_))
        ));
    }

    #[test]
    fn cost_is_parsed_and_clamped() {
        let p = provider();
        assert_eq!(p.parse_cost("180").unwrap(), 180.0);
        assert_eq!(p.parse_cost("About $1,250.50").unwrap(), MAX_COST);
        assert_eq!(p.parse_cost("5").unwrap(), MIN_COST);
        assert_eq!(p.parse_cost("$212.75 give or take").unwrap(), 212.75);
        assert!(p.parse_cost("hard to say").is_err());
    }

    #[test]
    fn classification_prompt_lists_every_category() {
        let prompt = RemoteModelProvider::classification_prompt("sink leaks");
        for category in Category::ALL {
            assert!(prompt.contains(category.label()));
        }
        assert!(prompt.contains("Category: X, Priority: Y"));
    }
}
