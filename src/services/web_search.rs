//! Web search source for recommendations.
//!
//! No live search backend is wired in; [`StubWebSearch`] hands back a single
//! "search online" entry pointing at a prepared query URL.

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::domain::solutions::{snippet, Recommendation, RecommendationSource};
use crate::domain::Category;

const SEARCH_ENDPOINT: &str = "https://duckduckgo.com/";

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, description: &str, category: Category) -> Result<Vec<Recommendation>>;
}

#[derive(Debug, Clone, Default)]
pub struct StubWebSearch;

impl StubWebSearch {
    pub fn new() -> Self {
        Self
    }

    fn search_url(description: &str, category: Category) -> Result<Url> {
        let query = format!("{} repair {}", category.label(), description.trim());
        let url = Url::parse_with_params(SEARCH_ENDPOINT, &[("q", query.as_str())])?;
        Ok(url)
    }
}

#[async_trait]
impl WebSearch for StubWebSearch {
    async fn search(&self, description: &str, category: Category) -> Result<Vec<Recommendation>> {
        let url = Self::search_url(description, category)?;
        Ok(vec![Recommendation {
            title: format!("Search online for {} repair guides", category.label()),
            snippet: snippet(&format!(
                "Look up step-by-step guides for \"{}\". Stop and contact maintenance if anything involves gas, water damage or exposed wiring.",
                description.trim()
            )),
            source: RecommendationSource::WebSearch,
            cost: None,
            time: None,
            difficulty: None,
            url: Some(url.to_string()),
        }])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Web source that always errors.
    pub(crate) struct FailingWebSearch;

    #[async_trait]
    impl WebSearch for FailingWebSearch {
        async fn search(&self, _description: &str, _category: Category) -> Result<Vec<Recommendation>> {
            anyhow::bail!("search backend unreachable")
        }
    }

    #[tokio::test]
    async fn stub_returns_one_entry_with_encoded_query() {
        let results = StubWebSearch::new()
            .search("Sink leaks & drips", Category::Plumbing)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);

        let rec = &results[0];
        assert_eq!(rec.source, RecommendationSource::WebSearch);
        let url = Url::parse(rec.url.as_deref().unwrap()).unwrap();
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "q");
        assert_eq!(value, "Plumbing repair Sink leaks & drips");
    }
}
