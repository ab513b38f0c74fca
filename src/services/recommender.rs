//! Solution recommendations.
//!
//! Three sources are merged in a fixed order: the structured solutions
//! repository, the knowledge base, then web search. Each contributes up to
//! its own cap before the list is truncated to `top_k`.

use std::sync::Arc;

use super::knowledge::VectorStore;
use super::solutions::SolutionRepository;
use super::web_search::WebSearch;
use crate::domain::knowledge::KnowledgeHit;
use crate::domain::solutions::{snippet, Recommendation, RecommendationSource};
use crate::domain::Category;

/// Most knowledge base matches in one list.
pub const KNOWLEDGE_CAP: usize = 2;
/// Most web results in one list.
pub const WEB_CAP: usize = 1;

/// Merge per-source results in priority order and truncate to `top_k`.
pub fn merge_recommendations(
    structured: Vec<Recommendation>,
    knowledge: Vec<Recommendation>,
    web: Vec<Recommendation>,
    top_k: usize,
) -> Vec<Recommendation> {
    let mut merged: Vec<Recommendation> = structured
        .into_iter()
        .take(top_k)
        .chain(knowledge.into_iter().take(KNOWLEDGE_CAP))
        .chain(web.into_iter().take(WEB_CAP))
        .collect();
    merged.truncate(top_k);
    merged
}

impl From<KnowledgeHit> for Recommendation {
    fn from(hit: KnowledgeHit) -> Self {
        let title = hit
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| hit.metadata.filename.clone());
        Self {
            title,
            snippet: snippet(&hit.text),
            source: RecommendationSource::KnowledgeBase,
            cost: None,
            time: None,
            difficulty: None,
            url: None,
        }
    }
}

#[derive(Clone)]
pub struct SolutionRecommender {
    solutions: Arc<dyn SolutionRepository>,
    knowledge: Arc<dyn VectorStore>,
    web: Arc<dyn WebSearch>,
}

impl SolutionRecommender {
    pub fn new(
        solutions: Arc<dyn SolutionRepository>,
        knowledge: Arc<dyn VectorStore>,
        web: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            solutions,
            knowledge,
            web,
        }
    }

    /// Ordered recommendations, at most `top_k`. Never fails; an empty list
    /// means every source was empty or erroring.
    pub async fn recommend(
        &self,
        description: &str,
        category: Category,
        top_k: usize,
    ) -> Vec<Recommendation> {
        if top_k == 0 {
            return Vec::new();
        }

        let structured = self.structured(category, top_k).await;
        let knowledge = self.knowledge(description).await;
        let web = match self.web.search(description, category).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Web search unavailable");
                Vec::new()
            }
        };

        let merged = merge_recommendations(structured, knowledge, web, top_k);
        tracing::debug!(category = %category, count = merged.len(), "Recommendations built");
        merged
    }

    async fn structured(&self, category: Category, top_k: usize) -> Vec<Recommendation> {
        let records = match self.solutions.by_category(category, top_k).await {
            Ok(records) if !records.is_empty() => Ok(records),
            Ok(_) => self.solutions.sample(top_k).await,
            Err(e) => Err(e),
        };

        match records {
            Ok(records) => records.into_iter().map(Recommendation::from).collect(),
            Err(e) => {
                tracing::warn!(error = %e, category = %category, "Solutions repository unavailable");
                Vec::new()
            }
        }
    }

    async fn knowledge(&self, description: &str) -> Vec<Recommendation> {
        let count = match self.knowledge.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge base unavailable");
                return Vec::new();
            }
        };
        if count == 0 {
            return Vec::new();
        }

        match self.knowledge.query(description, KNOWLEDGE_CAP.min(count)).await {
            Ok(hits) => hits.into_iter().map(Recommendation::from).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Knowledge base query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::KnowledgeDocument;
    use crate::services::knowledge::tests::doc;
    use crate::services::knowledge::LocalVectorStore;
    use crate::services::solutions::tests::{record, MemorySolutions};
    use crate::services::web_search::tests::FailingWebSearch;
    use crate::services::web_search::StubWebSearch;
    use crate::domain::knowledge::KnowledgeHit;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn add(&self, _documents: Vec<KnowledgeDocument>) -> anyhow::Result<()> {
            anyhow::bail!("store offline")
        }
        async fn query(&self, _text: &str, _n: usize) -> anyhow::Result<Vec<KnowledgeHit>> {
            anyhow::bail!("store offline")
        }
        async fn count(&self) -> anyhow::Result<usize> {
            anyhow::bail!("store offline")
        }
    }

    fn rec(title: &str, source: RecommendationSource) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            snippet: String::new(),
            source,
            cost: None,
            time: None,
            difficulty: None,
            url: None,
        }
    }

    #[test]
    fn merge_applies_per_source_caps_then_top_k() {
        use RecommendationSource::*;
        let structured = vec![rec("s1", SolutionsDb), rec("s2", SolutionsDb)];
        let knowledge = vec![rec("k1", KnowledgeBase), rec("k2", KnowledgeBase), rec("k3", KnowledgeBase)];
        let web = vec![rec("w1", WebSearch), rec("w2", WebSearch)];

        let titles = |v: Vec<Recommendation>| v.into_iter().map(|r| r.title).collect::<Vec<_>>();

        assert_eq!(
            titles(merge_recommendations(structured.clone(), knowledge.clone(), web.clone(), 10)),
            vec!["s1", "s2", "k1", "k2", "w1"]
        );
        assert_eq!(
            titles(merge_recommendations(structured.clone(), knowledge.clone(), web.clone(), 3)),
            vec!["s1", "s2", "k1"]
        );
        assert_eq!(
            titles(merge_recommendations(Vec::new(), Vec::new(), web, 3)),
            vec!["w1"]
        );
        assert!(merge_recommendations(structured, knowledge, Vec::new(), 0).is_empty());
    }

    #[tokio::test]
    async fn structured_results_fill_the_list_cheapest_first() {
        let recommender = SolutionRecommender::new(
            Arc::new(MemorySolutions {
                records: vec![
                    record(Category::Plumbing, "Clogged drain", 40.0),
                    record(Category::Plumbing, "Leaking faucet", 25.0),
                    record(Category::Plumbing, "Running toilet", 20.0),
                    record(Category::Plumbing, "Low pressure", 60.0),
                ],
                fail: false,
            }),
            Arc::new(LocalVectorStore::in_memory()),
            Arc::new(StubWebSearch::new()),
        );

        let recs = recommender.recommend("sink leaks", Category::Plumbing, 3).await;
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].title, "Running toilet");
        assert_eq!(recs[2].title, "Clogged drain");
        assert!(recs.iter().all(|r| r.source == RecommendationSource::SolutionsDb));
    }

    #[tokio::test]
    async fn empty_category_falls_back_to_sample_then_other_sources() {
        let store = LocalVectorStore::in_memory();
        store
            .add(vec![doc("gate", "Oil the gate hinges twice a year")])
            .await
            .unwrap();

        let recommender = SolutionRecommender::new(
            Arc::new(MemorySolutions {
                records: vec![record(Category::Hvac, "Poor airflow", 30.0)],
                fail: false,
            }),
            Arc::new(store),
            Arc::new(StubWebSearch::new()),
        );

        let recs = recommender.recommend("gate hinges squeak", Category::Other, 5).await;
        let sources: Vec<_> = recs.iter().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![
                RecommendationSource::SolutionsDb,
                RecommendationSource::KnowledgeBase,
                RecommendationSource::WebSearch
            ]
        );
        assert_eq!(recs[0].title, "Poor airflow");
        assert_eq!(recs[1].title, "gate.txt");
    }

    #[tokio::test]
    async fn all_sources_failing_yields_empty_list() {
        let recommender = SolutionRecommender::new(
            Arc::new(MemorySolutions {
                records: Vec::new(),
                fail: true,
            }),
            Arc::new(BrokenStore),
            Arc::new(FailingWebSearch),
        );
        assert!(recommender.recommend("anything", Category::Other, 3).await.is_empty());

        let empty = SolutionRecommender::new(
            Arc::new(MemorySolutions::default()),
            Arc::new(LocalVectorStore::in_memory()),
            Arc::new(FailingWebSearch),
        );
        assert!(empty.recommend("anything", Category::Other, 3).await.is_empty());
    }

    #[tokio::test]
    async fn never_more_than_top_k() {
        let store = LocalVectorStore::in_memory();
        store
            .add(vec![doc("a", "leak fix one"), doc("b", "leak fix two"), doc("c", "leak fix three")])
            .await
            .unwrap();
        let recommender = SolutionRecommender::new(
            Arc::new(MemorySolutions {
                records: vec![record(Category::Plumbing, "Leak", 25.0)],
                fail: false,
            }),
            Arc::new(store),
            Arc::new(StubWebSearch::new()),
        );

        for top_k in 0..6 {
            let recs = recommender.recommend("leak", Category::Plumbing, top_k).await;
            assert!(recs.len() <= top_k, "top_k={top_k} got {}", recs.len());
        }
        // 1 structured + 2 knowledge + 1 web
        assert_eq!(recommender.recommend("leak", Category::Plumbing, 10).await.len(), 4);
    }
}
