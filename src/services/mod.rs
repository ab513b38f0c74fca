//! Service layer: the classification pipeline, knowledge base and the
//! request workflow built on top of them.

pub mod ai_client;
pub mod assistant;
pub mod classifier;
pub mod dashboard;
pub mod embeddings;
pub mod estimator;
pub mod ingestion;
pub mod interactions;
pub mod knowledge;
pub mod lance_store;
pub mod provider;
pub mod recommender;
pub mod requests;
pub mod solutions;
pub mod vendors;
pub mod web_search;

pub use ai_client::AiClient;
pub use assistant::Assistant;
pub use classifier::Classifier;
pub use dashboard::DashboardService;
pub use estimator::CostEstimator;
pub use ingestion::KnowledgeIngestor;
pub use interactions::InteractionLogger;
pub use knowledge::VectorStore;
pub use provider::{ClassificationProvider, RemoteModelProvider};
pub use recommender::SolutionRecommender;
pub use requests::RequestService;
pub use solutions::SqliteSolutionRepository;
pub use vendors::VendorService;
pub use web_search::StubWebSearch;
