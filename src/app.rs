use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Settings;
use crate::middleware::request_id_layer;
use crate::routes;
use crate::services::{
    AiClient, Assistant, ClassificationProvider, Classifier, CostEstimator, DashboardService,
    InteractionLogger, KnowledgeIngestor, RemoteModelProvider, RequestService,
    SolutionRecommender, SqliteSolutionRepository, StubWebSearch, VectorStore, VendorService,
};

/// Shared application state
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Settings,
    /// Present only when a model API key is configured
    pub ai_client: Option<AiClient>,
    pub classifier: Classifier,
    pub estimator: CostEstimator,
    pub recommender: SolutionRecommender,
    pub knowledge: Arc<dyn VectorStore>,
    pub ingestor: KnowledgeIngestor,
    pub interactions: InteractionLogger,
    pub assistant: Assistant,
    pub solutions: SqliteSolutionRepository,
    pub requests: RequestService,
    pub vendors: VendorService,
    pub dashboard: DashboardService,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        settings: Settings,
        ai_client: Option<AiClient>,
        knowledge: Arc<dyn VectorStore>,
    ) -> Arc<Self> {
        let remote: Option<Arc<dyn ClassificationProvider>> = ai_client
            .clone()
            .map(|client| Arc::new(RemoteModelProvider::new(client)) as Arc<dyn ClassificationProvider>);

        let solutions = SqliteSolutionRepository::new(db.clone());
        let solutions_repo = Arc::new(solutions.clone());

        let classifier = Classifier::new(remote.clone());
        let estimator = CostEstimator::new(solutions_repo.clone(), remote.clone());
        let recommender = SolutionRecommender::new(
            solutions_repo,
            knowledge.clone(),
            Arc::new(StubWebSearch::new()),
        );
        let interactions = InteractionLogger::new(db.clone());
        let assistant = Assistant::new(remote, knowledge.clone(), interactions.clone());
        let requests = RequestService::new(
            db.clone(),
            classifier.clone(),
            estimator.clone(),
            recommender.clone(),
            settings.recommendation_top_k,
        );

        Arc::new(Self {
            ingestor: KnowledgeIngestor::new(knowledge.clone()),
            vendors: VendorService::new(db.clone()),
            dashboard: DashboardService::new(db.clone()),
            db,
            settings,
            ai_client,
            classifier,
            estimator,
            recommender,
            knowledge,
            interactions,
            assistant,
            solutions,
            requests,
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(&state.settings);

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    // Request ID layers
    let (set_request_id, propagate_request_id) = request_id_layer();

    let body_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes);

    // Build router (routes at root level, no /api prefix)
    Router::new()
        .merge(routes::api_router())
        // Middleware stack (applied bottom-up)
        .layer(body_limit)
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Longer preflight cache in development
    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ]))
        .max_age(max_age)
}
