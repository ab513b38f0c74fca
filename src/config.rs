use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Remote language model (disabled when no key is configured)
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_seconds: u64,

    // Knowledge base
    pub knowledge_dir: PathBuf,
    /// Directory with `model.onnx` and `tokenizer.json`; hashing fallback when unset
    pub embedding_model_dir: Option<PathBuf>,
    pub recommendation_top_k: usize,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        server_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("SERVER_ADDR is not a valid socket address: {server_addr}"))?;

        // Database
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://automaintain.db?mode=rwc".to_string());
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Remote language model
        let llm_api_key = env::var("LLM_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let llm_base_url =
            env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let llm_timeout_seconds = env::var("LLM_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10); // keep interactive submissions responsive

        // Knowledge base
        let knowledge_dir = env::var("KNOWLEDGE_DIR")
            .unwrap_or_else(|_| "./knowledge_db".to_string())
            .into();
        let embedding_model_dir = env::var("EMBEDDING_MODEL_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let recommendation_top_k = env::var("RECOMMENDATION_TOP_K")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|k: &usize| *k > 0)
            .unwrap_or(3);
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20 * 1024 * 1024); // 20 MiB

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            llm_api_key,
            llm_base_url,
            llm_model,
            llm_timeout_seconds,
            knowledge_dir,
            embedding_model_dir,
            recommendation_top_k,
            max_upload_bytes,
        })
    }

    /// Settings suitable for in-process tests: in-memory database, no remote model.
    #[cfg(test)]
    pub fn for_tests(knowledge_dir: PathBuf) -> Self {
        Settings {
            env: Environment::Dev,
            server_addr: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            llm_api_key: None,
            llm_base_url: "http://127.0.0.1:9".to_string(),
            llm_model: "test-model".to_string(),
            llm_timeout_seconds: 1,
            knowledge_dir,
            embedding_model_dir: None,
            recommendation_top_k: 3,
            max_upload_bytes: 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_defaults_to_dev() {
        assert_eq!(Environment::from_str("production"), Environment::Prod);
        assert_eq!(Environment::from_str("PROD"), Environment::Prod);
        assert_eq!(Environment::from_str("staging"), Environment::Staging);
        assert_eq!(Environment::from_str("anything"), Environment::Dev);
    }
}
