use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: String,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,

    #[serde(default = "default_generation_backend")]
    pub generation_backend: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,

    #[serde(default = "default_true")]
    pub reranking_enabled: bool,
    #[serde(default = "default_reranking_backend")]
    pub reranking_backend: String,
    #[serde(default)]
    pub reranking_pool_size: Option<usize>,

    #[serde(default = "default_top_k_search")]
    pub retrieval_top_k_search: usize,
    #[serde(default = "default_top_k_final")]
    pub retrieval_top_k_final: usize,

    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: i64,
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: i64,
    #[serde(default = "default_rate_limit_retention_hours")]
    pub rate_limit_retention_hours: i64,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_backend() -> String {
    "fastembed".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1024
}

fn default_generation_backend() -> String {
    "openai".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reranking_backend() -> String {
    "fastembed".to_string()
}

fn default_top_k_search() -> usize {
    10
}

fn default_top_k_final() -> usize {
    3
}

fn default_rate_limit_max_requests() -> i64 {
    30
}

fn default_rate_limit_window_seconds() -> i64 {
    60
}

fn default_rate_limit_retention_hours() -> i64 {
    24
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
