use std::{
    collections::HashSet,
    fs,
    path::Path,
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::available_parallelism,
};

use anyhow::anyhow;
use common::{error::AppError, utils::config::AppConfig};
use fastembed::{RerankInitOptions, TextRerank};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::scoring::{clamp_unit, sigmoid};

static NEXT_ENGINE: AtomicUsize = AtomicUsize::new(0);

fn pick_engine_index(pool_len: usize) -> usize {
    let n = NEXT_ENGINE.fetch_add(1, Ordering::Relaxed);
    n % pool_len
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankBackend {
    FastEmbed,
    Lexical,
}

impl FromStr for RerankBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastembed" | "fast-embed" | "fast" => Ok(Self::FastEmbed),
            "lexical" => Ok(Self::Lexical),
            other => Err(anyhow!(
                "unknown reranking backend '{other}'. Expected 'fastembed' or 'lexical'."
            )),
        }
    }
}

/// Relevance score for one candidate, always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

#[derive(Clone)]
enum RerankEngine {
    FastEmbed(Arc<Mutex<TextRerank>>),
    Lexical,
}

pub struct RerankerPool {
    engines: Vec<RerankEngine>,
    semaphore: Arc<Semaphore>,
}

impl RerankerPool {
    /// Cross-encoder pool. `pool_size` bounds concurrent reranks.
    pub fn new_fastembed(
        pool_size: usize,
        init_options: RerankInitOptions,
    ) -> Result<Arc<Self>, AppError> {
        if pool_size == 0 {
            return Err(AppError::Validation(
                "reranking pool size must be greater than zero".to_string(),
            ));
        }

        fs::create_dir_all(&init_options.cache_dir)?;

        let mut engines = Vec::with_capacity(pool_size);
        for x in 0..pool_size {
            debug!("Creating reranking engine: {x}");
            let model = TextRerank::try_new(init_options.clone())
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            engines.push(RerankEngine::FastEmbed(Arc::new(Mutex::new(model))));
        }

        Ok(Arc::new(Self {
            engines,
            semaphore: Arc::new(Semaphore::new(pool_size)),
        }))
    }

    /// Deterministic token-overlap pool; no model download required.
    pub fn new_lexical(pool_size: usize) -> Result<Arc<Self>, AppError> {
        if pool_size == 0 {
            return Err(AppError::Validation(
                "reranking pool size must be greater than zero".to_string(),
            ));
        }

        Ok(Arc::new(Self {
            engines: vec![RerankEngine::Lexical; pool_size],
            semaphore: Arc::new(Semaphore::new(pool_size)),
        }))
    }

    /// Initialize a pool using application configuration.
    pub fn maybe_from_config(config: &AppConfig) -> Result<Option<Arc<Self>>, AppError> {
        if !config.reranking_enabled {
            return Ok(None);
        }

        let pool_size = config.reranking_pool_size.unwrap_or_else(default_pool_size);

        match RerankBackend::from_str(&config.reranking_backend).map_err(AppError::Anyhow)? {
            RerankBackend::Lexical => Self::new_lexical(pool_size).map(Some),
            RerankBackend::FastEmbed => {
                let mut options = RerankInitOptions::default();
                options.cache_dir = Path::new(&config.data_dir)
                    .join("fastembed")
                    .join("reranker");
                Self::new_fastembed(pool_size, options).map(Some)
            }
        }
    }

    /// Check out capacity + pick an engine.
    /// This returns a lease that can perform rerank().
    pub async fn checkout(self: &Arc<Self>) -> RerankerLease {
        // Acquire a permit. This enforces backpressure.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        // Round-robin engine pick so index 0 is not always the busy one.
        let idx = pick_engine_index(self.engines.len());
        let engine = self
            .engines
            .get(idx)
            .cloned()
            .unwrap_or(RerankEngine::Lexical);

        RerankerLease {
            _permit: permit,
            engine,
        }
    }
}

fn default_pool_size() -> usize {
    available_parallelism()
        .map(|value| value.get().min(2))
        .unwrap_or(2)
        .max(1)
}

/// Active lease on a single reranking engine.
pub struct RerankerLease {
    // When this drops the semaphore permit is released.
    _permit: OwnedSemaphorePermit,
    engine: RerankEngine,
}

impl RerankerLease {
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<String>,
    ) -> Result<Vec<RerankScore>, AppError> {
        match &self.engine {
            RerankEngine::Lexical => Ok(documents
                .iter()
                .enumerate()
                .map(|(index, document)| RerankScore {
                    index,
                    score: lexical_overlap(query, document),
                })
                .collect()),
            RerankEngine::FastEmbed(engine) => {
                // Lock this specific engine so we get &mut TextRerank
                let mut guard = engine.lock().await;

                let results = guard
                    .rerank(query.to_owned(), documents, false, None)
                    .map_err(|e| AppError::Upstream(e.to_string()))?;

                Ok(results
                    .into_iter()
                    .map(|result| RerankScore {
                        index: result.index,
                        score: sigmoid(result.score),
                    })
                    .collect())
            }
        }
    }
}

/// Fraction of query tokens found in the candidate, with a short-stem
/// prefix match so "expire" still hits "expiration".
pub fn lexical_overlap(query: &str, document: &str) -> f32 {
    let query_tokens: Vec<String> = tokens(query).collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let document_tokens: HashSet<String> = tokens(document).collect();

    let matched = query_tokens
        .iter()
        .filter(|token| {
            document_tokens.contains(*token)
                || document_tokens
                    .iter()
                    .any(|candidate| stems_match(token, candidate))
        })
        .count();

    clamp_unit(matched as f32 / query_tokens.len() as f32)
}

fn stems_match(a: &str, b: &str) -> bool {
    const STEM_LEN: usize = 5;
    if a.len() < STEM_LEN || b.len() < STEM_LEN {
        return false;
    }
    a.get(..STEM_LEN) == b.get(..STEM_LEN)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}
