use std::sync::Arc;

use chrono::Utc;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::rate_limit_window::{window_start_for, RateLimitWindow},
        types::StoredObject,
    },
    utils::config::AppConfig,
};
use tracing::debug;

/// Fixed-window admission settings. Read per request; a changed ceiling
/// applies from the next admit, a changed width from the next boundary.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests_per_window: i64,
    pub window_seconds: i64,
    pub retention_hours: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: 30,
            window_seconds: 60,
            retention_hours: 24,
        }
    }
}

impl RateLimitConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_requests_per_window: config.rate_limit_max_requests,
            window_seconds: config.rate_limit_window_seconds,
            retention_hours: config.rate_limit_retention_hours,
        }
    }
}

/// Outcome of one admission attempt, derived entirely from the
/// post-increment counter of a single atomic upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub retry_after_seconds: Option<i64>,
}

impl AdmitDecision {
    /// Turn a rejection into the typed error carried across the API
    /// boundary. Acceptance passes through unchanged.
    pub fn require_allowed(self) -> Result<Self, AppError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(AppError::RateLimited {
                retry_after_seconds: self.retry_after_seconds.unwrap_or(1),
            })
        }
    }
}

pub struct RateLimiter {
    db: Arc<SurrealDbClient>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(db: Arc<SurrealDbClient>, config: RateLimitConfig) -> Self {
        Self { db, config }
    }

    /// Admit or reject one request for (tenant, endpoint).
    ///
    /// The counter row is addressed by the composite record id
    /// [tenant, endpoint, window_start], so at most one row per key can
    /// exist, and the increment plus the returned count are a single
    /// statement. Rejection and remaining quota are both computed from
    /// that post-increment count; there is no read-then-write anywhere.
    pub async fn admit(&self, tenant_id: &str, endpoint: &str) -> Result<AdmitDecision, AppError> {
        self.admit_at(tenant_id, endpoint, Utc::now().timestamp())
            .await
    }

    async fn admit_at(
        &self,
        tenant_id: &str,
        endpoint: &str,
        epoch_seconds: i64,
    ) -> Result<AdmitDecision, AppError> {
        if tenant_id.trim().is_empty() {
            return Err(AppError::Validation("tenant id is required".to_string()));
        }
        if endpoint.trim().is_empty() {
            return Err(AppError::Validation("endpoint is required".to_string()));
        }

        let window_seconds = self.config.window_seconds.max(1);
        let window_start = window_start_for(epoch_seconds, window_seconds);

        let mut result = self
            .db
            .client
            .query(
                "UPSERT type::thing($table, [$tenant_id, $endpoint, $window_start]) \
                 SET tenant_id = $tenant_id, endpoint = $endpoint, \
                     window_start = $window_start, request_count += 1, \
                     updated_at = time::now() \
                 RETURN AFTER",
            )
            .bind(("table", RateLimitWindow::table_name()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("endpoint", endpoint.to_string()))
            .bind(("window_start", window_start))
            .await?;

        let window: Option<RateLimitWindow> = result.take(0)?;
        let window = window.ok_or_else(|| {
            AppError::InternalError("rate limit upsert returned no row".to_string())
        })?;

        let ceiling = self.config.max_requests_per_window;
        if window.request_count > ceiling {
            let retry_after = (window_start + window_seconds - epoch_seconds).max(1);
            // Expected outcome under load, not an application failure.
            debug!(
                tenant_id,
                endpoint,
                request_count = window.request_count,
                ceiling,
                retry_after,
                "Rate limit window exhausted"
            );
            return Ok(AdmitDecision {
                allowed: false,
                remaining: 0,
                retry_after_seconds: Some(retry_after),
            });
        }

        Ok(AdmitDecision {
            allowed: true,
            remaining: ceiling - window.request_count,
            retry_after_seconds: None,
        })
    }

    /// Delete windows older than the retention horizon. Current-window
    /// counting never depends on this having run.
    pub async fn purge_stale(&self) -> Result<(), AppError> {
        self.purge_stale_at(Utc::now().timestamp()).await
    }

    async fn purge_stale_at(&self, epoch_seconds: i64) -> Result<(), AppError> {
        let horizon = epoch_seconds - self.config.retention_hours.max(0) * 3600;

        self.db
            .client
            .query(format!(
                "DELETE {} WHERE window_start < $horizon",
                RateLimitWindow::table_name()
            ))
            .bind(("horizon", horizon))
            .await?;

        debug!(horizon, "Purged stale rate limit windows");

        Ok(())
    }
}
