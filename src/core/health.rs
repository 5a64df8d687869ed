//! Entry points used by components and by whatever transport serves reports.

use serde::Serialize;
use tracing::warn;

use super::{
    aggregator::{AggregatedResult, Aggregator, Budgets},
    error::{HealthError, HealthResult},
    providers::{registry::ProviderRegistry, traits::InfoProvider, types::InfoPayload},
};
use crate::config::health::HealthConfig;

/// Process-wide handle tying the registry to the aggregator.
///
/// Create one at startup and share it (it is cheap to clone). Components
/// call [`register_info`](Self::register_info) during their own setup; the
/// transport calls [`collect_system_health`](Self::collect_system_health)
/// or [`respond`](Self::respond) on demand.
#[derive(Clone)]
pub struct SystemHealth {
    aggregator: Aggregator,
}

impl SystemHealth {
    pub fn new(registry: ProviderRegistry, config: &HealthConfig) -> Self {
        Self {
            aggregator: Aggregator::new(registry, Budgets::from(config)),
        }
    }

    /// Wraps an aggregator built elsewhere, e.g. with a custom platform provider.
    pub fn from_aggregator(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.aggregator.registry()
    }

    /// Registers a component's info provider.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration` if `name` is taken, `ReservedName` for the
    /// platform key.
    pub fn register_info<T: InfoProvider>(
        &self,
        name: impl Into<String>,
        provider: T,
    ) -> HealthResult<()> {
        self.registry().register(name, provider)
    }

    /// Runs every provider and returns the combined report.
    pub async fn collect_system_health(&self) -> HealthResult<AggregatedResult> {
        self.aggregator.aggregate().await
    }

    /// Returns one component's entry: its payload or `{"error": ...}`.
    ///
    /// # Errors
    ///
    /// `NotFound` for names that were never registered (other than the
    /// platform key); `PlatformInfo` if the platform entry is asked for and fails.
    pub async fn get_info(&self, name: &str) -> HealthResult<InfoPayload> {
        self.aggregator.component_info(name).await
    }

    /// Runs an aggregation and wraps it in a [`HealthResponse`].
    pub async fn respond(&self) -> HealthResponse {
        match self.collect_system_health().await {
            Ok(result) => HealthResponse::success(result),
            Err(err) => {
                warn!("Health report failed: {}", err);
                HealthResponse::failure(&err)
            }
        }
    }
}

/// Error body of a failed [`HealthResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Request/response envelope for transports: `{"success": true, "result": {...}}`
/// or `{"success": false, "error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregatedResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl HealthResponse {
    pub fn success(result: AggregatedResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(err: &HealthError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}
