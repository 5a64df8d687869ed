//! Single-provider invocation with a time budget.
//!
//! Every call runs in its own tokio task so that a panicking provider is
//! contained and a stuck one can be left behind once its budget is spent.

use std::{sync::Arc, time::Duration};

use erased_serde::Serialize;
use serde_json::{json, Value};
use tokio::{task::JoinError, time::timeout};
use tracing::{debug, warn};

use super::providers::{
    error::ProviderError,
    registry::DynInfoProvider,
    types::{HealthContext, InfoPayload, ProviderResult},
};

/// Budget applied to a provider when nothing overrides it.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(5);

/// Error text reported for providers that run out of time.
pub const TIMEOUT_MESSAGE: &str = "Fetching info timed out";

/// Result of invoking one provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(InfoPayload),
    Timeout,
    Failed(String),
}

impl Outcome {
    fn from_error(err: ProviderError) -> Self {
        if err.is_timeout() {
            Outcome::Timeout
        } else {
            Outcome::Failed(err.to_string())
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The map placed in the report: the payload itself, or `{"error": ...}`.
    pub fn into_entry(self) -> InfoPayload {
        match self {
            Outcome::Success(payload) => payload,
            Outcome::Timeout => error_entry(TIMEOUT_MESSAGE),
            Outcome::Failed(message) => error_entry(&message),
        }
    }
}

fn error_entry(message: &str) -> InfoPayload {
    let mut entry = InfoPayload::new();
    entry.insert("error".to_string(), json!(message));
    entry
}

/// Converts erased provider output into a JSON mapping.
pub fn to_payload(data: &(dyn Serialize + Send + Sync)) -> ProviderResult<InfoPayload> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(ProviderError::InvalidPayload("null")),
        Value::Bool(_) => Err(ProviderError::InvalidPayload("a boolean")),
        Value::Number(_) => Err(ProviderError::InvalidPayload("a number")),
        Value::String(_) => Err(ProviderError::InvalidPayload("a string")),
        Value::Array(_) => Err(ProviderError::InvalidPayload("an array")),
    }
}

pub(crate) fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "Provider task was cancelled".to_string();
    }

    match err.try_into_panic() {
        Ok(panic) => {
            if let Some(message) = panic.downcast_ref::<&str>() {
                format!("Provider panicked: {}", message)
            } else if let Some(message) = panic.downcast_ref::<String>() {
                format!("Provider panicked: {}", message)
            } else {
                "Provider panicked".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}

/// Runs `provider` with at most `budget` of wall-clock time.
///
/// On timeout the context's cancellation token is triggered and the task is
/// aborted. Work the provider moved off its own task (blocking threads,
/// detached tasks) may keep running; the outcome is reported regardless.
#[tracing::instrument(skip_all, fields(component = %ctx.component()))]
pub async fn invoke(
    provider: Arc<dyn DynInfoProvider>,
    ctx: HealthContext,
    budget: Duration,
) -> Outcome {
    let cancel = ctx.cancellation_token().clone();
    let mut task = tokio::spawn(async move {
        let data = provider.info_dyn(&ctx).await?;
        to_payload(&*data)
    });

    match timeout(budget, &mut task).await {
        Ok(Ok(Ok(payload))) => {
            debug!("Provider returned {} field(s)", payload.len());
            Outcome::Success(payload)
        }
        Ok(Ok(Err(err))) => {
            warn!("Provider failed: {}", err);
            Outcome::from_error(err)
        }
        Ok(Err(join_err)) => {
            let message = describe_join_error(join_err);
            warn!("Provider task failed: {}", message);
            Outcome::Failed(message)
        }
        Err(_) => {
            warn!("Provider timed out after {:?}", budget);
            cancel.cancel();
            task.abort();
            Outcome::Timeout
        }
    }
}
