use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::ProviderError;

/// Result alias used by every info provider.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The payload a provider reports: a mapping from string keys to JSON values.
pub type InfoPayload = serde_json::Map<String, serde_json::Value>;

/// Execution context handed to a provider for a single invocation.
///
/// Cloning is cheap. The cancellation token is a request only: providers that
/// want to stop early on timeout should watch it, nothing forces them to.
#[derive(Debug, Clone)]
pub struct HealthContext {
    component: Arc<str>,
    cancel: CancellationToken,
}

impl HealthContext {
    pub fn new(component: impl Into<Arc<str>>) -> Self {
        Self {
            component: component.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Derives a context for another component whose cancellation follows this one.
    pub fn child(&self, component: impl Into<Arc<str>>) -> Self {
        Self {
            component: component.into(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Name of the component being asked for its info.
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the invocation has been asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
