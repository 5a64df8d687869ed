use super::types::{HealthContext, ProviderResult};

/// Contract for anything that can report health information for a component.
///
/// Implementations typically do a small amount of I/O (reading `/proc`,
/// probing a socket, checking a local store) and return a serializable
/// summary. The output must serialize to a JSON object; anything else is
/// reported as a failure by the invoker.
#[async_trait::async_trait]
pub trait InfoProvider: Send + Sync + 'static {
    /// The structured summary this provider reports.
    type Output: serde::Serialize + Send + Sync + 'static;

    /// Gathers the component's current health information.
    ///
    /// Errors are never inspected by type downstream; only their `Display`
    /// text ends up in the aggregated report.
    async fn info(&self, ctx: &HealthContext) -> ProviderResult<Self::Output>;
}
