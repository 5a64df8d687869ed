use thiserror::Error;

use super::providers::error::ProviderError;

/// Result alias for registry, aggregation and accessor operations.
pub type HealthResult<T> = std::result::Result<T, HealthError>;

/// Hard failures of the aggregation engine.
///
/// Individual provider failures are not represented here: those are folded
/// into the report as `{"error": ...}` entries and never abort a run.
#[derive(Error, Debug)]
pub enum HealthError {
    /// A component tried to register under a name that is already taken.
    #[error("Info provider already registered for: {0}")]
    DuplicateRegistration(String),

    /// A component tried to register under the reserved platform key.
    #[error("Name '{0}' is reserved for platform info")]
    ReservedName(String),

    /// The platform's own info could not be collected.
    #[error("Failed to collect platform info: {0}")]
    PlatformInfo(#[source] ProviderError),

    /// The requested component has no registered provider.
    #[error("Info provider not found for: {0}")]
    NotFound(String),

    /// The registry lock was poisoned by a panicking writer.
    #[error("Provider registry is unavailable")]
    RegistryUnavailable,
}

impl HealthError {
    /// Stable, transport-friendly identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            HealthError::DuplicateRegistration(_) => "duplicate_registration",
            HealthError::ReservedName(_) => "reserved_name",
            HealthError::PlatformInfo(_) => "platform_info_failed",
            HealthError::NotFound(_) => "not_found",
            HealthError::RegistryUnavailable => "registry_unavailable",
        }
    }
}
