//! system-health: concurrent health/status aggregation for registered components
//!
//! Components register an async info provider under their name. On demand,
//! every provider is invoked concurrently, each within its own time budget,
//! and the results are assembled into one report keyed by component name,
//! with the host platform's own info always first.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with validation via the `validator` crate:
//!   provider budgets and logging.
//!
//! * `core`: The aggregation engine:
//!   - Provider traits, registry and built-in providers
//!   - Time-boxed invoker with failure isolation
//!   - Aggregator and the `SystemHealth` facade
//!
//! * `logger`: Logging initialization using `tracing`, with console output
//!   (compact, pretty, JSON) and optional systemd journald integration.
//!
//! ## Example
//!
//! ```ignore
//! use system_health::core::{providers::{provider_fn, ProviderRegistry}, SystemHealth};
//!
//! let health = SystemHealth::new(ProviderRegistry::new(), &Default::default());
//! health.register_info("lovelace", provider_fn(|_ctx| async {
//!     Ok(serde_json::json!({ "storage": "YAML" }))
//! }))?;
//!
//! let report = health.collect_system_health().await?;
//! assert_eq!(report.len(), 2);
//! ```

pub mod config;
pub mod core;
pub mod logger;
