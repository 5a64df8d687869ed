//! Aggregation engine: provider registry, invoker, aggregator and facade.

pub mod aggregator;
pub mod error;
pub mod health;
pub mod invoker;
pub mod providers;

pub use aggregator::{AggregatedResult, Aggregator, Budgets};
pub use error::{HealthError, HealthResult};
pub use health::{HealthResponse, SystemHealth};
pub use invoker::{invoke, Outcome, DEFAULT_BUDGET, TIMEOUT_MESSAGE};
