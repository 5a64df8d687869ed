//! Info provider contracts, the provider registry and built-in providers.

pub mod error;
pub mod load_average;
pub mod platform;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::ProviderError;
pub use load_average::{LoadAverage, LoadAverageProvider};
pub use platform::{PlatformInfo, PlatformInfoProvider, PLATFORM_KEY};
pub use registry::{
    erase, provider_fn, DynInfoProvider, FnProvider, ProviderEntry, ProviderRegistry,
};
pub use traits::InfoProvider;
pub use types::{HealthContext, InfoPayload, ProviderResult};
