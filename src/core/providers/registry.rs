use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
};

use erased_serde::Serialize;
use tracing::{debug, error, info};

use super::{
    platform::PLATFORM_KEY,
    traits::InfoProvider,
    types::{HealthContext, ProviderResult},
};
use crate::core::error::{HealthError, HealthResult};

/// Object-safe view of an [`InfoProvider`].
///
/// The registry stores providers of different concrete types side by side, so
/// their outputs are erased to `dyn Serialize` until the invoker turns them
/// into JSON.
#[async_trait::async_trait]
pub trait DynInfoProvider: Send + Sync {
    async fn info_dyn(
        &self,
        ctx: &HealthContext,
    ) -> ProviderResult<Box<dyn Serialize + Send + Sync>>;
}

/// Adapts any concrete [`InfoProvider`] to [`DynInfoProvider`].
pub struct DynWrapper<T> {
    inner: T,
}

impl<T> DynWrapper<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl<T> DynInfoProvider for DynWrapper<T>
where
    T: InfoProvider,
{
    async fn info_dyn(
        &self,
        ctx: &HealthContext,
    ) -> ProviderResult<Box<dyn Serialize + Send + Sync>> {
        let output = self.inner.info(ctx).await?;
        Ok(Box::new(output))
    }
}

/// Erases a concrete provider into the shared trait object the registry stores.
pub fn erase<T: InfoProvider>(provider: T) -> Arc<dyn DynInfoProvider> {
    Arc::new(DynWrapper::new(provider))
}

/// Provider backed by an async closure.
///
/// The closure receives an owned clone of the invocation context.
pub struct FnProvider<F> {
    func: F,
}

/// Wraps an async closure so it can be registered as a provider.
///
/// ```ignore
/// registry.register("lovelace", provider_fn(|_ctx| async move {
///     Ok(serde_json::json!({ "storage": "YAML" }))
/// }))?;
/// ```
pub fn provider_fn<F, Fut, O>(func: F) -> FnProvider<F>
where
    F: Fn(HealthContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProviderResult<O>> + Send + 'static,
    O: serde::Serialize + Send + Sync + 'static,
{
    FnProvider { func }
}

#[async_trait::async_trait]
impl<F, Fut, O> InfoProvider for FnProvider<F>
where
    F: Fn(HealthContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProviderResult<O>> + Send + 'static,
    O: serde::Serialize + Send + Sync + 'static,
{
    type Output = O;

    async fn info(&self, ctx: &HealthContext) -> ProviderResult<O> {
        (self.func)(ctx.clone()).await
    }
}

/// Compile-time registration record for a provider.
///
/// Submitted through [`register_info_provider!`](crate::register_info_provider)
/// and picked up by [`ProviderRegistry::register_discovered`].
pub struct ProviderMeta {
    pub name: &'static str,
    pub factory: fn() -> Arc<dyn DynInfoProvider>,
}

inventory::collect!(ProviderMeta);

/// A registered (name, provider) pair as seen in a snapshot.
#[derive(Clone)]
pub struct ProviderEntry {
    name: Arc<str>,
    provider: Arc<dyn DynInfoProvider>,
}

impl ProviderEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Arc<dyn DynInfoProvider> {
        &self.provider
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Central store of info providers keyed by component name.
///
/// Cloning yields another handle to the same store. Entries keep their
/// registration order, which is also the order of the aggregated report.
/// Registration is strict: a second registration under a taken name fails
/// with [`HealthError::DuplicateRegistration`] and leaves the first in place.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Arc<Mutex<Vec<ProviderEntry>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> HealthResult<MutexGuard<'_, Vec<ProviderEntry>>> {
        self.entries
            .lock()
            .map_err(|_| HealthError::RegistryUnavailable)
    }

    /// Registers a concrete provider under `name`.
    pub fn register<T: InfoProvider>(
        &self,
        name: impl Into<String>,
        provider: T,
    ) -> HealthResult<()> {
        self.register_dyn(name, erase(provider))
    }

    /// Registers an already type-erased provider under `name`.
    pub fn register_dyn(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn DynInfoProvider>,
    ) -> HealthResult<()> {
        let name = name.into();
        if name == PLATFORM_KEY {
            return Err(HealthError::ReservedName(name));
        }

        let mut entries = self.lock()?;
        if entries.iter().any(|e| e.name() == name) {
            return Err(HealthError::DuplicateRegistration(name));
        }

        debug!("Registered info provider '{}'", name);
        entries.push(ProviderEntry {
            name: name.into(),
            provider,
        });
        Ok(())
    }

    /// Registers every provider submitted via `register_info_provider!`.
    ///
    /// Returns the names registered, in the order they were registered.
    pub fn register_discovered(&self) -> HealthResult<Vec<&'static str>> {
        let mut metas: Vec<&ProviderMeta> =
            inventory::iter::<ProviderMeta>.into_iter().collect();
        // inventory gives no ordering guarantee across link units
        metas.sort_by_key(|meta| meta.name);

        let mut registered = Vec::with_capacity(metas.len());
        for meta in metas {
            self.register_dyn(meta.name, (meta.factory)())?;
            registered.push(meta.name);
        }

        info!("Registered {} discovered info provider(s)", registered.len());
        Ok(registered)
    }

    /// Removes the provider registered under `name`. Returns whether one existed.
    pub fn unregister(&self, name: &str) -> HealthResult<bool> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|e| e.name() != name);
        Ok(entries.len() != before)
    }

    /// Copies the current entries, in registration order.
    ///
    /// The lock is held only for the copy; later registrations do not affect
    /// a snapshot already taken.
    pub fn snapshot(&self) -> HealthResult<Vec<ProviderEntry>> {
        Ok(self.lock()?.clone())
    }

    /// Looks up the provider registered under `name`.
    pub fn get(&self, name: &str) -> HealthResult<Arc<dyn DynInfoProvider>> {
        self.lock()?
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.provider.clone())
            .ok_or_else(|| HealthError::NotFound(name.to_string()))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> HealthResult<Vec<String>> {
        Ok(self.lock()?.iter().map(|e| e.name().to_string()).collect())
    }

    /// Whether `name` is registered. A poisoned registry is logged and
    /// reported as holding nothing; use [`get`](Self::get) to see the error.
    pub fn contains(&self, name: &str) -> bool {
        self.lock()
            .inspect_err(|e| error!("{}", e))
            .map(|entries| entries.iter().any(|e| e.name() == name))
            .unwrap_or(false)
    }

    /// Number of registered providers; zero (and an error log) if poisoned.
    pub fn len(&self) -> usize {
        self.lock()
            .inspect_err(|e| error!("{}", e))
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Submits a provider type to the compile-time inventory under `$name`.
///
/// The type must implement [`InfoProvider`] and `Default`.
#[macro_export]
macro_rules! register_info_provider {
    ($provider_type:ty, $name:expr) => {
        inventory::submit! {
            $crate::core::providers::registry::ProviderMeta {
                name: $name,
                factory: || {
                    $crate::core::providers::registry::erase(
                        <$provider_type>::default(),
                    )
                },
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Default, serde::Serialize)]
    struct StorageInfo {
        storage: &'static str,
    }

    #[derive(Default)]
    struct LovelaceProvider;

    #[async_trait]
    impl InfoProvider for LovelaceProvider {
        type Output = StorageInfo;

        async fn info(&self, _ctx: &HealthContext) -> ProviderResult<StorageInfo> {
            Ok(StorageInfo { storage: "YAML" })
        }
    }

    mod registration {
        use super::*;

        #[test]
        fn register_and_lookup() {
            let registry = ProviderRegistry::new();
            registry.register("lovelace", LovelaceProvider).unwrap();

            assert_eq!(registry.len(), 1);
            assert!(!registry.is_empty());
            assert!(registry.contains("lovelace"));
            assert!(registry.get("lovelace").is_ok());
        }

        #[test]
        fn duplicate_is_rejected_and_first_kept() {
            let registry = ProviderRegistry::new();
            registry.register("lovelace", LovelaceProvider).unwrap();

            let err = registry
                .register(
                    "lovelace",
                    provider_fn(|_ctx| async { Ok(json!({ "storage": "other" })) }),
                )
                .unwrap_err();

            assert!(matches!(err, HealthError::DuplicateRegistration(ref n) if n == "lovelace"));
            assert_eq!(registry.len(), 1);
        }

        #[test]
        fn reserved_platform_key_is_rejected() {
            let registry = ProviderRegistry::new();
            let err = registry.register(PLATFORM_KEY, LovelaceProvider).unwrap_err();

            assert!(matches!(err, HealthError::ReservedName(_)));
            assert!(registry.is_empty());
        }

        #[test]
        fn missing_name_is_not_found() {
            let registry = ProviderRegistry::new();
            let result = registry.get("nope");

            assert!(matches!(result, Err(HealthError::NotFound(ref n)) if n == "nope"));
        }

        #[test]
        fn unregister_removes_entry() {
            let registry = ProviderRegistry::new();
            registry.register("lovelace", LovelaceProvider).unwrap();

            assert!(registry.unregister("lovelace").unwrap());
            assert!(!registry.unregister("lovelace").unwrap());
            assert!(registry.is_empty());

            // name is free again
            registry.register("lovelace", LovelaceProvider).unwrap();
        }
    }

    mod snapshots {
        use tracing_test::traced_test;

        use super::*;

        #[test]
        fn snapshot_preserves_registration_order() {
            let registry = ProviderRegistry::new();
            for name in ["zeta", "alpha", "mid"] {
                registry.register(name, LovelaceProvider).unwrap();
            }

            let names: Vec<_> = registry
                .snapshot()
                .unwrap()
                .iter()
                .map(|e| e.name().to_string())
                .collect();
            assert_eq!(names, vec!["zeta", "alpha", "mid"]);
            assert_eq!(registry.names().unwrap(), names);
        }

        #[test]
        fn snapshot_is_unaffected_by_later_registration() {
            let registry = ProviderRegistry::new();
            registry.register("first", LovelaceProvider).unwrap();

            let snapshot = registry.snapshot().unwrap();
            registry.register("second", LovelaceProvider).unwrap();

            assert_eq!(snapshot.len(), 1);
            assert_eq!(registry.snapshot().unwrap().len(), 2);
        }

        #[test]
        fn concurrent_registration_and_snapshots() {
            let registry = ProviderRegistry::new();

            let writers: Vec<_> = (0..8)
                .map(|i| {
                    let registry = registry.clone();
                    std::thread::spawn(move || {
                        registry
                            .register(format!("component_{i}"), LovelaceProvider)
                            .unwrap();
                        registry.snapshot().unwrap().len()
                    })
                })
                .collect();

            for writer in writers {
                let seen = writer.join().unwrap();
                assert!((1..=8).contains(&seen));
            }
            assert_eq!(registry.len(), 8);
        }

        #[test]
        #[traced_test]
        fn poisoned_registry_is_reported() {
            let registry = ProviderRegistry::new();
            registry.register("lovelace", LovelaceProvider).unwrap();

            let handle = registry.clone();
            let _ = std::thread::spawn(move || {
                let _guard = handle.entries.lock().unwrap();
                panic!("writer died");
            })
            .join();

            assert!(matches!(registry.snapshot(), Err(HealthError::RegistryUnavailable)));
            assert!(matches!(registry.names(), Err(HealthError::RegistryUnavailable)));
            assert!(matches!(
                registry.register("other", LovelaceProvider),
                Err(HealthError::RegistryUnavailable)
            ));
            assert!(!registry.contains("lovelace"));
            assert_eq!(registry.len(), 0);
            assert!(logs_contain("Provider registry is unavailable"));
        }

        #[test]
        fn clones_share_the_same_store() {
            let registry = ProviderRegistry::new();
            let handle = registry.clone();
            handle.register("lovelace", LovelaceProvider).unwrap();

            assert!(registry.contains("lovelace"));
        }
    }

    mod wrappers {
        use super::*;

        #[tokio::test]
        async fn dyn_wrapper_erases_output() {
            let provider = erase(LovelaceProvider);
            let ctx = HealthContext::new("lovelace");

            let data = provider.info_dyn(&ctx).await.unwrap();
            assert_eq!(serde_json::to_value(&*data).unwrap(), json!({ "storage": "YAML" }));
        }

        #[tokio::test]
        async fn fn_provider_sees_component_name() {
            let provider = erase(provider_fn(|ctx: HealthContext| async move {
                Ok(json!({ "component": ctx.component() }))
            }));
            let ctx = HealthContext::new("recorder");

            let data = provider.info_dyn(&ctx).await.unwrap();
            assert_eq!(serde_json::to_value(&*data).unwrap(), json!({ "component": "recorder" }));
        }
    }

    mod discovery {
        use super::*;
        #[allow(unused_imports)]
        use crate::register_info_provider;

        #[derive(Default)]
        struct DiscoveredProvider;

        #[async_trait]
        impl InfoProvider for DiscoveredProvider {
            type Output = serde_json::Value;

            async fn info(&self, _ctx: &HealthContext) -> ProviderResult<serde_json::Value> {
                Ok(json!({ "hello": "info" }))
            }
        }

        register_info_provider!(DiscoveredProvider, "fake_integration");

        #[tokio::test]
        async fn discovered_providers_are_registered() {
            let registry = ProviderRegistry::new();
            let names = registry.register_discovered().unwrap();

            assert!(names.contains(&"fake_integration"));
            let provider = registry.get("fake_integration").unwrap();
            let data = provider
                .info_dyn(&HealthContext::new("fake_integration"))
                .await
                .unwrap();
            assert_eq!(serde_json::to_value(&*data).unwrap(), json!({ "hello": "info" }));
        }

        #[test]
        fn discovering_twice_reports_duplicate() {
            let registry = ProviderRegistry::new();
            registry.register_discovered().unwrap();

            assert!(matches!(
                registry.register_discovered(),
                Err(HealthError::DuplicateRegistration(_))
            ));
        }
    }
}
