//! Concurrent aggregation of all registered providers into one report.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures_util::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::{
    error::{HealthError, HealthResult},
    invoker::{describe_join_error, invoke, to_payload, DEFAULT_BUDGET},
    providers::{
        error::ProviderError,
        platform::{PlatformInfoProvider, PLATFORM_KEY},
        registry::{erase, DynInfoProvider, ProviderRegistry},
        traits::InfoProvider,
        types::{HealthContext, InfoPayload},
    },
};
use crate::config::health::HealthConfig;

/// Time budgets for provider invocations.
#[derive(Debug, Clone, PartialEq)]
pub struct Budgets {
    default: Duration,
    overrides: HashMap<String, Duration>,
}

impl Budgets {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Gives `name` its own budget instead of the default.
    pub fn with_override(mut self, name: impl Into<String>, budget: Duration) -> Self {
        self.overrides.insert(name.into(), budget);
        self
    }

    pub fn default_budget(&self) -> Duration {
        self.default
    }

    pub fn for_component(&self, name: &str) -> Duration {
        self.overrides.get(name).copied().unwrap_or(self.default)
    }
}

impl Default for Budgets {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

impl From<&HealthConfig> for Budgets {
    fn from(config: &HealthConfig) -> Self {
        config.overrides.iter().fold(
            Budgets::new(config.provider_timeout()),
            |budgets, o| budgets.with_override(o.name.clone(), o.timeout()),
        )
    }
}

/// The combined report: platform info first, then one entry per registered
/// component in registration order.
///
/// Serializes as a JSON object with keys in that same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    entries: Vec<(String, InfoPayload)>,
}

impl AggregatedResult {
    pub fn get(&self, name: &str) -> Option<&InfoPayload> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoPayload)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Removes and returns the entry for `name`.
    pub fn take(&mut self, name: &str) -> Option<InfoPayload> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }
}

impl Serialize for AggregatedResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

/// Runs every registered provider concurrently and assembles the report.
#[derive(Clone)]
pub struct Aggregator {
    registry: ProviderRegistry,
    platform: Arc<dyn DynInfoProvider>,
    budgets: Budgets,
}

impl Aggregator {
    pub fn new(registry: ProviderRegistry, budgets: Budgets) -> Self {
        Self {
            registry,
            platform: erase(PlatformInfoProvider::new()),
            budgets,
        }
    }

    /// Replaces the built-in platform provider.
    pub fn with_platform_provider<T: InfoProvider>(mut self, provider: T) -> Self {
        self.platform = erase(provider);
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn budgets(&self) -> &Budgets {
        &self.budgets
    }

    /// Collects platform info. Not time-boxed; any failure is fatal,
    /// including a panic inside the provider.
    pub async fn platform_info(&self) -> HealthResult<InfoPayload> {
        let platform = self.platform.clone();
        let task = tokio::spawn(async move {
            let ctx = HealthContext::new(PLATFORM_KEY);
            let data = platform.info_dyn(&ctx).await?;
            to_payload(&*data)
        });

        match task.await {
            Ok(result) => result.map_err(HealthError::PlatformInfo),
            Err(join_err) => Err(HealthError::PlatformInfo(ProviderError::msg(
                describe_join_error(join_err),
            ))),
        }
    }

    /// Aggregates using the configured budgets.
    pub async fn aggregate(&self) -> HealthResult<AggregatedResult> {
        self.aggregate_with(&self.budgets).await
    }

    /// Aggregates with explicit per-provider budgets.
    ///
    /// Fails only if platform info fails or the registry cannot be read;
    /// provider failures and timeouts become `{"error": ...}` entries.
    #[tracing::instrument(skip_all)]
    pub async fn aggregate_with(&self, budgets: &Budgets) -> HealthResult<AggregatedResult> {
        let started = Instant::now();

        let platform = self
            .platform_info()
            .await
            .inspect_err(|e| error!("Aborting aggregation: {}", e))?;

        let snapshot = self.registry.snapshot()?;
        debug!("Invoking {} provider(s)", snapshot.len());

        let root = HealthContext::new("aggregation");
        // dropping this future mid-run cancels every provider still in flight
        let _cancel_on_drop = root.cancellation_token().clone().drop_guard();
        let invocations = snapshot.iter().map(|entry| {
            invoke(
                entry.provider().clone(),
                root.child(entry.name()),
                budgets.for_component(entry.name()),
            )
        });
        // join_all polls every invocation on its first poll, so all tasks start together
        let outcomes = join_all(invocations).await;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let mut entries = Vec::with_capacity(snapshot.len() + 1);
        entries.push((PLATFORM_KEY.to_string(), platform));
        entries.extend(
            snapshot
                .iter()
                .zip(outcomes)
                .map(|(entry, outcome)| (entry.name().to_string(), outcome.into_entry())),
        );

        info!(
            "Aggregated {} component(s), {} with errors, in {:?}",
            snapshot.len(),
            failed,
            started.elapsed()
        );

        Ok(AggregatedResult { entries })
    }

    /// Invokes only the named provider and returns its report entry.
    ///
    /// The platform key returns platform info (and its hard failure).
    pub async fn component_info(&self, name: &str) -> HealthResult<InfoPayload> {
        if name == PLATFORM_KEY {
            return self.platform_info().await;
        }

        let provider = self.registry.get(name)?;
        let ctx = HealthContext::new(name);
        let outcome = invoke(provider, ctx, self.budgets.for_component(name)).await;
        Ok(outcome.into_entry())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tokio::time::sleep;

    use super::*;
    use crate::core::providers::{error::ProviderError, registry::provider_fn};

    fn aggregator(registry: &ProviderRegistry) -> Aggregator {
        Aggregator::new(registry.clone(), Budgets::default())
            .with_platform_provider(provider_fn(|_ctx| async { Ok(json!({ "hello": true })) }))
    }

    fn delayed(millis: u64, tag: &'static str) -> impl InfoProvider {
        provider_fn(move |_ctx| async move {
            sleep(Duration::from_millis(millis)).await;
            Ok(json!({ "tag": tag }))
        })
    }

    #[tokio::test]
    async fn empty_registry_reports_platform_only() {
        let registry = ProviderRegistry::new();
        let result = aggregator(&registry).aggregate().await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "platform": { "hello": true } })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn output_follows_registration_not_completion() {
        let registry = ProviderRegistry::new();
        registry.register("slow", delayed(300, "slow")).unwrap();
        registry.register("fast", delayed(10, "fast")).unwrap();
        registry.register("medium", delayed(100, "medium")).unwrap();

        let result = aggregator(&registry).aggregate().await.unwrap();

        let names: Vec<_> = result.names().collect();
        assert_eq!(names, vec!["platform", "slow", "fast", "medium"]);

        let json = serde_json::to_string(&result).unwrap();
        let positions: Vec<_> = ["\"platform\"", "\"slow\"", "\"fast\"", "\"medium\""]
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn providers_run_concurrently() {
        let registry = ProviderRegistry::new();
        registry.register("a", delayed(100, "a")).unwrap();
        registry.register("b", delayed(200, "b")).unwrap();
        registry.register("c", delayed(300, "c")).unwrap();

        let started = Instant::now();
        let result = aggregator(&registry).aggregate().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.len(), 4);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(600), "took {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn total_time_is_bounded_by_the_budget() {
        let registry = ProviderRegistry::new();
        registry.register("quick", delayed(50, "quick")).unwrap();
        registry.register("stuck_a", delayed(60_000, "a")).unwrap();
        registry.register("stuck_b", delayed(60_000, "b")).unwrap();

        let budgets = Budgets::new(Duration::from_millis(500));
        let started = Instant::now();
        let result = aggregator(&registry).aggregate_with(&budgets).await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
        assert_eq!(result.get("quick"), json!({ "tag": "quick" }).as_object());
        for name in ["stuck_a", "stuck_b"] {
            assert_eq!(
                result.get(name),
                json!({ "error": "Fetching info timed out" }).as_object()
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn overrides_apply_per_component() {
        let registry = ProviderRegistry::new();
        registry.register("patient", delayed(2_000, "patient")).unwrap();
        registry.register("hasty", delayed(2_000, "hasty")).unwrap();

        let budgets = Budgets::new(Duration::from_secs(1))
            .with_override("patient", Duration::from_secs(3));
        let result = aggregator(&registry).aggregate_with(&budgets).await.unwrap();

        assert_eq!(result.get("patient"), json!({ "tag": "patient" }).as_object());
        assert_eq!(
            result.get("hasty"),
            json!({ "error": "Fetching info timed out" }).as_object()
        );
    }

    #[tokio::test]
    async fn one_entry_per_component_whatever_fails() {
        let registry = ProviderRegistry::new();
        registry
            .register("ok", provider_fn(|_ctx| async { Ok(json!({ "fine": 1 })) }))
            .unwrap();
        registry
            .register(
                "broken",
                provider_fn(|_ctx| async { Err::<Value, _>(ProviderError::msg("disk gone")) }),
            )
            .unwrap();
        registry
            .register("odd", provider_fn(|_ctx| async { Ok(json!("not a map")) }))
            .unwrap();

        let result = aggregator(&registry).aggregate().await.unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "platform": { "hello": true },
                "ok": { "fine": 1 },
                "broken": { "error": "disk gone" },
                "odd": { "error": "Provider returned a string instead of a mapping" },
            })
        );
    }

    #[tokio::test]
    async fn platform_failure_aborts_aggregation() {
        let registry = ProviderRegistry::new();
        registry
            .register("ok", provider_fn(|_ctx| async { Ok(json!({ "fine": 1 })) }))
            .unwrap();

        let aggregator = Aggregator::new(registry, Budgets::default()).with_platform_provider(
            provider_fn(|_ctx| async { Err::<Value, _>(ProviderError::msg("no platform")) }),
        );

        let err = aggregator.aggregate().await.unwrap_err();
        assert!(matches!(err, HealthError::PlatformInfo(_)));
        assert_eq!(err.to_string(), "Failed to collect platform info: no platform");
    }

    #[tokio::test]
    async fn platform_panic_is_reported_as_error() {
        let aggregator = Aggregator::new(ProviderRegistry::new(), Budgets::default())
            .with_platform_provider(provider_fn(|_ctx| async {
                if true {
                    panic!("platform boom");
                }
                Ok(json!({}))
            }));

        let err = aggregator.aggregate().await.unwrap_err();

        assert!(matches!(err, HealthError::PlatformInfo(_)));
        assert_eq!(
            err.to_string(),
            "Failed to collect platform info: Provider panicked: platform boom"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_aggregation_cancels_providers() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let registry = ProviderRegistry::new();
        registry
            .register(
                "stuck",
                provider_fn(move |ctx: HealthContext| {
                    let tx = tx.clone();
                    async move {
                        ctx.cancelled().await;
                        if let Some(tx) = tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                        Ok(json!({}))
                    }
                }),
            )
            .unwrap();

        let aggregator = aggregator(&registry);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), aggregator.aggregate()).await;

        assert!(abandoned.is_err());
        rx.await.expect("cancellation should reach the provider");
    }

    #[tokio::test]
    async fn component_info_targets_one_provider() {
        let registry = ProviderRegistry::new();
        registry
            .register("lovelace", provider_fn(|_ctx| async { Ok(json!({ "storage": "YAML" })) }))
            .unwrap();
        let aggregator = aggregator(&registry);

        assert_eq!(
            Value::Object(aggregator.component_info("lovelace").await.unwrap()),
            json!({ "storage": "YAML" })
        );
        assert_eq!(
            Value::Object(aggregator.component_info(PLATFORM_KEY).await.unwrap()),
            json!({ "hello": true })
        );
        assert!(matches!(
            aggregator.component_info("missing").await,
            Err(HealthError::NotFound(_))
        ));
    }

    #[test]
    fn budgets_from_config() {
        let config = HealthConfig {
            provider_timeout_ms: 2_000,
            overrides: vec![crate::config::health::ProviderOverride {
                name: "recorder".into(),
                timeout_ms: 10_000,
            }],
        };

        let budgets = Budgets::from(&config);
        assert_eq!(budgets.default_budget(), Duration::from_secs(2));
        assert_eq!(budgets.for_component("recorder"), Duration::from_secs(10));
        assert_eq!(budgets.for_component("other"), Duration::from_secs(2));
    }

    #[test]
    fn take_removes_entry() {
        let mut result = AggregatedResult {
            entries: vec![
                ("platform".into(), InfoPayload::new()),
                ("lovelace".into(), json!({ "storage": "YAML" }).as_object().cloned().unwrap()),
            ],
        };

        let entry = result.take("lovelace").unwrap();
        assert_eq!(entry.get("storage"), Some(&json!("YAML")));
        assert_eq!(result.len(), 1);
        assert!(result.take("lovelace").is_none());
    }
}
