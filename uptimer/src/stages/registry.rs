//! Stage registry mapping type identifiers to factories.

use super::{
    AgeStage, ContainsStage, DnsStage, HeaderStage, JqStage, JsonPathStage, JsonSchemaStage,
    RegexStage, Stage, TcpStage, ThresholdStage,
};
#[cfg(feature = "network")]
use super::{
    Dhis2AnalyticsStage, Dhis2IntegrityStage, Dhis2JobStage, Dhis2Stage, Dhis2VersionStage,
    HttpStage, TlsStage,
};
use crate::config::ProbeSettings;
use crate::errors::MonitorError;
use crate::pipeline::StageConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Factory building a configured stage.
pub type StageFactory =
    Arc<dyn Fn(&StageConfig, &ProbeSettings) -> Result<Box<dyn Stage>, MonitorError> + Send + Sync>;

/// Wraps a typed constructor as a [`StageFactory`].
pub fn factory<S, F>(build: F) -> StageFactory
where
    S: Stage + 'static,
    F: Fn(&StageConfig, &ProbeSettings) -> Result<S, MonitorError> + Send + Sync + 'static,
{
    Arc::new(move |config: &StageConfig, settings: &ProbeSettings| {
        build(config, settings).map(|stage| Box::new(stage) as Box<dyn Stage>)
    })
}

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    factories: HashMap<String, StageFactory>,
}

/// Registry of stage factories.
///
/// Types are listed in registration order. Registering a type again
/// replaces its factory but keeps its position.
#[derive(Default)]
pub struct StageRegistry {
    entries: RwLock<Entries>,
    settings: ProbeSettings,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in stage.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Replaces the probe settings handed to factories.
    #[must_use]
    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Probe settings handed to factories.
    #[must_use]
    pub const fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    fn register_builtins(&self) {
        #[cfg(feature = "network")]
        self.register(HttpStage::TYPE, factory(HttpStage::from_config));
        self.register(AgeStage::TYPE, factory(AgeStage::from_config));
        self.register(ContainsStage::TYPE, factory(ContainsStage::from_config));
        #[cfg(feature = "network")]
        {
            self.register(Dhis2Stage::TYPE, factory(Dhis2Stage::from_config));
            self.register(Dhis2VersionStage::TYPE, factory(Dhis2VersionStage::from_config));
            self.register(Dhis2IntegrityStage::TYPE, factory(Dhis2IntegrityStage::from_config));
            self.register(Dhis2JobStage::TYPE, factory(Dhis2JobStage::from_config));
            self.register(Dhis2AnalyticsStage::TYPE, factory(Dhis2AnalyticsStage::from_config));
        }
        self.register(DnsStage::TYPE, factory(DnsStage::from_config));
        self.register(HeaderStage::TYPE, factory(HeaderStage::from_config));
        self.register(JqStage::TYPE, factory(JqStage::from_config));
        self.register(JsonSchemaStage::TYPE, factory(JsonSchemaStage::from_config));
        self.register(JsonPathStage::TYPE, factory(JsonPathStage::from_config));
        self.register(RegexStage::TYPE, factory(RegexStage::from_config));
        #[cfg(feature = "network")]
        self.register(TlsStage::TYPE, factory(TlsStage::from_config));
        self.register(TcpStage::TYPE, factory(TcpStage::from_config));
        self.register(ThresholdStage::TYPE, factory(ThresholdStage::from_config));
    }

    /// Registers a factory under `stage_type`.
    pub fn register(&self, stage_type: impl Into<String>, factory: StageFactory) {
        let stage_type = stage_type.into();
        let mut entries = self.entries.write();
        if entries.factories.insert(stage_type.clone(), factory).is_none() {
            entries.order.push(stage_type);
        }
    }

    /// Whether `stage_type` is registered.
    #[must_use]
    pub fn contains(&self, stage_type: &str) -> bool {
        self.entries.read().factories.contains_key(stage_type)
    }

    /// Looks up the factory for `stage_type`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownStage`] naming every registered type.
    pub fn resolve(&self, stage_type: &str) -> Result<StageFactory, MonitorError> {
        let entries = self.entries.read();
        entries
            .factories
            .get(stage_type)
            .cloned()
            .ok_or_else(|| MonitorError::unknown_stage(stage_type, entries.order.clone()))
    }

    /// Registered type identifiers, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.entries.read().order.clone()
    }

    /// Builds a stage from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the type is unknown or the factory rejects the
    /// configuration.
    pub fn build(&self, config: &StageConfig) -> Result<Box<dyn Stage>, MonitorError> {
        let factory = self.resolve(&config.stage_type)?;
        debug!(stage = %config.stage_type, "Building stage");
        factory(config, &self.settings)
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.entries.read().order)
            .field("settings", &self.settings)
            .finish()
    }
}

// Global registry
static DEFAULT_REGISTRY: RwLock<Option<Arc<StageRegistry>>> = RwLock::new(None);

/// Gets the process-wide registry of built-in stages.
///
/// It is created on first use with settings read from the environment.
pub fn default_registry() -> Arc<StageRegistry> {
    if let Some(registry) = DEFAULT_REGISTRY.read().as_ref() {
        return registry.clone();
    }

    let mut write = DEFAULT_REGISTRY.write();
    write
        .get_or_insert_with(|| {
            let settings = ProbeSettings::from_env().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring invalid probe settings from environment");
                ProbeSettings::default()
            });
            Arc::new(StageRegistry::with_defaults().with_settings(settings))
        })
        .clone()
}

/// Drops the process-wide registry; the next call to
/// [`default_registry`] creates a fresh one.
pub fn clear_default_registry() {
    *DEFAULT_REGISTRY.write() = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CheckContext;
    use crate::core::Outcome;
    use crate::stages::FnStage;
    use pretty_assertions::assert_eq;

    #[cfg(feature = "network")]
    #[test]
    fn test_builtins_in_registration_order() {
        let registry = StageRegistry::with_defaults();
        assert_eq!(
            registry.list(),
            vec![
                "http",
                "age",
                "contains",
                "dhis2",
                "dhis2-version",
                "dhis2-integrity",
                "dhis2-job",
                "dhis2-analytics",
                "dns",
                "header",
                "jq",
                "json-schema",
                "jsonpath",
                "regex",
                "ssl",
                "tcp",
                "threshold",
            ]
        );
    }

    #[test]
    fn test_unknown_stage_lists_available() {
        let registry = StageRegistry::new();
        registry.register("age", factory(AgeStage::from_config));
        registry.register("jq", factory(JqStage::from_config));

        let err = registry.build(&StageConfig::new("nope")).unwrap_err();
        assert_eq!(err.to_string(), "unknown stage: nope. Available: age, jq");
    }

    #[test]
    fn test_build_propagates_config_errors() {
        let registry = StageRegistry::with_defaults();
        let bad_jq = StageConfig::new("jq").with_expr("data");
        assert!(registry.build(&bad_jq).unwrap_err().is_configuration());

        let stage = registry.build(&StageConfig::new("threshold")).unwrap();
        assert_eq!(stage.stage_type(), "threshold");
    }

    #[tokio::test]
    async fn test_reregistering_replaces_factory_in_place() {
        let registry = StageRegistry::with_defaults();
        let before = registry.list();
        registry.register(
            "age",
            Arc::new(|_: &StageConfig, _: &ProbeSettings| {
                Ok(Box::new(FnStage::new("age", |_: &str, _: &mut CheckContext| {
                    Outcome::up("stubbed")
                })) as Box<dyn Stage>)
            }),
        );
        assert_eq!(registry.list(), before);

        let stage = registry.build(&StageConfig::new("age")).unwrap();
        let mut ctx = CheckContext::new("t");
        assert_eq!(stage.check("t", &mut ctx).await.message, "stubbed");
    }

    #[test]
    fn test_settings_reach_factories() {
        let registry = StageRegistry::with_defaults()
            .with_settings(ProbeSettings::default().with_socket_timeout(2.5));
        assert!((registry.settings().socket_timeout_secs - 2.5).abs() < f64::EPSILON);
        assert!(registry.contains("tcp"));
        assert!(!registry.contains("ftp"));
    }

    #[test]
    fn test_default_registry_is_shared_until_cleared() {
        let first = default_registry();
        let second = default_registry();
        assert!(Arc::ptr_eq(&first, &second));

        clear_default_registry();
        let third = default_registry();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.list(), first.list());
    }
}
