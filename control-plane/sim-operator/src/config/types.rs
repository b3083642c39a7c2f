use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    #[envconfig(from = "SIM_OPERATOR_HTTP_PORT", default = "8088")]
    pub http_port: u16,

    /// Restrict watches to a single namespace. All namespaces when unset.
    /// Env: SIM_OPERATOR_WATCH_NAMESPACE
    #[envconfig(from = "SIM_OPERATOR_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Reporter name used for events.
    #[envconfig(from = "SIM_OPERATOR_FIELD_MANAGER", default = "sim-operator")]
    pub field_manager: String,

    /// Periodic resync for converged roots.
    /// Env: SIM_OPERATOR_REQUEUE_SECS
    #[envconfig(from = "SIM_OPERATOR_REQUEUE_SECS", default = "300")]
    pub requeue_secs: u64,

    /// Delay before a failed root is reconciled again.
    /// Env: SIM_OPERATOR_ERROR_REQUEUE_SECS
    #[envconfig(from = "SIM_OPERATOR_ERROR_REQUEUE_SECS", default = "30")]
    pub error_requeue_secs: u64,

    /// How long a discovery answer for an optional kind is reused.
    /// Env: SIM_OPERATOR_DISCOVERY_TTL_SECS
    #[envconfig(from = "SIM_OPERATOR_DISCOVERY_TTL_SECS", default = "60")]
    pub discovery_ttl_secs: u64,

    #[envconfig(nested)]
    pub features: FeaturesConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct FeaturesConfig {
    #[envconfig(from = "SIM_OPERATOR_FEATURES_SCHEDULER_INSTALL", default = "true")]
    pub scheduler_install: bool,
    #[envconfig(
        from = "SIM_OPERATOR_FEATURES_SIMULATOR_DEPLOYMENT",
        default = "true"
    )]
    pub simulator_deployment: bool,
    /// Delete label-linked children in other namespaces when a root goes away.
    /// Off by default: cross-namespace children are left in place.
    #[envconfig(
        from = "SIM_OPERATOR_FEATURES_CROSS_NAMESPACE_CLEANUP",
        default = "false"
    )]
    pub cross_namespace_cleanup: bool,
    /// When false the capability gate has no discovery and treats every kind as supported.
    #[envconfig(from = "SIM_OPERATOR_FEATURES_DISCOVERY", default = "true")]
    pub discovery: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            scheduler_install: true,
            simulator_deployment: true,
            cross_namespace_cleanup: false,
            discovery: true,
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            http_port: 8088,
            watch_namespace: None,
            field_manager: "sim-operator".into(),
            requeue_secs: 300,
            error_requeue_secs: 30,
            discovery_ttl_secs: 60,
            features: FeaturesConfig::default(),
        }
    }
}

impl OperatorConfig {
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }

    pub fn error_requeue_after(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs.max(1))
    }

    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_secs)
    }

    /// Empty or whitespace-only namespace means "watch everything".
    pub fn watch_namespace(&self) -> Option<&str> {
        self.watch_namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> OperatorConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OperatorConfig::init_from_hashmap(&env).unwrap()
    }

    #[test]
    fn defaults_when_env_is_empty() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.http_port, 8088);
        assert_eq!(cfg.field_manager, "sim-operator");
        assert_eq!(cfg.requeue_after(), Duration::from_secs(300));
        assert_eq!(cfg.error_requeue_after(), Duration::from_secs(30));
        assert_eq!(cfg.discovery_ttl(), Duration::from_secs(60));
        assert!(cfg.features.scheduler_install);
        assert!(cfg.features.simulator_deployment);
        assert!(cfg.features.discovery);
        assert!(!cfg.features.cross_namespace_cleanup);
        assert_eq!(cfg.watch_namespace(), None);
    }

    #[test]
    fn env_overrides_are_respected() {
        let cfg = from_pairs(&[
            ("SIM_OPERATOR_HTTP_PORT", "9000"),
            ("SIM_OPERATOR_WATCH_NAMESPACE", "llm-d"),
            ("SIM_OPERATOR_ERROR_REQUEUE_SECS", "0"),
            ("SIM_OPERATOR_DISCOVERY_TTL_SECS", "0"),
            ("SIM_OPERATOR_FEATURES_CROSS_NAMESPACE_CLEANUP", "true"),
            ("SIM_OPERATOR_FEATURES_SIMULATOR_DEPLOYMENT", "false"),
        ]);
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.watch_namespace(), Some("llm-d"));
        // zero would spin the error policy
        assert_eq!(cfg.error_requeue_after(), Duration::from_secs(1));
        assert_eq!(cfg.discovery_ttl(), Duration::ZERO);
        assert!(cfg.features.cross_namespace_cleanup);
        assert!(!cfg.features.simulator_deployment);
    }

    #[test]
    fn blank_watch_namespace_means_all() {
        let cfg = from_pairs(&[("SIM_OPERATOR_WATCH_NAMESPACE", "  ")]);
        assert_eq!(cfg.watch_namespace(), None);
    }
}
