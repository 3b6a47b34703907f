use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::interceptor::{MethodPredicate, TargetGroup};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Log every SQL statement sqlx executes
    #[serde(default)]
    pub log_sql: bool,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub transaction: TransactionSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

/// Transaction middleware settings.
///
/// At most one auto-apply target takes effect, checked in the order
/// global, web, api. With none set the middleware is attached by hand.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionSettings {
    #[serde(default)]
    pub auto_apply_global: bool,
    #[serde(default)]
    pub auto_apply_web: bool,
    #[serde(default)]
    pub auto_apply_api: bool,
    /// HTTP methods that run inside a transaction
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
}

fn default_methods() -> Vec<String> {
    vec!["DELETE".to_string()]
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            auto_apply_global: false,
            auto_apply_web: false,
            auto_apply_api: false,
            methods: default_methods(),
        }
    }
}

impl TransactionSettings {
    pub fn target_group(&self) -> Option<TargetGroup> {
        if self.auto_apply_global {
            Some(TargetGroup::Global)
        } else if self.auto_apply_web {
            Some(TargetGroup::Web)
        } else if self.auto_apply_api {
            Some(TargetGroup::Api)
        } else {
            None
        }
    }

    pub fn predicate(&self) -> anyhow::Result<MethodPredicate> {
        MethodPredicate::from_names(&self.methods)
            .with_context(|| format!("Invalid transaction methods: {:?}", self.methods))
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    const BASE: &str = r#"
log_level: info
log_dir: ./logs
log_file: app.log
use_json: false
rotation: daily
gateway:
  host: 127.0.0.1
  port: 8080
"#;

    #[test]
    fn test_transaction_defaults() {
        let config = AppConfig::from_yaml(BASE).unwrap();

        assert_eq!(config.transaction, TransactionSettings::default());
        assert_eq!(config.transaction.target_group(), None);
        assert_eq!(
            config.transaction.predicate().unwrap().methods(),
            &[Method::DELETE]
        );
        assert!(config.database.is_none());
    }

    #[test]
    fn test_database_defaults() {
        let yaml = format!("{BASE}database:\n  url: postgres://localhost/notes\n");
        let config = AppConfig::from_yaml(&yaml).unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url, "postgres://localhost/notes");
        assert_eq!(database.max_connections, 20);
        assert_eq!(database.acquire_timeout_secs, 5);
    }

    #[test]
    fn test_target_group_precedence() {
        let yaml = format!(
            "{BASE}transaction:\n  auto_apply_web: true\n  auto_apply_api: true\n"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.transaction.target_group(), Some(TargetGroup::Web));

        let settings = TransactionSettings {
            auto_apply_global: true,
            auto_apply_web: true,
            ..Default::default()
        };
        assert_eq!(settings.target_group(), Some(TargetGroup::Global));

        let settings = TransactionSettings {
            auto_apply_api: true,
            ..Default::default()
        };
        assert_eq!(settings.target_group(), Some(TargetGroup::Api));
    }

    #[test]
    fn test_custom_methods() {
        let yaml = format!("{BASE}transaction:\n  methods: [delete, put, patch]\n");
        let config = AppConfig::from_yaml(&yaml).unwrap();

        assert_eq!(
            config.transaction.predicate().unwrap().methods(),
            &[Method::DELETE, Method::PUT, Method::PATCH]
        );
    }

    #[test]
    fn test_invalid_method_rejected() {
        let settings = TransactionSettings {
            methods: vec!["NOT A METHOD".to_string()],
            ..Default::default()
        };
        assert!(settings.predicate().is_err());
    }
}
