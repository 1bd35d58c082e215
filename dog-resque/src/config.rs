//! Dispatcher configuration.
//!
//! Values come from code, from any serde source, or from the environment
//! using the workspace convention of a prefix plus `__` as the path
//! separator:
//!
//! ```bash
//! export RESQUE__REDIS__HOST=redis.internal
//! export RESQUE__PREFIX=myapp
//! export RESQUE__AUTO_RETRY='{"default":[0,60]}'
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::keys::DEFAULT_PREFIX;
use crate::retry::RetryPolicyTable;
use crate::{QueueError, QueueResult};

/// Wire class every dispatched payload carries
pub const DEFAULT_WRAPPER_CLASS: &str = "DogResque\\Job";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
        }
    }
}

impl RedisConfig {
    /// Connection URL in the form the redis client accepts
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) if !password.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResqueConfig {
    pub redis: RedisConfig,
    pub prefix: String,
    pub wrapper_class: String,

    /// Merged into every job's arguments before dispatch
    pub context_options: Map<String, Value>,

    /// Retry strategies: an array, or an object keyed by job class with an
    /// optional `default` entry
    pub auto_retry: Option<Value>,
}

impl Default for ResqueConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            wrapper_class: DEFAULT_WRAPPER_CLASS.to_string(),
            context_options: Map::new(),
            auto_retry: None,
        }
    }
}

impl ResqueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the retry table from `auto_retry`
    pub fn retry_table(&self) -> QueueResult<RetryPolicyTable> {
        match &self.auto_retry {
            Some(value) => RetryPolicyTable::from_auto_retry(value),
            None => Ok(RetryPolicyTable::new()),
        }
    }

    /// Load from the process environment, e.g. `RESQUE__REDIS__PORT`
    pub fn from_env_prefix(prefix: &str) -> QueueResult<Self> {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Load from an explicit set of variables, starting from defaults
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> QueueResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let marker = format!("{}__", prefix);
        let mut config = Self::default();

        for (key, value) in vars {
            let Some(stripped) = key.as_ref().strip_prefix(&marker) else {
                continue;
            };
            // RESQUE__REDIS__HOST -> redis.host
            let normalized = stripped.to_lowercase().replace("__", ".");
            config.set(&normalized, value.into())?;
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, value: String) -> QueueResult<()> {
        match key {
            "redis.host" => self.redis.host = value,
            "redis.port" => self.redis.port = parse(key, &value)?,
            "redis.database" => self.redis.database = parse(key, &value)?,
            "redis.password" => self.redis.password = Some(value).filter(|p| !p.is_empty()),
            "prefix" => self.prefix = value,
            "wrapper_class" => self.wrapper_class = value,
            "auto_retry" => self.auto_retry = Some(parse_json(key, &value)?),
            "context_options" => match parse_json(key, &value)? {
                Value::Object(options) => self.context_options.extend(options),
                other => {
                    return Err(QueueError::Config(format!(
                        "context_options must be a JSON object, got {}",
                        other
                    )))
                }
            },
            other => {
                if let Some(option) = other.strip_prefix("context.") {
                    self.context_options.insert(option.to_string(), Value::String(value));
                } else {
                    tracing::debug!(key = %other, "Ignoring unknown configuration key");
                }
            }
        }
        Ok(())
    }

    /// Environment a supervisor hands to spawned worker processes. The redis
    /// password is not included.
    pub fn worker_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        if !self.prefix.is_empty() {
            env.insert("PREFIX".to_string(), self.prefix.clone());
        }
        if !self.redis.host.is_empty() {
            env.insert(
                "REDIS_BACKEND".to_string(),
                format!("{}:{}", self.redis.host, self.redis.port),
            );
        }
        env.insert("REDIS_BACKEND_DB".to_string(), self.redis.database.to_string());
        env
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> QueueResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| QueueError::Config(format!("{}: {}", key, e)))
}

fn parse_json(key: &str, value: &str) -> QueueResult<Value> {
    serde_json::from_str(value).map_err(|e| QueueError::Config(format!("{}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ResqueConfig::default();
        assert_eq!(config.prefix, "resque");
        assert_eq!(config.wrapper_class, DEFAULT_WRAPPER_CLASS);
        assert_eq!(config.redis.url(), "redis://127.0.0.1:6379/0");
        assert!(config.retry_table().unwrap().is_empty());
    }

    #[test]
    fn test_from_vars() {
        let vars = [
            ("RESQUE__REDIS__HOST", "redis.internal"),
            ("RESQUE__REDIS__PORT", "6380"),
            ("RESQUE__REDIS__DATABASE", "2"),
            ("RESQUE__REDIS__PASSWORD", "s3cret"),
            ("RESQUE__PREFIX", "myapp"),
            ("RESQUE__AUTO_RETRY", r#"{"default":[0,60],"Reports":[]}"#),
            ("RESQUE__CONTEXT__KERNEL_ENV", "prod"),
            ("OTHER__PREFIX", "ignored"),
        ];
        let config = ResqueConfig::from_vars("RESQUE", vars).unwrap();

        assert_eq!(config.prefix, "myapp");
        assert_eq!(config.redis.url(), "redis://:s3cret@redis.internal:6380/2");
        assert_eq!(config.context_options["kernel_env"], json!("prod"));

        let table = config.retry_table().unwrap();
        assert!(table.resolve("Reports").is_none());
        assert!(table.resolve("Mailer").is_some());
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let err = ResqueConfig::from_vars("RESQUE", [("RESQUE__REDIS__PORT", "many")]).unwrap_err();
        assert!(matches!(err, QueueError::Config(_)));

        let err = ResqueConfig::from_vars("RESQUE", [("RESQUE__CONTEXT_OPTIONS", "[1]")]).unwrap_err();
        assert!(matches!(err, QueueError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ResqueConfig =
            serde_json::from_value(json!({"redis": {"port": 7000}, "auto_retry": [5]})).unwrap();
        assert_eq!(config.redis.host, "127.0.0.1");
        assert_eq!(config.redis.port, 7000);
        assert_eq!(config.prefix, "resque");
        assert!(config.retry_table().unwrap().global().is_some());
    }

    #[test]
    fn test_worker_env() {
        let mut config = ResqueConfig::default();
        config.prefix = "myapp".to_string();
        config.redis.database = 3;
        config.redis.password = Some("s3cret".to_string());

        let env = config.worker_env();
        assert_eq!(env["PREFIX"], "myapp");
        assert_eq!(env["REDIS_BACKEND"], "127.0.0.1:6379");
        assert_eq!(env["REDIS_BACKEND_DB"], "3");
        assert_eq!(env.len(), 3);
        assert!(!env.values().any(|v| v.contains("s3cret")));
    }
}
