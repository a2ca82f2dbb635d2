use serde::Deserialize;
use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    #[serde(rename = "dynamodb")]
    DynamoDb { table: String },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            recent_limit: default_recent_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub prediction_url: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_port() -> u16 {
    8081
}

fn default_page_limit() -> usize {
    50
}

fn default_recent_limit() -> usize {
    5
}

impl AppConfig {
    /// Reads the YAML file named by `APP_CONFIG` if set, otherwise the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("APP_CONFIG") {
            Ok(path) => {
                log::info!("Loading configuration from {}", path);
                let contents = std::fs::read_to_string(path)?;
                Self::from_yaml_str(&contents)
            }
            Err(_) => Self::from_lookup(|name| env::var(name).ok()),
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.check()
    }

    /// Builds the configuration from named variables; `lookup` is `env::var` outside tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prediction_url =
            lookup("PREDICTION_SERVICE_URL").ok_or(ConfigError::Missing("PREDICTION_SERVICE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port = parse_or(&lookup, "PORT", default_port())?;

        let store = match lookup("STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreConfig::Memory,
            Some("dynamodb") => StoreConfig::DynamoDb {
                table: lookup("DYNAMODB_ASSESSMENTS_TABLE")
                    .ok_or(ConfigError::Missing("DYNAMODB_ASSESSMENTS_TABLE"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    reason: format!("unknown backend '{}'", other),
                });
            }
        };

        let history = HistoryConfig {
            page_limit: parse_or(&lookup, "HISTORY_LIMIT", default_page_limit())?,
            recent_limit: parse_or(&lookup, "RECENT_LIMIT", default_recent_limit())?,
        };

        AppConfig {
            port,
            prediction_url,
            jwt_secret,
            store,
            history,
        }
        .check()
    }

    fn check(self) -> Result<Self, ConfigError> {
        url::Url::parse(&self.prediction_url).map_err(|e| ConfigError::Invalid {
            name: "PREDICTION_SERVICE_URL",
            reason: e.to_string(),
        })?;
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_defaults_to_memory_store() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PREDICTION_SERVICE_URL", "http://localhost:8000/api/v1"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.store, StoreConfig::Memory);
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn env_dynamodb_requires_table() {
        let err = AppConfig::from_lookup(lookup(&[
            ("PREDICTION_SERVICE_URL", "http://localhost:8000/api/v1"),
            ("JWT_SECRET", "s3cret"),
            ("STORE_BACKEND", "dynamodb"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DYNAMODB_ASSESSMENTS_TABLE")));
    }

    #[test]
    fn env_rejects_bad_values() {
        let err = AppConfig::from_lookup(lookup(&[
            ("PREDICTION_SERVICE_URL", "http://localhost:8000/api/v1"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("PREDICTION_SERVICE_URL", "localhost"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "PREDICTION_SERVICE_URL",
                ..
            }
        ));

        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PREDICTION_SERVICE_URL")));
    }

    #[test]
    fn yaml_config_with_dynamodb_store() {
        let config = AppConfig::from_yaml_str(
            r#"
port: 9000
prediction_url: http://model:8000/api/v1
jwt_secret: s3cret
store:
  backend: dynamodb
  table: assessments
history:
  page_limit: 20
"#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(
            config.store,
            StoreConfig::DynamoDb {
                table: "assessments".into()
            }
        );
        assert_eq!(config.history.page_limit, 20);
        assert_eq!(config.history.recent_limit, 5);
    }
}
