//! Bus configuration, loaded once at startup.
//!
//! Configuration comes from a JSON file ([`BusConfig::from_file`]) or from
//! `MSBUS_*` environment variables ([`BusConfig::from_env`]). Either way it
//! is validated eagerly: a missing broker list or group id fails at
//! startup, not on the first message.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::consumer::ConsumerConfig;
use crate::producer::ProducerConfig;
use crate::registry::HandlerOptions;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level bus settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Bootstrap broker addresses (`host:port`).
    #[serde(default)]
    pub brokers: Vec<String>,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub group_id: String,
    /// `metadata.source` of everything this service sends. Defaults to
    /// `client_id`.
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub producer: ProducerSettings,
    #[serde(default)]
    pub consumer: ConsumerSettings,
    #[serde(default)]
    pub topics: TopicSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub sasl: Option<SaslConfig>,
}

/// TLS material, by file location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub ca_location: Option<PathBuf>,
    pub certificate_location: Option<PathBuf>,
    pub key_location: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SaslMechanism {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "scram-sha-256")]
    ScramSha256,
    #[serde(rename = "scram-sha-512")]
    ScramSha512,
}

impl SaslMechanism {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "plain" => Some(SaslMechanism::Plain),
            "scram-sha-256" => Some(SaslMechanism::ScramSha256),
            "scram-sha-512" => Some(SaslMechanism::ScramSha512),
            _ => None,
        }
    }
}

/// SASL credentials. The password never appears in `Debug` output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaslConfig {
    pub mechanism: SaslMechanism,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProducerSettings {
    /// Publish retries after the first attempt.
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumerSettings {
    /// Handler retries after the first attempt.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            poll_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopicSettings {
    pub partitions: u32,
    pub replication: u16,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            partitions: 1,
            replication: 1,
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl BusConfig {
    /// Minimal configuration; everything else takes its default.
    pub fn new(
        brokers: Vec<String>,
        client_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            brokers,
            client_id: client_id.into(),
            group_id: group_id.into(),
            service_name: None,
            security: SecurityConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
            producer: ProducerSettings::default(),
            consumer: ConsumerSettings::default(),
            topics: TopicSettings::default(),
            log_level: default_log_level(),
        }
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: BusConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from `MSBUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](BusConfig::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let brokers = var("MSBUS_BROKERS")
            .map(|list| {
                list.split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let mut config = Self::new(
            brokers,
            var("MSBUS_CLIENT_ID").unwrap_or_default(),
            var("MSBUS_GROUP_ID").unwrap_or_default(),
        );
        config.service_name = var("MSBUS_SERVICE_NAME");

        if let Some(v) = var("MSBUS_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("MSBUS_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("MSBUS_PRODUCER_RETRIES") {
            config.producer.retries = parse_number("MSBUS_PRODUCER_RETRIES", &v)?;
        }
        if let Some(v) = var("MSBUS_PRODUCER_RETRY_DELAY_MS") {
            config.producer.retry_delay_ms = parse_number("MSBUS_PRODUCER_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = var("MSBUS_CONSUMER_MAX_RETRIES") {
            config.consumer.max_retries = parse_number("MSBUS_CONSUMER_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("MSBUS_CONSUMER_RETRY_DELAY_MS") {
            config.consumer.retry_delay_ms = parse_number("MSBUS_CONSUMER_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = var("MSBUS_CONSUMER_POLL_INTERVAL_MS") {
            config.consumer.poll_interval_ms =
                parse_number("MSBUS_CONSUMER_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("MSBUS_TOPIC_PARTITIONS") {
            config.topics.partitions = parse_number("MSBUS_TOPIC_PARTITIONS", &v)?;
        }
        if let Some(v) = var("MSBUS_TOPIC_REPLICATION") {
            config.topics.replication = parse_number("MSBUS_TOPIC_REPLICATION", &v)?;
        }
        if let Some(v) = var("MSBUS_LOG_LEVEL") {
            config.log_level = v;
        }

        let tls = TlsConfig {
            ca_location: var("MSBUS_TLS_CA_LOCATION").map(PathBuf::from),
            certificate_location: var("MSBUS_TLS_CERT_LOCATION").map(PathBuf::from),
            key_location: var("MSBUS_TLS_KEY_LOCATION").map(PathBuf::from),
        };
        if tls.ca_location.is_some()
            || tls.certificate_location.is_some()
            || tls.key_location.is_some()
        {
            config.security.tls = Some(tls);
        }

        if let Some(mechanism) = var("MSBUS_SASL_MECHANISM") {
            let mechanism =
                SaslMechanism::parse(&mechanism).ok_or_else(|| ConfigError::Invalid {
                    field: "MSBUS_SASL_MECHANISM",
                    reason: format!("unsupported mechanism {mechanism:?}"),
                })?;
            config.security.sasl = Some(SaslConfig {
                mechanism,
                username: var("MSBUS_SASL_USERNAME")
                    .ok_or(ConfigError::Missing("MSBUS_SASL_USERNAME"))?,
                password: var("MSBUS_SASL_PASSWORD")
                    .map(SecretString::from)
                    .ok_or(ConfigError::Missing("MSBUS_SASL_PASSWORD"))?,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Check required settings and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.is_empty() {
            return Err(ConfigError::Missing("brokers"));
        }
        if let Some(broker) = self.brokers.iter().find(|b| b.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "brokers",
                reason: format!("empty broker address {broker:?}"),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::Missing("group_id"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.topics.partitions == 0 || self.topics.replication == 0 {
            return Err(ConfigError::Invalid {
                field: "topics",
                reason: "partitions and replication must be at least 1".into(),
            });
        }
        if let Some(tls) = &self.security.tls {
            if tls.certificate_location.is_some() != tls.key_location.is_some() {
                return Err(ConfigError::Invalid {
                    field: "security.tls",
                    reason: "certificate_location and key_location must be set together".into(),
                });
            }
        }
        if let Some(sasl) = &self.security.sasl {
            if sasl.username.is_empty() {
                return Err(ConfigError::Missing("security.sasl.username"));
            }
        }
        Ok(())
    }

    /// `metadata.source` for outgoing messages.
    pub fn service_name(&self) -> &str {
        self.service_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.client_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig::new(self.client_id.clone())
            .with_source(self.service_name())
            .with_retries(
                self.producer.retries,
                Duration::from_millis(self.producer.retry_delay_ms),
            )
            .with_request_timeout(self.request_timeout())
            .with_poll_interval(Duration::from_millis(self.consumer.poll_interval_ms))
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig::new(self.group_id.clone())
            .with_source(self.service_name())
            .with_poll_interval(Duration::from_millis(self.consumer.poll_interval_ms))
            .with_publish_retries(
                self.producer.retries,
                Duration::from_millis(self.producer.retry_delay_ms),
            )
    }

    /// Retry policy for handlers registered without their own.
    pub fn handler_defaults(&self) -> HandlerOptions {
        HandlerOptions::new(
            self.consumer.max_retries,
            Duration::from_millis(self.consumer.retry_delay_ms),
        )
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })
}
