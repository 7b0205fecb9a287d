use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("freshness window must be greater than zero")]
    ZeroFreshnessWindow,
}

/// Tuning for a [`NonceResolver`](crate::NonceResolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// How long after an issued transaction the local cache outranks a
    /// lower pending nonce from the ledger.
    #[serde(rename = "freshness_window_ms", with = "duration_ms")]
    pub freshness_window: Duration,
    /// Upper bound on a single pending-nonce query. `None` waits forever.
    #[serde(rename = "query_timeout_ms", with = "opt_duration_ms")]
    pub query_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            query_timeout: None,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness_window.is_zero() {
            return Err(ConfigError::ZeroFreshnessWindow);
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.freshness_window, Duration::from_secs(5));
        assert_eq!(config.query_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_millis() {
        let config: ResolverConfig =
            serde_json::from_str(r#"{"freshness_window_ms": 2500, "query_timeout_ms": 800}"#)
                .unwrap();
        assert_eq!(config.freshness_window, Duration::from_millis(2500));
        assert_eq!(config.query_timeout, Some(Duration::from_millis(800)));

        // missing fields fall back to defaults
        let config: ResolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ResolverConfig::default());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["freshness_window_ms"], 5000);
        assert!(json["query_timeout_ms"].is_null());
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = ResolverConfig {
            freshness_window: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroFreshnessWindow));
    }
}
