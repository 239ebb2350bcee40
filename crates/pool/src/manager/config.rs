//! Worker manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persistence::SLOTS_KEY;

/// Default time a slot may stay busy before it is reported stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(1800);

/// Configuration errors, raised before any slot work starts
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Owner name is empty
    #[error("worker manager name is invalid (empty)")]
    EmptyOwnerName,

    /// Target slot count is negative
    #[error("target slot count must not be negative, got {0}")]
    NegativeTarget(i64),

    /// Store key is empty
    #[error("store key must not be empty")]
    EmptyStoreKey,

    /// An environment variable could not be parsed
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// How the slot table write interacts with concurrent writers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Overwrite whatever is stored (single scheduled invocation per owner)
    #[default]
    LastWriterWins,

    /// Reject the write if the table changed since it was loaded
    Optimistic,
}

/// Worker manager configuration
///
/// Immutable once the manager is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerManagerConfig {
    /// Name of the manager, stamped on every slot it creates
    pub owner_name: String,

    /// Desired pool size
    pub target_slots: i64,

    /// How long a slot may stay busy before it is reported stale
    #[serde(with = "duration_secs")]
    pub stale_after: Duration,

    /// Key of the slot table in the store
    pub store_key: String,

    /// Write mode for the slot table
    pub concurrency: ConcurrencyMode,
}

impl WorkerManagerConfig {
    /// Create a configuration with default stale threshold and store key
    pub fn new(owner_name: impl Into<String>, target_slots: i64) -> Self {
        Self {
            owner_name: owner_name.into(),
            target_slots,
            stale_after: DEFAULT_STALE_AFTER,
            store_key: SLOTS_KEY.to_string(),
            concurrency: ConcurrencyMode::default(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `PIDWARDEN_OWNER`: Owner name (required)
    /// - `PIDWARDEN_SLOTS`: Target slot count (default: 1)
    /// - `PIDWARDEN_STALE_AFTER_SECS`: Stale threshold in seconds (default: 1800)
    /// - `PIDWARDEN_STORE_KEY`: Store key (default: "slots")
    /// - `PIDWARDEN_OPTIMISTIC`: "true" to enable versioned writes
    pub fn from_env() -> Result<Self, ConfigError> {
        let owner_name = std::env::var("PIDWARDEN_OWNER").unwrap_or_default();
        let target_slots = parse_env("PIDWARDEN_SLOTS")?.unwrap_or(1);

        let mut config = Self::new(owner_name, target_slots);

        if let Some(secs) = parse_env::<u64>("PIDWARDEN_STALE_AFTER_SECS")? {
            config = config.with_stale_after(Duration::from_secs(secs));
        }
        if let Ok(key) = std::env::var("PIDWARDEN_STORE_KEY") {
            config = config.with_store_key(key);
        }
        if std::env::var("PIDWARDEN_OPTIMISTIC")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            config = config.with_concurrency(ConcurrencyMode::Optimistic);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the stale threshold
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Set the store key
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }

    /// Set the concurrency mode
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_name.trim().is_empty() {
            return Err(ConfigError::EmptyOwnerName);
        }
        if self.target_slots < 0 {
            return Err(ConfigError::NegativeTarget(self.target_slots));
        }
        if self.store_key.is_empty() {
            return Err(ConfigError::EmptyStoreKey);
        }
        Ok(())
    }

    /// Target slot count as an unsigned size
    ///
    /// Only meaningful after [`validate`](Self::validate) has passed.
    pub fn target(&self) -> usize {
        usize::try_from(self.target_slots).unwrap_or(0)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
        },
        Err(_) => Ok(None),
    }
}

/// Serde support for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerManagerConfig::new("mailer", 5);
        assert_eq!(config.owner_name, "mailer");
        assert_eq!(config.target(), 5);
        assert_eq!(config.stale_after, Duration::from_secs(1800));
        assert_eq!(config.store_key, "slots");
        assert_eq!(config.concurrency, ConcurrencyMode::LastWriterWins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerManagerConfig::new("mailer", 2)
            .with_stale_after(Duration::from_secs(60))
            .with_store_key("mailer-slots")
            .with_concurrency(ConcurrencyMode::Optimistic);

        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.store_key, "mailer-slots");
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
    }

    #[test]
    fn test_rejects_empty_owner() {
        assert_eq!(
            WorkerManagerConfig::new("", 1).validate(),
            Err(ConfigError::EmptyOwnerName)
        );
        assert_eq!(
            WorkerManagerConfig::new("   ", 1).validate(),
            Err(ConfigError::EmptyOwnerName)
        );
    }

    #[test]
    fn test_rejects_negative_target() {
        assert_eq!(
            WorkerManagerConfig::new("mailer", -1).validate(),
            Err(ConfigError::NegativeTarget(-1))
        );
    }

    #[test]
    fn test_zero_target_is_valid() {
        let config = WorkerManagerConfig::new("mailer", 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.target(), 0);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = WorkerManagerConfig::new("mailer", 3).with_stale_after(Duration::from_secs(90));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["stale_after"], 90);
        assert_eq!(json["concurrency"], "last_writer_wins");

        let back: WorkerManagerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.stale_after, Duration::from_secs(90));
        assert_eq!(back.target_slots, 3);
    }

    // Environment variables are process-wide, so every from_env case lives in
    // this one test.
    #[test]
    fn test_from_env() {
        const VARS: [&str; 5] = [
            "PIDWARDEN_OWNER",
            "PIDWARDEN_SLOTS",
            "PIDWARDEN_STALE_AFTER_SECS",
            "PIDWARDEN_STORE_KEY",
            "PIDWARDEN_OPTIMISTIC",
        ];
        let clear = || VARS.iter().for_each(|v| std::env::remove_var(v));

        clear();
        assert_eq!(
            WorkerManagerConfig::from_env().unwrap_err(),
            ConfigError::EmptyOwnerName
        );

        std::env::set_var("PIDWARDEN_OWNER", "mailer");
        let defaults = WorkerManagerConfig::from_env().unwrap();
        assert_eq!(defaults.target_slots, 1);
        assert_eq!(defaults.stale_after, DEFAULT_STALE_AFTER);
        assert_eq!(defaults.store_key, SLOTS_KEY);
        assert_eq!(defaults.concurrency, ConcurrencyMode::LastWriterWins);

        std::env::set_var("PIDWARDEN_SLOTS", " 4 ");
        std::env::set_var("PIDWARDEN_STALE_AFTER_SECS", "90");
        std::env::set_var("PIDWARDEN_STORE_KEY", "mailer-slots");
        std::env::set_var("PIDWARDEN_OPTIMISTIC", "TRUE");
        let config = WorkerManagerConfig::from_env().unwrap();
        assert_eq!(config.target_slots, 4);
        assert_eq!(config.stale_after, Duration::from_secs(90));
        assert_eq!(config.store_key, "mailer-slots");
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);

        std::env::set_var("PIDWARDEN_OPTIMISTIC", "no");
        assert_eq!(
            WorkerManagerConfig::from_env().unwrap().concurrency,
            ConcurrencyMode::LastWriterWins
        );

        std::env::set_var("PIDWARDEN_SLOTS", "four");
        assert_eq!(
            WorkerManagerConfig::from_env().unwrap_err(),
            ConfigError::InvalidEnv {
                name: "PIDWARDEN_SLOTS".to_string(),
                value: "four".to_string(),
            }
        );

        std::env::set_var("PIDWARDEN_SLOTS", "-3");
        assert_eq!(
            WorkerManagerConfig::from_env().unwrap_err(),
            ConfigError::NegativeTarget(-3)
        );

        std::env::set_var("PIDWARDEN_SLOTS", "2");
        std::env::set_var("PIDWARDEN_STALE_AFTER_SECS", "-5");
        assert!(matches!(
            WorkerManagerConfig::from_env(),
            Err(ConfigError::InvalidEnv { name, .. }) if name == "PIDWARDEN_STALE_AFTER_SECS"
        ));

        clear();
    }
}
