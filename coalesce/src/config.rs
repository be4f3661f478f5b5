// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! TOML configuration for the buffers
//!
//! Every key is optional. A missing section or key keeps its default:
//!
//! ```
//! use std::time::Duration;
//! use coalesce::Config;
//!
//! let config = Config::from_toml_str(r#"
//!     [store]
//!     granularity_ms = 60000
//! "#).unwrap();
//! assert_eq!(config.store.granularity().as_millis(), 60_000);
//! assert_eq!(config.store.heartbeat_interval(), Duration::from_secs(10));
//! assert_eq!(config.flush.granularity().as_millis(), 120_000);
//! ```

use std::{fmt, str::FromStr, time::Duration};

use coalesce_buffer::{
    DataStore, FlushBuffer, StoreBuffer, Transport, flush::FlushBufferBuilder,
    store::StoreBufferBuilder,
};
use coalesce_core::Granularity;
use serde::Deserialize;

const DEFAULT_GRANULARITY_MS: i64 = Granularity::DEFAULT.as_millis();
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Configuration for both buffers
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The `[store]` section
    pub store: StoreConfig,
    /// The `[flush]` section
    pub flush: FlushConfig,
}

/// Configuration of a [`StoreBuffer`]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Bucket width in milliseconds
    pub granularity_ms: i64,
    /// How often the heartbeat checks whether the open bucket has passed
    pub heartbeat_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            granularity_ms: DEFAULT_GRANULARITY_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl StoreConfig {
    /// The configured bucket width, or the default if it is invalid
    pub fn granularity(&self) -> Granularity {
        Granularity::from_millis(self.granularity_ms).unwrap_or_default()
    }

    /// Interval to drive [`StoreBuffer::heartbeat`] at
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// A [`StoreBuffer`] builder for `store` with this configuration applied
    pub fn store_buffer<D: DataStore>(&self, store: D) -> StoreBufferBuilder<D> {
        StoreBuffer::builder()
            .data_store(store)
            .granularity(self.granularity())
    }
}

/// Configuration of a [`FlushBuffer`]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlushConfig {
    /// Bucket width in milliseconds, also the flush interval
    pub granularity_ms: i64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            granularity_ms: DEFAULT_GRANULARITY_MS,
        }
    }
}

impl FlushConfig {
    /// The configured bucket width, or the default if it is invalid
    pub fn granularity(&self) -> Granularity {
        Granularity::from_millis(self.granularity_ms).unwrap_or_default()
    }

    /// Interval to drive [`FlushBuffer::flush`] at: one bucket width
    pub fn interval(&self) -> Duration {
        self.granularity().as_duration()
    }

    /// A [`FlushBuffer`] builder for `transport` with this configuration applied
    pub fn flush_buffer<T: Transport>(&self, transport: T) -> FlushBufferBuilder<T> {
        FlushBuffer::builder()
            .transport(transport)
            .granularity(self.granularity())
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        tracing::debug!(?config, "loaded buffer configuration");
        Ok(config)
    }

    /// Check that every width and interval is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, granularity_ms) in [
            ("store", self.store.granularity_ms),
            ("flush", self.flush.granularity_ms),
        ] {
            if granularity_ms <= 0 {
                return Err(ConfigError::InvalidGranularity {
                    section,
                    value: granularity_ms,
                });
            }
        }
        if self.store.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval);
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}

/// Errors produced while loading a [`Config`]
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The document is not valid TOML, or does not match the expected shape
    Parse(toml::de::Error),
    /// A `granularity_ms` is zero or negative
    InvalidGranularity {
        /// Section the value was found in
        section: &'static str,
        /// The configured value
        value: i64,
    },
    /// `store.heartbeat_interval_ms` is zero
    InvalidHeartbeatInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid configuration: {err}"),
            Self::InvalidGranularity { section, value } => {
                write!(f, "{section}.granularity_ms must be positive, got {value}")
            }
            Self::InvalidHeartbeatInterval => {
                f.write_str("store.heartbeat_interval_ms must not be zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}
