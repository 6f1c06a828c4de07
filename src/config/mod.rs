//! # Cascade Core Configuration
//!
//! Layered configuration for the cascade engine, the messaging fabric client and
//! logging. Values come from compiled defaults, then `config/cascade.toml`, then
//! `config/cascade.{environment}.toml`, then `CASCADE_*` environment variables
//! (nested keys separated by `__`, e.g. `CASCADE_MESSAGING__REPLY_TIMEOUT_MS`).
//!
//! ```rust,no_run
//! use cascade_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let teardown = manager.config().completion.host_teardown_timeout();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::error::{CascadeError, CascadeResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

/// Root configuration structure mirroring cascade.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Bounded waits used when bridging async replies into sync call sites
    pub completion: CompletionConfig,

    /// Messaging fabric client settings
    pub messaging: MessagingConfig,

    /// Structured logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Default bound for `sync_cascade` and other blocking bridges
    pub default_timeout_ms: u64,
    /// Bound for host teardown batches (VM destroy / data volume delete)
    pub host_teardown_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Number of logical workers per service; resource uuids hash onto these
    pub partitions_per_service: u32,
    /// Bound for a single reply before it is reported as a timeout failure
    pub reply_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to the environment default
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            completion: CompletionConfig::default(),
            messaging: MessagingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            host_teardown_timeout_ms: 15 * 60 * 1000,
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            partitions_per_service: 16,
            reply_timeout_ms: 60_000,
        }
    }
}

impl CompletionConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn host_teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.host_teardown_timeout_ms)
    }
}

impl MessagingConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl CascadeConfig {
    /// Reject values that would make waits or routing meaningless
    pub fn validate(&self) -> CascadeResult<()> {
        if self.messaging.partitions_per_service == 0 {
            return Err(CascadeError::configuration(
                "messaging.partitions_per_service",
                "must be greater than zero",
            ));
        }
        if self.messaging.reply_timeout_ms == 0 {
            return Err(CascadeError::configuration(
                "messaging.reply_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.completion.default_timeout_ms == 0 {
            return Err(CascadeError::configuration(
                "completion.default_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.completion.host_teardown_timeout_ms == 0 {
            return Err(CascadeError::configuration(
                "completion.host_teardown_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
