//! Configuration for a stage
//!
//! Explicit defaults, validation, reasonable limits.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::supervision::SupervisionStrategy;

/// Main configuration for a stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name, used as the root logging scope
    #[serde(default)]
    pub name: Option<String>,

    /// Directory configuration
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Dead-letter configuration
    #[serde(default)]
    pub dead_letters: DeadLettersConfig,

    /// Default strategy for actors created without a supervisor key
    #[serde(default)]
    pub default_strategy: SupervisionStrategy,
}

impl StageConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.directory.validate()?;
        self.dead_letters.validate()?;
        Ok(())
    }
}

/// Directory shard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Number of shard buckets
    #[serde(default = "default_buckets")]
    pub buckets: usize,
}

fn default_buckets() -> usize {
    DIRECTORY_BUCKETS_COUNT_DEFAULT
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
        }
    }
}

impl DirectoryConfig {
    /// Preset for small stages
    pub fn small() -> Self {
        Self {
            buckets: DIRECTORY_BUCKETS_COUNT_SMALL,
        }
    }

    /// Preset for high-capacity stages
    pub fn large() -> Self {
        Self {
            buckets: DIRECTORY_BUCKETS_COUNT_LARGE,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(Error::InvalidConfiguration {
                field: "directory.buckets".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.buckets > DIRECTORY_BUCKETS_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "directory.buckets".into(),
                reason: format!("exceeds limit {}", DIRECTORY_BUCKETS_COUNT_MAX),
            });
        }
        Ok(())
    }
}

/// Dead-letter sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLettersConfig {
    /// Number of recent records retained for diagnostics
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_recent_limit() -> usize {
    DEAD_LETTERS_RECENT_COUNT_MAX
}

impl Default for DeadLettersConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

impl DeadLettersConfig {
    fn validate(&self) -> Result<()> {
        if self.recent_limit == 0 {
            return Err(Error::InvalidConfiguration {
                field: "dead_letters.recent_limit".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
