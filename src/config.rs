use serde::{Deserialize, Serialize};

use crate::error::{FpError, Result};

/// Maximum item key length, in bytes, of a wire element record.
pub const DEFAULT_MAX_KEY_LEN: usize = 128;

/// Run-wide settings. Every worker must be started with the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of cooperating workers.
    pub world_size: usize,
    /// Threads per worker for sorting and local tree building.
    pub num_threads: usize,
    /// Items with a global support below this are dropped.
    pub min_support: u64,
    pub max_key_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            world_size: 1,
            num_threads: 1,
            min_support: 1,
            max_key_len: DEFAULT_MAX_KEY_LEN,
        }
    }
}

impl Config {
    /// Parses a JSON document, filling omitted fields with their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpmerge::Config;
    /// let config = Config::from_json(r#"{ "world_size": 4, "min_support": 3 }"#).unwrap();
    /// assert_eq!(config.world_size, 4);
    /// assert_eq!(config.num_threads, 1);
    /// assert_eq!(config.min_support, 3);
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_world_size(mut self, world_size: usize) -> Self {
        self.world_size = world_size;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_min_support(mut self, min_support: u64) -> Self {
        self.min_support = min_support;
        self
    }

    pub fn with_max_key_len(mut self, max_key_len: usize) -> Self {
        self.max_key_len = max_key_len;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(FpError::Config("world_size must be at least 1".into()));
        }
        if self.num_threads == 0 {
            return Err(FpError::Config("num_threads must be at least 1".into()));
        }
        if self.max_key_len == 0 {
            return Err(FpError::Config("max_key_len must be at least 1".into()));
        }
        Ok(())
    }
}
