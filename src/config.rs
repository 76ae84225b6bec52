use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub merge: MergeSettings,
    pub ring: RingSettings,
    pub driver: DriverSettings,
    pub session: SessionSettings,
}

/// Merge engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MergeSettings {
    /// Mismatch budget along any single alignment path.
    pub allowed_gaps: usize,
    /// Entries with occurrences at or below this value are pruned.
    pub prune_threshold: i32,
    /// Also decrement the transcript side when a gap-interior conflict fires.
    pub decrement_on_conflict: bool,
    /// Apply the merge rules to the region before the first alignment anchor.
    pub revise_leading_gap: bool,
}

/// Ingress ring configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RingSettings {
    pub capacity: usize,
    /// Minimum seconds between repeated saturation warnings.
    pub warn_interval_secs: u64,
}

/// Merge driver configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverSettings {
    /// Interval between merge cycles in milliseconds.
    pub interval_ms: u64,
}

/// Inference session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Ring polling interval while waiting for data, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            allowed_gaps: 4,
            prune_threshold: -1,
            decrement_on_conflict: false,
            revise_leading_gap: false,
        }
    }
}

impl Default for RingSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            warn_interval_secs: 5,
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 15,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIVENER_ALLOWED_GAPS → merge.allowed_gaps
    /// - SCRIVENER_RING_CAPACITY → ring.capacity
    /// - SCRIVENER_DRIVER_INTERVAL_MS → driver.interval_ms
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(gaps) = std::env::var("SCRIVENER_ALLOWED_GAPS")
            && let Ok(gaps) = gaps.parse::<usize>()
        {
            self.merge.allowed_gaps = gaps;
        }

        if let Ok(capacity) = std::env::var("SCRIVENER_RING_CAPACITY")
            && let Ok(capacity) = capacity.parse::<usize>()
            && capacity > 0
        {
            self.ring.capacity = capacity;
        }

        if let Ok(interval) = std::env::var("SCRIVENER_DRIVER_INTERVAL_MS")
            && let Ok(interval) = interval.parse::<u64>()
            && interval > 0
        {
            self.driver.interval_ms = interval;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scrivener/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scrivener")
            .join("config.toml")
    }
}
