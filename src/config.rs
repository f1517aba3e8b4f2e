//! Pane configuration and the fatal configuration-error taxonomy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Order in which a session's slots are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Strict left-to-right; for monotonic scrubbing/playback.
    Linear,
    /// Evenly-spaced preview first, detail fills in between loaded points.
    Fill,
}

impl FromStr for LoadStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(LoadStrategy::Linear),
            "fill" => Ok(LoadStrategy::Fill),
            other => Err(ConfigError::InvalidStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStrategy::Linear => write!(f, "linear"),
            LoadStrategy::Fill => write!(f, "fill"),
        }
    }
}

fn default_delay_ms() -> u64 {
    DEFAULT_INTER_FETCH_DELAY_MS
}

fn default_strategy() -> LoadStrategy {
    LoadStrategy::Fill
}

/// Spacing between consecutive fetches, in milliseconds. Set very high in
/// diagnostics to make accidental duplicate fetch chains visible.
pub const DEFAULT_INTER_FETCH_DELAY_MS: u64 = 5;

/// Configuration recognized by a pane at construction/reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneConfig {
    /// Number of slots to fill per session. Must be > 0.
    pub capacity: usize,
    /// Directory the frame names resolve against.
    pub base_path: PathBuf,
    /// Optional low-resolution tier directory (thumbnail strip).
    #[serde(default)]
    pub thumbs_path: Option<PathBuf>,
    #[serde(default = "default_strategy")]
    pub strategy: LoadStrategy,
    #[serde(default = "default_delay_ms")]
    pub inter_fetch_delay_ms: u64,
}

impl PaneConfig {
    pub fn new(capacity: usize, base_path: impl Into<PathBuf>) -> Self {
        Self {
            capacity,
            base_path: base_path.into(),
            thumbs_path: None,
            strategy: default_strategy(),
            inter_fetch_delay_ms: default_delay_ms(),
        }
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_thumbs(mut self, path: impl Into<PathBuf>) -> Self {
        self.thumbs_path = Some(path.into());
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.inter_fetch_delay_ms = ms;
        self
    }

    /// Full validation before any state is built from this config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Fatal configuration errors: propagate immediately, never retried, no
/// partial state mutation before validation completes.
#[derive(Debug)]
pub enum ConfigError {
    EmptyFrameList,
    TimestampMismatch { names: usize, timestamps: usize },
    ZeroCapacity,
    InvalidStrategy(String),
    SlotOutOfRange { slot: usize, capacity: usize },
    UnknownPane(usize),
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyFrameList => write!(f, "Frame name list is empty"),
            ConfigError::TimestampMismatch { names, timestamps } => write!(
                f,
                "Frame/timestamp lists differ in length: {} names vs {} timestamps",
                names, timestamps
            ),
            ConfigError::ZeroCapacity => write!(f, "Capacity must be a positive integer"),
            ConfigError::InvalidStrategy(s) => write!(f, "Invalid load strategy: {:?}", s),
            ConfigError::SlotOutOfRange { slot, capacity } => {
                write!(f, "Slot {} out of range 0..{}", slot, capacity)
            }
            ConfigError::UnknownPane(id) => write!(f, "No pane registered with id {}", id),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
