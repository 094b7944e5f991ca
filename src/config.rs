use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::{EngineError, Tile, MAX_SIZE};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid board settings: {0}")]
    Invalid(#[from] EngineError),
}

/// Board shape and win condition, fixed for the lifetime of an engine.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "defaults::size")]
    pub size: usize,
    #[serde(default = "defaults::win_threshold")]
    pub win_threshold: Tile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { size: defaults::size(), win_threshold: defaults::win_threshold() }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(2..=MAX_SIZE).contains(&self.size) {
            return Err(EngineError::InvalidSize(self.size));
        }
        if self.win_threshold < 4 || !self.win_threshold.is_power_of_two() {
            return Err(EngineError::InvalidWinThreshold(self.win_threshold));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Storage {
    /// Where the best score is kept between runs.
    #[serde(default = "defaults::best_score_file")]
    pub best_score_file: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self { best_score_file: defaults::best_score_file() }
    }
}

/// Top-level settings file for the terminal front end.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub board: EngineConfig,
    #[serde(default)]
    pub storage: Storage,
}

impl Config {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = std::fs::File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::parse(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents)?;
        cfg.board.validate()?;
        Ok(cfg)
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::engine::Tile;

    pub fn size() -> usize { 4 }
    pub fn win_threshold() -> Tile { 2048 }
    pub fn best_score_file() -> PathBuf { PathBuf::from(".merge2048_best") }
}
