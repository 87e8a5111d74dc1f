use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// How characters advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMode {
    /// Characters move one tile per `turn()`; `tick()` never moves them.
    Turn,
    /// Characters glide from tile to tile over time.
    #[default]
    Tile,
    /// Characters slide freely in pixel space.
    Notile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Quiet,
    Normal,
    #[default]
    Verbose,
}

impl Verbosity {
    /// Default `tracing` filter directive for this level.
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConf {
    pub engine: EngineConf,
    pub window: WindowConf,
    pub audio: AudioConf,
    pub cache: CacheConf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConf {
    pub verbosity: Verbosity,
    pub move_mode: MoveMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConf {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConf {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fullscreen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConf {
    pub musicvolume: u8,
    pub soundvolume: u8,
}

impl Default for AudioConf {
    fn default() -> Self {
        Self {
            musicvolume: 100,
            soundvolume: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConf {
    /// Seconds an unused resource stays cached.
    pub ttl: u64,
}

impl Default for CacheConf {
    fn default() -> Self {
        Self { ttl: 300 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read client config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse client config: {source}")]
    Parse {
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
    #[error("client config value {field} = {value} is out of range 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

impl ClientConf {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Like [`ClientConf::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let deserializer = &mut serde_json::Deserializer::from_str(raw);
        let conf: Self = serde_path_to_error::deserialize(deserializer)
            .map_err(|source| ConfigError::Parse { source })?;
        conf.validate()?;
        Ok(conf)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("audio.musicvolume", self.audio.musicvolume),
            ("audio.soundvolume", self.audio.soundvolume),
        ] {
            if value > 100 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: u64::from(value),
                    max: 100,
                });
            }
        }
        Ok(())
    }
}
