// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Player configuration
//!
//! Settings for the `spu2rx-play` binary, stored as TOML. Missing keys fall
//! back to their defaults, so a config file only needs the values it changes:
//!
//! ```toml
//! log_level = "debug"
//!
//! [render]
//! seconds = 2.5
//! wav_path = "out.wav"
//!
//! [output]
//! play = true
//! recover_threshold = 2048
//! ```

use crate::core::error::Result;
use crate::core::spu::output::DEFAULT_RECOVER_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SPU2RX_CONFIG";

/// Config file used when neither the CLI nor the environment names one
pub const DEFAULT_CONFIG_FILE: &str = "spu2rx.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub render: RenderConfig,
    pub output: OutputConfig,
}

/// Offline rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Length of audio to generate
    pub seconds: f64,
    /// WAV destination
    pub wav_path: PathBuf,
    /// Optional JSON state report destination
    pub state_report: Option<PathBuf>,
}

/// Live playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Stream the rendered audio to the default output device
    pub play: bool,
    /// Frames buffered before playback resumes after an underrun
    pub recover_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            render: RenderConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            seconds: 2.0,
            wav_path: PathBuf::from("spu2rx.wav"),
            state_report: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            play: false,
            recover_threshold: DEFAULT_RECOVER_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Resolve and load the active configuration
    ///
    /// An explicit path must exist. Otherwise `SPU2RX_CONFIG` is tried,
    /// then `spu2rx.toml` in the working directory, then the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() {
            log::info!("Using config {}", path.display());
            Self::load(&path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::EmulatorError;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[render]\nseconds = 0.5\n").unwrap();
        assert_eq!(config.render.seconds, 0.5);
        assert_eq!(config.render.wav_path, PathBuf::from("spu2rx.wav"));
        assert_eq!(config.output.recover_threshold, 0x1000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spu2rx.toml");

        let mut config = Config::default();
        config.output.play = true;
        config.render.state_report = Some(PathBuf::from("report.json"));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "render = [").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(EmulatorError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::discover(Some(&missing)),
            Err(EmulatorError::Io(_))
        ));
    }
}
