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

//! Error types for the emulator
//!
//! Register access never fails: unmapped registers are logged and ignored.
//! Errors only come from the edges of the crate (files, save states,
//! audio devices).

use thiserror::Error;

/// Result type alias for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Emulator error types
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Save state could not be encoded
    #[error("Save state encode error: {0}")]
    SaveStateEncode(#[from] bincode::error::EncodeError),

    /// Save state could not be decoded
    #[error("Save state decode error: {0}")]
    SaveStateDecode(#[from] bincode::error::DecodeError),

    /// State report serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WAV output failed
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Host audio device failure
    #[error("Audio device error: {0}")]
    Audio(String),

    /// Sample file is malformed
    #[error("Invalid sample file: {0}")]
    InvalidSampleFile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EmulatorError::InvalidSampleFile("missing VAGp header".to_string());
        assert_eq!(err.to_string(), "Invalid sample file: missing VAGp header");

        let err: EmulatorError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(matches!(err, EmulatorError::Io(_)));
    }
}
