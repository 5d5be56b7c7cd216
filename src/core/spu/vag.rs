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

//! ADPCM sample files
//!
//! Loads either a VAG file or a bare stream of 16-byte ADPCM blocks and
//! turns it into sound RAM words.
//!
//! VAG header (48 bytes, big-endian fields):
//!
//! | Offset | Size | Field                 |
//! |--------|------|-----------------------|
//! | 0x00   | 4    | magic `VAGp`          |
//! | 0x04   | 4    | version               |
//! | 0x0C   | 4    | data size in bytes    |
//! | 0x10   | 4    | sample rate           |
//! | 0x20   | 16   | name (NUL padded)     |

use super::SAMPLE_RATE;
use crate::core::error::{EmulatorError, Result};
use std::path::Path;

/// Size of the VAG header
pub const VAG_HEADER_SIZE: usize = 48;

/// Bytes per ADPCM block
pub const BLOCK_BYTES: usize = 16;

const VAG_MAGIC: &[u8; 4] = b"VAGp";

/// Decoded sample file, ready for upload to sound RAM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdpcmSample {
    pub name: String,
    pub sample_rate: u32,
    /// ADPCM blocks as little-endian words
    pub data: Vec<u16>,
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn blocks_to_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

impl AdpcmSample {
    /// Load a file, detecting VAG by its magic
    ///
    /// Files without the magic are treated as raw ADPCM blocks at `raw_rate`.
    pub fn load<P: AsRef<Path>>(path: P, raw_rate: u32) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let sample = if bytes.starts_with(VAG_MAGIC) {
            Self::parse_vag(&bytes)?
        } else {
            Self::from_raw(&bytes, raw_rate)?
        };

        log::info!(
            "Loaded sample '{}' from {}: {} blocks @ {} Hz",
            sample.name,
            path.as_ref().display(),
            sample.blocks(),
            sample.sample_rate
        );
        Ok(sample)
    }

    /// Parse a complete VAG file image
    pub fn parse_vag(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < VAG_HEADER_SIZE || !bytes.starts_with(VAG_MAGIC) {
            return Err(EmulatorError::InvalidSampleFile(
                "missing VAGp header".to_string(),
            ));
        }

        let data_size = be_u32(bytes, 0x0C) as usize;
        let sample_rate = be_u32(bytes, 0x10);
        if sample_rate == 0 {
            return Err(EmulatorError::InvalidSampleFile(
                "sample rate is zero".to_string(),
            ));
        }

        let name_field = &bytes[0x20..0x30];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(16);
        let name = String::from_utf8_lossy(&name_field[..name_len]).into_owned();

        let body = &bytes[VAG_HEADER_SIZE..];
        if data_size > body.len() {
            log::warn!(
                "VAG header claims {} bytes but only {} follow, truncating",
                data_size,
                body.len()
            );
        }
        let body = &body[..data_size.min(body.len())];
        let usable = body.len() - body.len() % BLOCK_BYTES;
        if usable == 0 {
            return Err(EmulatorError::InvalidSampleFile(
                "VAG file holds no complete ADPCM block".to_string(),
            ));
        }

        Ok(Self {
            name,
            sample_rate,
            data: blocks_to_words(&body[..usable]),
        })
    }

    /// Wrap raw ADPCM blocks
    pub fn from_raw(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % BLOCK_BYTES != 0 {
            return Err(EmulatorError::InvalidSampleFile(format!(
                "raw ADPCM length {} is not a positive multiple of {}",
                bytes.len(),
                BLOCK_BYTES
            )));
        }

        Ok(Self {
            name: String::new(),
            sample_rate,
            data: blocks_to_words(bytes),
        })
    }

    /// Number of 16-byte ADPCM blocks
    pub fn blocks(&self) -> usize {
        self.data.len() * 2 / BLOCK_BYTES
    }

    /// Voice pitch that plays the sample at its native rate
    pub fn pitch(&self) -> u16 {
        let pitch = self.sample_rate as u64 * 0x1000 / SAMPLE_RATE as u64;
        pitch.min(0x3FFF) as u16
    }
}
