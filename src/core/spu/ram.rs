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

//! Sound RAM shared by both SPU2 cores
//!
//! The SPU2 has 2MB of local memory. Every register and internal cursor
//! addresses it in 16-bit words, so the RAM is stored as 1M halfwords and
//! all addresses are masked to 20 bits.

use serde::{Deserialize, Serialize};

/// Number of 16-bit words in sound RAM
pub const RAM_WORDS: usize = 1024 * 1024;

/// Mask applied to every word address
pub const ADDRESS_MASK: u32 = 0xF_FFFF;

/// 2MB sound RAM, word addressed
#[derive(Clone, Serialize, Deserialize)]
pub struct SoundRam {
    words: Vec<u16>,
}

impl SoundRam {
    /// Create a zero-filled sound RAM
    pub fn new() -> Self {
        Self {
            words: vec![0; RAM_WORDS],
        }
    }

    /// Read a word, wrapping the address at the 20-bit boundary
    #[inline(always)]
    pub fn read(&self, addr: u32) -> u16 {
        self.words[(addr & ADDRESS_MASK) as usize]
    }

    /// Write a word, wrapping the address at the 20-bit boundary
    #[inline(always)]
    pub fn write(&mut self, addr: u32, value: u16) {
        self.words[(addr & ADDRESS_MASK) as usize] = value;
    }

    /// Copy a block of words into RAM starting at `addr`
    ///
    /// The destination wraps around the end of RAM like the hardware cursor does.
    pub fn load(&mut self, addr: u32, data: &[u16]) {
        for (i, &word) in data.iter().enumerate() {
            self.write(addr.wrapping_add(i as u32), word);
        }
    }

    /// Borrow the whole RAM contents
    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }
}

impl Default for SoundRam {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoundRam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundRam")
            .field("words", &self.words.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_address_wraps() {
        let mut ram = SoundRam::new();
        ram.write(0x10_0005, 0xBEEF);
        assert_eq!(ram.read(0x5), 0xBEEF, "Address must wrap at 20 bits");
    }

    #[test]
    fn test_ram_load_wraps_at_end() {
        let mut ram = SoundRam::new();
        ram.load(ADDRESS_MASK, &[1, 2, 3]);
        assert_eq!(ram.read(ADDRESS_MASK), 1);
        assert_eq!(ram.read(0), 2);
        assert_eq!(ram.read(1), 3);
    }
}
