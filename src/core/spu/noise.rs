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

//! SPU2 noise generator
//!
//! Each core has one noise source shared by all of its noise-selected voices.
//! The 6-bit noise clock from ATTR selects a period (`clock >> 2`) and a
//! fractional adjustment (`clock & 3`); every time the counter passes the period
//! a feedback bit is shifted into the value register.

use serde::{Deserialize, Serialize};

/// Feedback bit indexed by bits 10-15 of the current value
const NOISE_ADD: [u32; 64] = [
    1, 0, 0, 1, 0, 1, 1, 0, //
    1, 0, 0, 1, 0, 1, 1, 0, //
    1, 0, 0, 1, 0, 1, 1, 0, //
    1, 0, 0, 1, 0, 1, 1, 0, //
    0, 1, 1, 0, 1, 0, 0, 1, //
    0, 1, 1, 0, 1, 0, 0, 1, //
    0, 1, 1, 0, 1, 0, 0, 1, //
    0, 1, 1, 0, 1, 0, 0, 1, //
];

/// Fractional counter increments per clock step
const FREQ_ADD: [u32; 5] = [0, 84, 140, 180, 210];

/// Noise generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoiseGenerator {
    /// Noise clock (ATTR bits 8-13)
    clock: u8,

    count: u32,

    value: u32,
}

impl NoiseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the 6-bit noise clock
    pub fn set_clock(&mut self, clock: u8) {
        self.clock = clock & 0x3F;
    }

    pub fn clock(&self) -> u8 {
        self.clock
    }

    /// Current noise sample
    #[inline(always)]
    pub fn level(&self) -> i16 {
        self.value as i16
    }

    /// Advance the generator by one sample tick
    pub fn run(&mut self) {
        let period = (0x8000u32 >> (self.clock >> 2)) << 16;
        let add = FREQ_ADD[(self.clock & 3) as usize];

        self.count = self.count.wrapping_add(0x10000 + add);
        if (self.count & 0xFFFF) >= add {
            self.count = self.count.wrapping_add(0x10000 - add);
        }

        if self.count >= period {
            while self.count >= period {
                self.count -= period;
            }
            self.value = (self.value << 1) | NOISE_ADD[((self.value >> 10) & 63) as usize];
        }
    }
}
