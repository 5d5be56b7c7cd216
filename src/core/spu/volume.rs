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

//! Volume registers with optional sweep
//!
//! Used for voice VOLL/VOLR and the core master volume (MVOL).
//!
//! | Bit   | Fixed mode (bit 15 = 0) | Sweep mode (bit 15 = 1) |
//! |-------|-------------------------|-------------------------|
//! | 14    | volume / 2              | exponential             |
//! | 13    | volume / 2              | decrease                |
//! | 12    | volume / 2              | negative phase          |
//! | 2-6   | volume / 2              | shift                   |
//! | 0-1   | volume / 2              | step                    |

use super::adsr::{EnvelopeRate, MAX_LEVEL};
use serde::{Deserialize, Serialize};

/// One volume register and its current (possibly sweeping) level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Volume {
    reg: u16,
    level: i16,
    fraction: u32,
}

impl Volume {
    /// Register value as last written
    pub fn register(&self) -> u16 {
        self.reg
    }

    /// Current volume level
    #[inline(always)]
    pub fn level(&self) -> i16 {
        self.level
    }

    /// Write the volume register
    ///
    /// Fixed volumes take effect immediately; sweeps start from the current level.
    pub fn set(&mut self, value: u16) {
        self.reg = value;
        if !self.is_sweep() {
            self.level = (value << 1) as i16;
            self.fraction = 0;
        }
    }

    /// Override the current level (VOLX writes on hardware that allows it)
    pub fn set_level(&mut self, level: i16) {
        self.level = level;
        self.fraction = 0;
    }

    pub fn is_sweep(&self) -> bool {
        self.reg & 0x8000 != 0
    }

    fn rate(&self) -> EnvelopeRate {
        EnvelopeRate {
            shift: ((self.reg >> 2) & 0x1F) as u8,
            step: (self.reg & 3) as u8,
            exponential: self.reg & (1 << 14) != 0,
            decreasing: self.reg & (1 << 13) != 0,
        }
    }

    /// Advance the sweep by one tick
    pub fn run(&mut self) {
        if !self.is_sweep() {
            return;
        }

        let magnitude = (self.level as i32).abs().min(MAX_LEVEL);
        let next = self.rate().apply(magnitude, &mut self.fraction);
        if !(0..=MAX_LEVEL).contains(&next) {
            self.fraction = 0;
        }
        let next = next.clamp(0, MAX_LEVEL) as i16;

        self.level = if self.reg & (1 << 12) != 0 { -next } else { next };
    }
}

/// Left/right volume pair
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VolumePair {
    pub left: Volume,
    pub right: Volume,
}

impl VolumePair {
    pub fn run(&mut self) {
        self.left.run();
        self.right.run();
    }
}
