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

//! ADSR (Attack, Decay, Sustain, Release) envelope generator
//!
//! Controls the volume envelope for each voice over time.
//! The envelope has four active phases:
//! - Attack: Volume rises from 0 to maximum
//! - Decay: Volume falls from maximum to sustain level
//! - Sustain: Volume follows the sustain rate, never leaves this phase on its own
//! - Release: Volume falls from current level to 0, then the voice stops
//!
//! All phases share one step function (see [`EnvelopeRate`]). Small rates are
//! expressed as a fixed-point fraction so that slow envelopes still move by
//! whole steps after enough ticks.

use serde::{Deserialize, Serialize};

/// Fractional bits of the envelope accumulator
pub(crate) const FRACTION_BITS: u32 = 21;

const FRACTION_MASK: i64 = (1 << FRACTION_BITS) - 1;

/// Maximum envelope level
pub const MAX_LEVEL: i32 = 0x7FFF;

/// Rate parameters for one envelope step
///
/// Shared by the ADSR phases and the volume sweep registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeRate {
    pub shift: u8,
    pub step: u8,
    pub exponential: bool,
    pub decreasing: bool,
}

impl EnvelopeRate {
    /// Per-tick level delta in units of 1/2^21
    ///
    /// # Arguments
    ///
    /// * `level` - Current envelope level (0 to 0x7FFF)
    pub fn delta(self, level: i32) -> i64 {
        let base: i64 = if self.decreasing {
            -8 + self.step as i64
        } else {
            7 - self.step as i64
        };

        let mut shift = self.shift as u32;
        if self.exponential && !self.decreasing && level > 0x6000 {
            shift += 2;
        }

        let mut delta = if shift <= 11 {
            (base << (11 - shift)) << FRACTION_BITS
        } else {
            (base << FRACTION_BITS) >> (shift - 11)
        };

        if self.exponential && self.decreasing {
            delta = (delta * level as i64) >> 15;
        }

        delta
    }

    /// Apply one step to `level`, carrying the fractional part in `fraction`
    ///
    /// Returns the unclamped new level; the caller decides how to bound it.
    #[inline]
    pub(crate) fn apply(self, level: i32, fraction: &mut u32) -> i32 {
        let acc = ((level as i64) << FRACTION_BITS) + *fraction as i64 + self.delta(level);
        *fraction = (acc & FRACTION_MASK) as u32;
        (acc >> FRACTION_BITS) as i32
    }
}

/// ADSR register pair (ADSR1 in the low half, ADSR2 in the high half)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdsrReg(pub u32);

impl AdsrReg {
    pub fn adsr1(self) -> u16 {
        self.0 as u16
    }

    pub fn adsr2(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn set_adsr1(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF_0000) | value as u32;
    }

    pub fn set_adsr2(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF) | ((value as u32) << 16);
    }

    pub fn attack_exp(self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub fn attack_shift(self) -> u8 {
        ((self.0 >> 10) & 0x1F) as u8
    }

    pub fn attack_step(self) -> u8 {
        ((self.0 >> 8) & 3) as u8
    }

    pub fn decay_shift(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    pub fn sustain_level(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    pub fn sustain_exp(self) -> bool {
        self.0 & (1 << 31) != 0
    }

    pub fn sustain_decr(self) -> bool {
        self.0 & (1 << 30) != 0
    }

    pub fn sustain_shift(self) -> u8 {
        ((self.0 >> 24) & 0x1F) as u8
    }

    pub fn sustain_step(self) -> u8 {
        ((self.0 >> 22) & 3) as u8
    }

    pub fn release_exp(self) -> bool {
        self.0 & (1 << 21) != 0
    }

    pub fn release_shift(self) -> u8 {
        ((self.0 >> 16) & 0x1F) as u8
    }

    fn attack_rate(self) -> EnvelopeRate {
        EnvelopeRate {
            shift: self.attack_shift(),
            step: self.attack_step(),
            exponential: self.attack_exp(),
            decreasing: false,
        }
    }

    fn decay_rate(self) -> EnvelopeRate {
        EnvelopeRate {
            shift: self.decay_shift(),
            step: 0,
            exponential: true,
            decreasing: true,
        }
    }

    fn sustain_rate(self) -> EnvelopeRate {
        EnvelopeRate {
            shift: self.sustain_shift(),
            step: self.sustain_step(),
            exponential: self.sustain_exp(),
            decreasing: self.sustain_decr(),
        }
    }

    fn release_rate(self) -> EnvelopeRate {
        EnvelopeRate {
            shift: self.release_shift(),
            step: 0,
            exponential: self.release_exp(),
            decreasing: true,
        }
    }
}

/// ADSR envelope phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopePhase {
    /// Attack phase: volume rising
    Attack,
    /// Decay phase: volume falling to sustain level
    Decay,
    /// Sustain phase: volume follows the sustain rate
    Sustain,
    /// Release phase: volume falling to zero
    Release,
    /// Stopped: voice is silent
    Stopped,
}

/// ADSR envelope generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adsr {
    /// ADSR1/ADSR2 register pair
    pub reg: AdsrReg,

    phase: EnvelopePhase,

    /// Current envelope level (0-0x7FFF)
    level: i32,

    fraction: u32,
}

impl Adsr {
    pub fn new() -> Self {
        Self {
            reg: AdsrReg::default(),
            phase: EnvelopePhase::Stopped,
            level: 0,
            fraction: 0,
        }
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Current level, as exposed through ENVX
    #[inline(always)]
    pub fn level(&self) -> i16 {
        self.level as i16
    }

    /// ENVX write: overrides the level without changing phase
    pub fn set_level(&mut self, value: i16) {
        self.level = (value as i32).clamp(0, MAX_LEVEL);
        self.fraction = 0;
    }

    pub fn is_active(&self) -> bool {
        self.phase != EnvelopePhase::Stopped
    }

    /// Start the attack phase from silence (key on)
    pub fn attack(&mut self) {
        self.phase = EnvelopePhase::Attack;
        self.level = 0;
        self.fraction = 0;
    }

    /// Enter the release phase (key off)
    ///
    /// A stopped envelope stays stopped.
    pub fn release(&mut self) {
        if self.phase != EnvelopePhase::Stopped {
            self.phase = EnvelopePhase::Release;
            self.fraction = 0;
        }
    }

    /// Silence immediately
    pub fn stop(&mut self) {
        self.phase = EnvelopePhase::Stopped;
        self.level = 0;
        self.fraction = 0;
    }

    /// Advance the envelope by one sample tick
    ///
    /// # Returns
    ///
    /// `true` while the envelope is still producing output
    pub fn run(&mut self) -> bool {
        match self.phase {
            EnvelopePhase::Attack => self.run_attack(),
            EnvelopePhase::Decay => self.run_decay(),
            EnvelopePhase::Sustain => self.run_sustain(),
            EnvelopePhase::Release => self.run_release(),
            EnvelopePhase::Stopped => self.level = 0,
        }
        self.is_active()
    }

    fn run_attack(&mut self) {
        if self.level >= MAX_LEVEL {
            self.enter_decay();
            return;
        }

        let next = self.reg.attack_rate().apply(self.level, &mut self.fraction);
        if next >= MAX_LEVEL {
            self.level = MAX_LEVEL;
            self.enter_decay();
        } else {
            self.level = next.max(0);
        }
    }

    fn enter_decay(&mut self) {
        self.phase = EnvelopePhase::Decay;
        self.fraction = 0;
    }

    fn run_decay(&mut self) {
        let next = self.reg.decay_rate().apply(self.level, &mut self.fraction);
        if next <= 0 {
            self.level = 0;
            self.fraction = 0;
        } else {
            self.level = next;
        }

        if ((self.level >> 11) & 0xF) as u8 <= self.reg.sustain_level() {
            self.phase = EnvelopePhase::Sustain;
        }
    }

    fn run_sustain(&mut self) {
        let next = self.reg.sustain_rate().apply(self.level, &mut self.fraction);
        if !(0..=MAX_LEVEL).contains(&next) {
            self.fraction = 0;
        }
        self.level = next.clamp(0, MAX_LEVEL);
    }

    fn run_release(&mut self) {
        let next = self.reg.release_rate().apply(self.level, &mut self.fraction);
        if next <= 0 {
            self.stop();
        } else {
            self.level = next;
        }
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn adsr_with(adsr1: u16, adsr2: u16) -> Adsr {
        let mut adsr = Adsr::new();
        adsr.reg.set_adsr1(adsr1);
        adsr.reg.set_adsr2(adsr2);
        adsr
    }

    #[test]
    fn test_adsr_default_is_stopped() {
        let mut adsr = Adsr::new();
        assert_eq!(adsr.phase(), EnvelopePhase::Stopped);
        assert!(!adsr.run(), "A stopped envelope reports inactive");
        assert_eq!(adsr.level(), 0);
    }

    #[test]
    fn test_rate_delta_fast_and_slow() {
        let fast = EnvelopeRate {
            shift: 0,
            step: 0,
            exponential: false,
            decreasing: false,
        };
        assert_eq!(fast.delta(0) >> FRACTION_BITS, 7 << 11);

        let slow = EnvelopeRate {
            shift: 15,
            step: 0,
            exponential: false,
            decreasing: false,
        };
        // 7 / 16 of a level step per tick
        assert_eq!(slow.delta(0), (7 << FRACTION_BITS) >> 4);
    }

    #[test]
    fn test_rate_exponential_rise_slows_above_0x6000() {
        let rate = EnvelopeRate {
            shift: 4,
            step: 0,
            exponential: true,
            decreasing: false,
        };
        assert_eq!(rate.delta(0x6001), rate.delta(0x1000) >> 2);
    }

    #[test]
    fn test_slow_rate_accumulates_fraction() {
        // shift 13, step 3 -> 4/4 = 1 level per tick
        let rate = EnvelopeRate {
            shift: 13,
            step: 3,
            exponential: false,
            decreasing: false,
        };
        let mut fraction = 0;
        let mut level = 0;
        for _ in 0..10 {
            level = rate.apply(level, &mut fraction);
        }
        assert_eq!(level, 10);

        // shift 17, step 0 -> 7/64 per tick, needs 64 ticks for 7 levels
        let rate = EnvelopeRate {
            shift: 17,
            step: 0,
            exponential: false,
            decreasing: false,
        };
        let mut fraction = 0;
        let mut level = 0;
        for _ in 0..64 {
            level = rate.apply(level, &mut fraction);
        }
        assert_eq!(level, 7);
        assert_eq!(fraction, 0);
    }

    #[test]
    fn test_attack_linear_reaches_max_and_decays() {
        // AttackShift 0, step 0 -> +0x3800 per tick
        let mut adsr = adsr_with(0x0000, 0x0000);
        adsr.attack();

        assert!(adsr.run());
        assert_eq!(adsr.level(), 0x3800);
        assert!(adsr.run());
        assert_eq!(adsr.level(), 0x7000);
        assert!(adsr.run());
        assert_eq!(adsr.level(), 0x7FFF, "Attack clamps at the maximum");
        assert_eq!(adsr.phase(), EnvelopePhase::Decay);
    }

    #[test]
    fn test_attack_already_max_advances_without_change() {
        let mut adsr = adsr_with(0x0000, 0x0000);
        adsr.attack();
        adsr.set_level(0x7FFF);
        adsr.run();
        assert_eq!(adsr.phase(), EnvelopePhase::Decay);
        assert_eq!(adsr.level(), 0x7FFF);
    }

    #[test]
    fn test_decay_reaches_sustain_level() {
        // DecayShift 0xF, SustainLevel 0x8
        let mut adsr = adsr_with(0x00F8, 0x0000);
        adsr.attack();
        adsr.set_level(0x7FFF);
        adsr.run();
        assert_eq!(adsr.phase(), EnvelopePhase::Decay);

        let mut ticks = 0;
        while adsr.phase() == EnvelopePhase::Decay {
            adsr.run();
            ticks += 1;
            assert!(ticks < 100_000, "Decay should reach sustain");
        }
        assert_eq!(adsr.phase(), EnvelopePhase::Sustain);
        assert!((adsr.level() >> 11) & 0xF <= 0x8);
    }

    #[test]
    fn test_sustain_never_advances() {
        // Sustain decreasing linear, shift 0
        let mut adsr = adsr_with(0x000F, 0x4000);
        adsr.attack();
        adsr.set_level(0x7FFF);
        for _ in 0..10_000 {
            adsr.run();
        }
        assert_eq!(adsr.phase(), EnvelopePhase::Sustain);
        assert_eq!(adsr.level(), 0, "Sustain clamps at zero");
    }

    #[test]
    fn test_release_exponential_stops() {
        // ReleaseExp, ReleaseShift 8
        let mut adsr = adsr_with(0x0000, 0x0028);
        adsr.attack();
        adsr.set_level(0x7FFF);
        adsr.release();
        assert_eq!(adsr.phase(), EnvelopePhase::Release);

        let mut ticks = 0;
        while adsr.run() {
            ticks += 1;
            assert!(ticks < 1_000_000, "Release must terminate");
        }
        assert_eq!(adsr.phase(), EnvelopePhase::Stopped);
        assert_eq!(adsr.level(), 0);
    }

    #[test]
    fn test_release_on_stopped_stays_stopped() {
        let mut adsr = Adsr::new();
        adsr.release();
        assert_eq!(adsr.phase(), EnvelopePhase::Stopped);
    }

    #[test]
    fn test_register_fields() {
        let adsr = adsr_with(0x8F7A, 0xDFE5);
        assert!(adsr.reg.attack_exp());
        assert_eq!(adsr.reg.attack_shift(), 0x03);
        assert_eq!(adsr.reg.attack_step(), 3);
        assert_eq!(adsr.reg.decay_shift(), 0x7);
        assert_eq!(adsr.reg.sustain_level(), 0xA);
        assert!(adsr.reg.sustain_exp());
        assert!(adsr.reg.sustain_decr());
        assert_eq!(adsr.reg.sustain_shift(), 0x1F);
        assert_eq!(adsr.reg.sustain_step(), 3);
        assert!(adsr.reg.release_exp());
        assert_eq!(adsr.reg.release_shift(), 0x05);
    }

    proptest! {
        #[test]
        fn prop_attack_is_monotonic(adsr1 in any::<u16>(), adsr2 in any::<u16>()) {
            let mut adsr = adsr_with(adsr1, adsr2);
            adsr.attack();
            let mut last = adsr.level();
            for _ in 0..4096 {
                if adsr.phase() != EnvelopePhase::Attack {
                    break;
                }
                adsr.run();
                prop_assert!(adsr.level() >= last);
                last = adsr.level();
            }
            if adsr.phase() == EnvelopePhase::Decay {
                prop_assert_eq!(adsr.level(), 0x7FFF);
            }
        }

        #[test]
        fn prop_level_stays_in_range(adsr1 in any::<u16>(), adsr2 in any::<u16>(), ticks in 0usize..2048) {
            let mut adsr = adsr_with(adsr1, adsr2);
            adsr.attack();
            for i in 0..ticks {
                if i == ticks / 2 {
                    adsr.release();
                }
                adsr.run();
                prop_assert!((0..=0x7FFF).contains(&(adsr.level() as i32)));
            }
        }

        #[test]
        fn prop_fast_release_terminates(shift in 0u16..12, exp in any::<bool>(), start in 1i16..=0x7FFF) {
            let adsr2 = shift | if exp { 0x20 } else { 0 };
            let mut adsr = adsr_with(0, adsr2);
            adsr.attack();
            adsr.set_level(start);
            adsr.release();
            let mut ticks = 0u32;
            while adsr.run() {
                ticks += 1;
                prop_assert!(ticks < 1 << 20);
            }
        }
    }
}
