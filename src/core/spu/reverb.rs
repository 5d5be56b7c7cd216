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

//! SPU2 reverb engine
//!
//! The wet bus is downsampled to one channel per tick (alternating left and
//! right), run through a network of reflections, combs and all-pass filters
//! that lives in a circular work area of sound RAM, and upsampled back to
//! stereo.
//!
//! ```text
//!  wet ──> FIR down ──> vIN ──┬─> same-side reflection  (mSAME, dSAME)
//!                             └─> diff-side reflection  (mDIFF, dDIFF)
//!                                        │
//!          comb (mCOMB1-4 × vCOMB1-4) <──┘
//!                  │
//!                  └─> APF1 (mAPF1, dAPF1) ─> APF2 (mAPF2, dAPF2) ─> FIR up ─> out
//! ```
//!
//! ## Register Map (core-relative)
//!
//! | Offset      | Register                             |
//! |-------------|--------------------------------------|
//! | 0x2E0/0x2E2 | ESA hi/lo                            |
//! | 0x2E4-0x2EA | dAPF1, dAPF2                         |
//! | 0x2EC-0x2F2 | mSAME L/R                            |
//! | 0x2F4-0x302 | mCOMB1 L/R, mCOMB2 L/R               |
//! | 0x304-0x30A | dSAME L/R                            |
//! | 0x30C-0x312 | mDIFF L/R                            |
//! | 0x314-0x322 | mCOMB3 L/R, mCOMB4 L/R               |
//! | 0x324-0x32A | dDIFF L/R                            |
//! | 0x32C-0x33A | mAPF1 L/R, mAPF2 L/R                 |
//! | 0x33C       | EEA hi (lo is always 0xFFFF)         |

use super::irq::SharedInterruptState;
use super::ram::SoundRam;
use super::registers::Reg32;
use super::StereoSample;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const NUM_TAPS: usize = 39;

/// Half-band resampling filter shared by the down- and up-sampler
const FIR_COEFFICIENTS: [i32; NUM_TAPS] = [
    -1, 0, 2, 0, -10, 0, 35, 0, -103, 0, 266, 0, -616, 0, 1332, 0, -2960, 0, 10246, 16384,
    10246, 0, -2960, 0, 1332, 0, -616, 0, 266, 0, -103, 0, 35, 0, -10, 0, 2, 0, -1,
];

/// Number of address register pairs between ESA and EEA
const NUM_OFFSETS: usize = 22;

/// Which channel the network processes this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum ReverbPhase {
    #[default]
    Left,
    Right,
}

impl ReverbPhase {
    fn index(self) -> usize {
        match self {
            ReverbPhase::Left => 0,
            ReverbPhase::Right => 1,
        }
    }

    fn other(self) -> usize {
        1 - self.index()
    }

    fn invert(self) -> Self {
        match self {
            ReverbPhase::Left => ReverbPhase::Right,
            ReverbPhase::Right => ReverbPhase::Left,
        }
    }
}

/// Last 39 stereo samples, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FirHistory {
    samples: VecDeque<StereoSample>,
}

impl FirHistory {
    fn new() -> Self {
        Self {
            samples: VecDeque::from(vec![StereoSample::default(); NUM_TAPS]),
        }
    }

    fn push(&mut self, sample: StereoSample) {
        self.samples.pop_front();
        self.samples.push_back(sample);
    }

    fn filter(&self, channel: impl Fn(StereoSample) -> i16) -> i32 {
        self.samples
            .iter()
            .zip(FIR_COEFFICIENTS)
            .map(|(&s, coef)| channel(s) as i32 * coef)
            .sum()
    }
}

#[inline(always)]
fn clamp16(value: i32) -> i32 {
    value.clamp(i16::MIN as i32, i16::MAX as i32)
}

#[inline(always)]
fn mul(sample: i32, volume: i16) -> i32 {
    (sample * volume as i32) >> 15
}

/// Reverb unit of one core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reverb {
    /// Work area writes enabled (ATTR effect enable)
    pub(crate) enabled: bool,

    esa: Reg32,

    eea: Reg32,

    /// Cursor inside the work area
    pos: u32,

    /// Address offsets in register order: dAPF1/2, mSAME, mCOMB1, mCOMB2,
    /// dSAME, mDIFF, mCOMB3, mCOMB4, dDIFF, mAPF1, mAPF2 (L/R where paired)
    offsets: [Reg32; NUM_OFFSETS],

    pub(crate) v_iir: i16,
    pub(crate) v_comb: [i16; 4],
    pub(crate) v_wall: i16,
    pub(crate) v_apf1: i16,
    pub(crate) v_apf2: i16,
    pub(crate) v_in: [i16; 2],

    phase: ReverbPhase,

    input_history: FirHistory,

    output_history: FirHistory,
}

// Indices into `offsets`
const D_APF: usize = 0;
const M_SAME: usize = 2;
const M_COMB1: usize = 4;
const M_COMB2: usize = 6;
const D_SAME: usize = 8;
const M_DIFF: usize = 10;
const M_COMB3: usize = 12;
const M_COMB4: usize = 14;
const D_DIFF: usize = 16;
const M_APF1: usize = 18;
const M_APF2: usize = 20;

impl Reverb {
    pub fn new() -> Self {
        Self {
            enabled: false,
            esa: Reg32::default(),
            eea: Reg32::default(),
            pos: 0,
            offsets: [Reg32::default(); NUM_OFFSETS],
            v_iir: 0,
            v_comb: [0; 4],
            v_wall: 0,
            v_apf1: 0,
            v_apf2: 0,
            v_in: [0; 2],
            phase: ReverbPhase::Left,
            input_history: FirHistory::new(),
            output_history: FirHistory::new(),
        }
    }

    pub fn esa(&self) -> u32 {
        self.esa.full()
    }

    pub fn eea(&self) -> u32 {
        self.eea.full()
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Read an address register in 0x2E0..0x33E
    pub fn read_reg(&self, reg: u32) -> Option<u16> {
        let value = match reg {
            0x2E0 => self.esa.hi(),
            0x2E2 => self.esa.lo(),
            0x33C => self.eea.hi(),
            0x2E4..=0x33A => {
                let slot = self.offsets[((reg - 0x2E4) / 4) as usize];
                if reg & 2 == 0 {
                    slot.hi()
                } else {
                    slot.lo()
                }
            }
            _ => return None,
        };
        Some(value)
    }

    /// Write an address register in 0x2E0..0x33E
    ///
    /// ESA writes restart the cursor at the top of the work area.
    pub fn write_reg(&mut self, reg: u32, value: u16) -> bool {
        match reg {
            0x2E0 => {
                self.esa.set_hi(value & 0xF);
                self.pos = 0;
            }
            0x2E2 => {
                self.esa.set_lo(value);
                self.pos = 0;
            }
            0x33C => {
                self.eea.set_hi(value & 0xF);
                self.eea.set_lo(0xFFFF);
            }
            0x2E4..=0x33A if reg & 1 == 0 => {
                let slot = &mut self.offsets[((reg - 0x2E4) / 4) as usize];
                if reg & 2 == 0 {
                    slot.set_hi(value);
                } else {
                    slot.set_lo(value);
                }
            }
            _ => return false,
        }
        log::trace!("SPU2 reverb reg 0x{:03X} <- 0x{:04X}", reg, value);
        true
    }

    /// Work area size in words, `None` when EEA lies below ESA
    fn window(&self) -> Option<u32> {
        let (esa, eea) = (self.esa.full(), self.eea.full());
        (eea >= esa).then(|| eea - esa + 1)
    }

    /// Absolute RAM address of a work-area offset at the current cursor
    pub(crate) fn address(&self, offset: i64) -> Option<u32> {
        let size = self.window()? as i64;
        let relative = (self.pos as i64 + offset).rem_euclid(size);
        Some(self.esa.full() + relative as u32)
    }

    #[inline]
    fn offset(&self, index: usize) -> i64 {
        self.offsets[index].full() as i64
    }

    fn read(&self, offset: i64, ram: &SoundRam, irq: &mut SharedInterruptState) -> i32 {
        match self.address(offset) {
            Some(addr) => {
                irq.test_address(addr);
                ram.read(addr) as i16 as i32
            }
            None => 0,
        }
    }

    fn write(&self, offset: i64, value: i32, ram: &mut SoundRam, irq: &mut SharedInterruptState) {
        if let Some(addr) = self.address(offset) {
            irq.test_address(addr);
            if self.enabled {
                ram.write(addr, clamp16(value) as i16 as u16);
            }
        }
    }

    /// Process one tick of the wet bus
    ///
    /// # Arguments
    ///
    /// * `input` - Wet bus sample for this tick
    /// * `ram` - Sound RAM holding the work area
    /// * `irq` - Shared IRQ state; every work-area access is address-tested
    ///
    /// # Returns
    ///
    /// Reverb output before EVOL is applied
    pub fn run(
        &mut self,
        input: StereoSample,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) -> StereoSample {
        let down = self.downsample(input);

        let processed = if self.window().is_some() {
            self.process(down, ram, irq)
        } else {
            0
        };

        let out = self.upsample(processed);

        if self.phase == ReverbPhase::Right {
            self.pos = match self.window() {
                Some(size) => (self.pos + 1) % size,
                None => 0,
            };
        }
        self.phase = self.phase.invert();

        out
    }

    fn downsample(&mut self, input: StereoSample) -> i32 {
        self.input_history.push(input);
        let sum = match self.phase {
            ReverbPhase::Left => self.input_history.filter(|s| s.left),
            ReverbPhase::Right => self.input_history.filter(|s| s.right),
        };
        clamp16(sum >> 15)
    }

    fn upsample(&mut self, sample: i32) -> StereoSample {
        let sample = clamp16(sample) as i16;
        let pushed = match self.phase {
            ReverbPhase::Left => StereoSample::new(sample, 0),
            ReverbPhase::Right => StereoSample::new(0, sample),
        };
        self.output_history.push(pushed);

        StereoSample::new(
            clamp16(self.output_history.filter(|s| s.left) >> 14) as i16,
            clamp16(self.output_history.filter(|s| s.right) >> 14) as i16,
        )
    }

    fn process(&self, input: i32, ram: &mut SoundRam, irq: &mut SharedInterruptState) -> i32 {
        let ch = self.phase.index();
        let other = self.phase.other();

        let input = clamp16(mul(input, self.v_in[ch]));

        self.reflect(
            input,
            self.offset(M_SAME + ch),
            self.offset(D_SAME + ch),
            ram,
            irq,
        );
        self.reflect(
            input,
            self.offset(M_DIFF + ch),
            self.offset(D_DIFF + other),
            ram,
            irq,
        );

        let combs = [M_COMB1, M_COMB2, M_COMB3, M_COMB4];
        let mut comb = 0;
        for (base, volume) in combs.into_iter().zip(self.v_comb) {
            comb += mul(self.read(self.offset(base + ch), ram, irq), volume);
        }
        let comb = clamp16(comb);

        let apf1 = self.all_pass(
            comb,
            self.offset(M_APF1 + ch),
            self.offset(D_APF),
            self.v_apf1,
            ram,
            irq,
        );
        self.all_pass(
            apf1,
            self.offset(M_APF2 + ch),
            self.offset(D_APF + 1),
            self.v_apf2,
            ram,
            irq,
        )
    }

    fn reflect(
        &self,
        input: i32,
        m: i64,
        d: i64,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) {
        let previous = self.read(m - 1, ram, irq);
        let delayed = self.read(d, ram, irq);
        let feedback = clamp16(input + mul(delayed, self.v_wall) - previous);
        let value = clamp16(previous + mul(feedback, self.v_iir));
        self.write(m, value, ram, irq);
    }

    fn all_pass(
        &self,
        input: i32,
        m: i64,
        d: i64,
        volume: i16,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) -> i32 {
        let delayed = self.read(m - d, ram, irq);
        let stored = clamp16(input - mul(delayed, volume));
        self.write(m, stored, ram, irq);
        clamp16(delayed + mul(stored, volume))
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}
