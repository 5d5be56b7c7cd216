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

//! SPU2 register definitions and types
//!
//! Most SPU2 registers are 16 bits wide, with a handful of 20/24-bit values
//! split across a hi/lo pair. Packed bitfields are exposed through accessor
//! methods on plain integer newtypes.
//!
//! | Type          | Register            | Notes                               |
//! |---------------|---------------------|-------------------------------------|
//! | `Reg32`       | SSA, LSA, NAX, TSA  | hi/lo halves, hi masked by caller   |
//! | `VoiceMask`   | PMON, NON, VMIX*    | 24 voice bits split at bit 16       |
//! | `AttrReg`     | ATTR                | enable, IRQ, reverb, noise clock    |
//! | `Mmix`        | MMIX                | mixer routing bits                  |
//! | `IrqStat`     | IRQ status          | shared between both cores           |
//! | `Statx`       | STATX               | DMA busy / request                  |
//! | `AdmaCtrl`    | ADMA                | auto-DMA per core + read mode       |
//! | `SpdifConfig` | SPDIF_OUT/MODE      | bypass bit drives the ADMA buffer   |

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A 32-bit register accessed as two 16-bit halves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reg32(pub u32);

impl Reg32 {
    /// Upper 16 bits
    #[inline(always)]
    pub fn hi(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Lower 16 bits
    #[inline(always)]
    pub fn lo(self) -> u16 {
        self.0 as u16
    }

    #[inline(always)]
    pub fn set_hi(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF) | ((value as u32) << 16);
    }

    #[inline(always)]
    pub fn set_lo(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF_0000) | value as u32;
    }

    /// Full 32-bit value
    #[inline(always)]
    pub fn full(self) -> u32 {
        self.0
    }
}

/// 24-bit per-voice mask (one bit per voice)
///
/// The lo half covers voices 0-15, the hi half voices 16-23.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceMask(pub u32);

impl VoiceMask {
    pub const BITS: u32 = 0x00FF_FFFF;

    #[inline(always)]
    pub fn get(self, voice: usize) -> bool {
        self.0 & (1 << voice) != 0
    }

    #[inline(always)]
    pub fn set(&mut self, voice: usize, on: bool) {
        if on {
            self.0 |= 1 << voice;
        } else {
            self.0 &= !(1 << voice);
        }
    }

    pub fn lo(self) -> u16 {
        self.0 as u16
    }

    pub fn hi(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn set_lo(&mut self, value: u16) {
        self.0 = (self.0 & 0x00FF_0000) | value as u32;
    }

    pub fn set_hi(&mut self, value: u16) {
        self.0 = (self.0 & 0xFFFF) | (((value & 0xFF) as u32) << 16);
    }

    pub fn is_empty(self) -> bool {
        self.0 & Self::BITS == 0
    }
}

/// Core attribute register (ATTR)
///
/// Bit layout:
/// - 15: core enable
/// - 14: output enable
/// - 8-13: noise clock
/// - 7: effect (reverb) enable
/// - 6: IRQ enable
/// - 4-5: transfer mode
/// - 3: external input reverb
/// - 2: CD input reverb
/// - 1: external input enable
/// - 0: CD input enable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrReg(pub u16);

impl AttrReg {
    pub fn core_enable(self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub fn output_enable(self) -> bool {
        self.0 & (1 << 14) != 0
    }

    pub fn noise_clock(self) -> u8 {
        ((self.0 >> 8) & 0x3F) as u8
    }

    pub fn effect_enable(self) -> bool {
        self.0 & (1 << 7) != 0
    }

    pub fn irq_enable(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    pub fn transfer_mode(self) -> TransferMode {
        TransferMode::from_bits(((self.0 >> 4) & 3) as u8)
    }

    pub fn ext_reverb(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    pub fn cd_reverb(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    pub fn ext_enable(self) -> bool {
        self.0 & (1 << 1) != 0
    }

    pub fn cd_enable(self) -> bool {
        self.0 & 1 != 0
    }
}

/// SPU2 data transfer mode (ATTR bits 4-5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// No transfer
    Stop,
    /// Manual write via the data port
    ManualWrite,
    /// DMA write to sound RAM
    DmaWrite,
    /// DMA read from sound RAM
    DmaRead,
}

impl TransferMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => TransferMode::Stop,
            1 => TransferMode::ManualWrite,
            2 => TransferMode::DmaWrite,
            _ => TransferMode::DmaRead,
        }
    }
}

bitflags! {
    /// Mixer routing (MMIX)
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Mmix: u16 {
        const VOICE_L = 1 << 11;
        const VOICE_R = 1 << 10;
        const VOICE_WET_L = 1 << 9;
        const VOICE_WET_R = 1 << 8;
        const MEMIN_L = 1 << 7;
        const MEMIN_R = 1 << 6;
        const MEMIN_WET_L = 1 << 5;
        const MEMIN_WET_R = 1 << 4;
        const SIN_L = 1 << 3;
        const SIN_R = 1 << 2;
        const SIN_WET_L = 1 << 1;
        const SIN_WET_R = 1 << 0;
    }
}

bitflags! {
    /// Shared IRQ status register
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct IrqStat: u16 {
        const BUFFER_HALF = 1 << 4;
        const CAUSE_C1 = 1 << 3;
        const CAUSE_C0 = 1 << 2;
    }
}

impl IrqStat {
    /// Cause bit for the given core
    pub fn cause(core: usize) -> Self {
        if core == 0 {
            IrqStat::CAUSE_C0
        } else {
            IrqStat::CAUSE_C1
        }
    }
}

bitflags! {
    /// Per-core status register (STATX)
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Statx: u16 {
        const DMA_BUSY = 1 << 10;
        const DMA_REQUEST = 1 << 7;
    }
}

bitflags! {
    /// Auto-DMA control (ADMA)
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AdmaCtrl: u16 {
        const CORE0 = 1 << 0;
        const CORE1 = 1 << 1;
        const READ_MODE = 1 << 2;
    }
}

impl AdmaCtrl {
    /// Enable bit for the given core
    pub fn core(core: usize) -> Self {
        if core == 0 {
            AdmaCtrl::CORE0
        } else {
            AdmaCtrl::CORE1
        }
    }
}

bitflags! {
    /// SPDIF output configuration
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SpdifConfig: u16 {
        const BYPASS = 1 << 8;
        const PCM = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg32_halves() {
        let mut reg = Reg32::default();
        reg.set_hi(0x000F);
        reg.set_lo(0x1234);
        assert_eq!(reg.full(), 0x000F_1234);
        assert_eq!(reg.hi(), 0x000F);
        assert_eq!(reg.lo(), 0x1234);
    }

    #[test]
    fn test_voice_mask_hi_is_eight_bits() {
        let mut mask = VoiceMask::default();
        mask.set_hi(0xFFFF);
        assert_eq!(mask.hi(), 0x00FF, "Only voices 16-23 exist in the hi half");
        assert!(mask.get(23));
        mask.set(23, false);
        assert!(!mask.get(23));
    }

    #[test]
    fn test_attr_fields() {
        let attr = AttrReg(0xC000 | (0x2A << 8) | 0x80 | 0x40 | 0x20);
        assert!(attr.core_enable());
        assert!(attr.output_enable());
        assert_eq!(attr.noise_clock(), 0x2A);
        assert!(attr.effect_enable());
        assert!(attr.irq_enable());
        assert_eq!(attr.transfer_mode(), TransferMode::DmaWrite);
    }

    #[test]
    fn test_mmix_retains_unknown_bits() {
        let mmix = Mmix::from_bits_retain(0xFFFF);
        assert_eq!(mmix.bits(), 0xFFFF);
        assert!(mmix.contains(Mmix::VOICE_L | Mmix::SIN_WET_R));
    }
}
