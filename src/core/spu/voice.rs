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

//! SPU2 voice (audio channel) implementation
//!
//! Each voice streams ADPCM blocks out of sound RAM into a small decode
//! buffer, resamples them with the Gaussian interpolator and shapes the
//! result with its ADSR envelope.
//!
//! Voice parameter registers (offset from `voice * 0x10`):
//!
//! | Offset | Register |
//! |--------|----------|
//! | 0x0    | VOLL     |
//! | 0x2    | VOLR     |
//! | 0x4    | PITCH    |
//! | 0x6    | ADSR1    |
//! | 0x8    | ADSR2    |
//! | 0xA    | ENVX     |
//! | 0xC    | VOLXL    |
//! | 0xE    | VOLXR    |
//!
//! Voice address registers (offset from `0x1C0 + voice * 0xC`):
//! SSA hi/lo at 0x0/0x2, LSA hi/lo at 0x4/0x6, NAX hi/lo at 0x8/0xA.

use super::adpcm::{AdpcmHeader, AdpcmHistory, DecodeFifo};
use super::adsr::Adsr;
use super::gaussian;
use super::ram::{SoundRam, ADDRESS_MASK};
use super::volume::VolumePair;
use serde::{Deserialize, Serialize};

/// Decoding stops once this many samples are buffered
const REFILL_THRESHOLD: usize = 16;

/// Highest pitch step (just under 4 samples per tick)
const MAX_PITCH_STEP: u32 = 0x3FFF;

/// Individual voice channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Voice number (0-23)
    id: usize,

    pub(crate) volume: VolumePair,

    pub(crate) pitch: u16,

    pub(crate) adsr: Adsr,

    /// Start address (word address in sound RAM)
    ssa: u32,

    /// Loop address
    lsa: u32,

    /// Next address to read
    nax: u32,

    /// Set by an LSA write so LoopStart headers do not override it
    custom_loop: bool,

    header: AdpcmHeader,

    history: AdpcmHistory,

    fifo: DecodeFifo,

    /// 12-bit fractional sample position
    counter: u32,

    /// Samples to drop from the buffer before the next decode
    consumed: usize,

    pub(crate) pitch_mod: bool,

    pub(crate) noise: bool,

    /// Set when a LoopEnd block has been passed
    pub(crate) endx: bool,
}

impl Voice {
    /// Create a new voice instance
    ///
    /// # Arguments
    ///
    /// * `id` - Voice number (0-23)
    pub fn new(id: usize) -> Self {
        Self {
            id,
            volume: VolumePair::default(),
            pitch: 0,
            adsr: Adsr::new(),
            ssa: 0,
            lsa: 0,
            nax: 0,
            custom_loop: false,
            header: AdpcmHeader::default(),
            history: AdpcmHistory::default(),
            fifo: DecodeFifo::new(),
            counter: 0,
            consumed: 0,
            pitch_mod: false,
            noise: false,
            endx: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Next address to be read from sound RAM
    #[inline(always)]
    pub fn nax(&self) -> u32 {
        self.nax
    }

    pub fn lsa(&self) -> u32 {
        self.lsa
    }

    /// Trigger key-on for this voice
    ///
    /// Restarts playback at SSA with a fresh decoder and begins the attack
    /// phase. Three silent samples seed the interpolator history.
    pub fn key_on(&mut self) {
        self.nax = self.ssa;
        self.custom_loop = false;
        self.history = AdpcmHistory::default();
        self.fifo.clear();
        for _ in 0..3 {
            self.fifo.push(0);
        }
        self.counter = 0;
        self.consumed = 0;
        self.endx = false;
        self.adsr.attack();

        log::debug!(
            "SPU2 voice {} key on: SSA=0x{:05X} pitch=0x{:04X} ADSR=0x{:08X}",
            self.id,
            self.ssa,
            self.pitch,
            self.adsr.reg.0
        );
    }

    /// Trigger key-off for this voice
    pub fn key_off(&mut self) {
        self.adsr.release();
        log::debug!("SPU2 voice {} key off", self.id);
    }

    /// Refill the decode buffer from sound RAM
    ///
    /// Samples consumed by the previous pitch step are dropped first. Stopped
    /// voices keep walking NAX and the block headers but buffer silence.
    pub fn decode_samples(&mut self, ram: &SoundRam) {
        self.fifo.pop(self.consumed);
        self.consumed = 0;

        while self.fifo.len() < REFILL_THRESHOLD {
            if self.nax & 7 == 0 {
                self.load_header(ram);
            }

            let word = ram.read(self.nax);
            self.nax = (self.nax + 1) & ADDRESS_MASK;

            if self.adsr.is_active() {
                for sample in self.history.decode_word(self.header, word) {
                    self.fifo.push(sample);
                }
            } else {
                for _ in 0..4 {
                    self.fifo.push(0);
                }
            }

            if self.nax & 7 == 0 && self.header.loop_end() {
                self.nax = self.lsa;
                self.endx = true;
                if !self.header.loop_repeat() && !self.noise {
                    self.adsr.stop();
                }
            }
        }
    }

    fn load_header(&mut self, ram: &SoundRam) {
        self.header = AdpcmHeader(ram.read(self.nax));
        self.header.check(self.id);

        if self.header.loop_start() && !self.custom_loop {
            self.lsa = self.nax;
        }
        self.nax = (self.nax + 1) & ADDRESS_MASK;
    }

    /// Gaussian-interpolated sample at the current counter position
    #[inline]
    pub fn interpolate(&self) -> i16 {
        let window = [
            self.fifo.peek(0),
            self.fifo.peek(1),
            self.fifo.peek(2),
            self.fifo.peek(3),
        ];
        gaussian::interpolate(window, self.counter)
    }

    /// Run the envelope and the volume sweeps for one tick
    pub fn update_volume(&mut self) {
        self.adsr.run();
        self.volume.run();
    }

    /// Advance the pitch counter
    ///
    /// # Arguments
    ///
    /// * `modulator` - Previous voice's output from the last tick, if pitch
    ///   modulation may apply to this voice
    pub fn advance_pitch(&mut self, modulator: Option<i16>) {
        let mut step = self.pitch as u32;

        if self.pitch_mod {
            if let Some(previous) = modulator {
                let factor = (previous as i32 + 0x8000) & 0xFFFF;
                step = ((((self.pitch as i16) as i32 * factor) >> 15) & 0xFFFF) as u32;
            }
        }

        self.counter += step.min(MAX_PITCH_STEP);
        self.consumed += (self.counter >> 12) as usize;
        self.counter &= 0xFFF;
    }

    /// Read a voice parameter register
    ///
    /// Returns `None` for offsets that are not registers.
    pub fn read_reg(&self, reg: u32) -> Option<u16> {
        let value = match reg {
            0x0 => self.volume.left.register(),
            0x2 => self.volume.right.register(),
            0x4 => self.pitch,
            0x6 => self.adsr.reg.adsr1(),
            0x8 => self.adsr.reg.adsr2(),
            0xA => self.adsr.level() as u16,
            0xC => self.volume.left.level() as u16,
            0xE => self.volume.right.level() as u16,
            _ => return None,
        };
        Some(value)
    }

    /// Write a voice parameter register
    ///
    /// Returns `false` for offsets that are not registers.
    pub fn write_reg(&mut self, reg: u32, value: u16) -> bool {
        match reg {
            0x0 => self.volume.left.set(value),
            0x2 => self.volume.right.set(value),
            0x4 => self.pitch = value,
            0x6 => self.adsr.reg.set_adsr1(value),
            0x8 => self.adsr.reg.set_adsr2(value),
            0xA => self.adsr.set_level(value as i16),
            0xC | 0xE => {
                log::trace!(
                    "SPU2 voice {}: ignoring write 0x{:04X} to read-only VOLX",
                    self.id,
                    value
                );
            }
            _ => return false,
        }
        true
    }

    /// Read a voice address register (SSA/LSA/NAX halves)
    pub fn read_addr(&self, reg: u32) -> Option<u16> {
        let value = match reg {
            0x0 => (self.ssa >> 16) as u16,
            0x2 => self.ssa as u16,
            0x4 => (self.lsa >> 16) as u16,
            0x6 => self.lsa as u16,
            0x8 => (self.nax >> 16) as u16,
            0xA => self.nax as u16,
            _ => return None,
        };
        Some(value)
    }

    /// Write a voice address register
    ///
    /// Any LSA write latches the loop address against LoopStart headers.
    pub fn write_addr(&mut self, reg: u32, value: u16) -> bool {
        match reg {
            0x0 => self.ssa = set_hi(self.ssa, value),
            0x2 => self.ssa = set_lo(self.ssa, value),
            0x4 => {
                self.lsa = set_hi(self.lsa, value);
                self.custom_loop = true;
            }
            0x6 => {
                self.lsa = set_lo(self.lsa, value);
                self.custom_loop = true;
            }
            0x8 => self.nax = set_hi(self.nax, value),
            0xA => self.nax = set_lo(self.nax, value),
            _ => return false,
        }
        true
    }
}

#[inline]
fn set_hi(addr: u32, value: u16) -> u32 {
    (((value as u32) & 0xF) << 16) | (addr & 0xFFFF)
}

#[inline]
fn set_lo(addr: u32, value: u16) -> u32 {
    (addr & 0xF_0000) | value as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spu::adsr::EnvelopePhase;

    /// Write one ADPCM block at `addr` with the given header and a single data pattern
    fn write_block(ram: &mut SoundRam, addr: u32, header: u16, data: u16) {
        ram.write(addr, header);
        for i in 1..8 {
            ram.write(addr + i, data);
        }
    }

    fn keyed_voice(ssa: u32) -> Voice {
        let mut voice = Voice::new(0);
        voice.write_addr(0x0, (ssa >> 16) as u16);
        voice.write_addr(0x2, ssa as u16);
        voice.pitch = 0x1000;
        voice.key_on();
        voice
    }

    #[test]
    fn test_key_on_resets_playback() {
        let mut voice = keyed_voice(0x2000);
        assert_eq!(voice.nax(), 0x2000);
        assert_eq!(voice.adsr.phase(), EnvelopePhase::Attack);
        assert!(!voice.endx);

        voice.key_off();
        assert_eq!(voice.adsr.phase(), EnvelopePhase::Release);
    }

    #[test]
    fn test_decode_stops_at_refill_threshold() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0000, 0x1111);
        let mut voice = keyed_voice(0x1000);

        voice.decode_samples(&ram);
        assert!(voice.fifo.len() >= REFILL_THRESHOLD);
        assert!(voice.fifo.len() < REFILL_THRESHOLD + 4);
        // 3 seed samples + 4 words -> header skipped, NAX at word 5
        assert_eq!(voice.nax(), 0x1005);
    }

    #[test]
    fn test_loop_start_sets_lsa() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0000, 0);
        write_block(&mut ram, 0x1008, 0x0400, 0);
        let mut voice = keyed_voice(0x1000);

        for _ in 0..6 {
            voice.advance_pitch(None);
            voice.pitch = 0x3FFF;
            voice.decode_samples(&ram);
        }
        assert_eq!(voice.lsa(), 0x1008);
    }

    #[test]
    fn test_custom_loop_overrides_loop_start() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0400, 0);
        let mut voice = Voice::new(0);
        voice.write_addr(0x2, 0x1000);
        voice.key_on();
        voice.write_addr(0x6, 0x3000);

        voice.decode_samples(&ram);
        assert_eq!(voice.lsa(), 0x3000, "LSA write must win over LoopStart");
    }

    #[test]
    fn test_loop_end_without_repeat_stops_voice() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0100, 0x1234);
        let mut voice = keyed_voice(0x1000);
        voice.write_addr(0x6, 0x4000);
        voice.pitch = 0x3FFF;

        for _ in 0..8 {
            voice.decode_samples(&ram);
            voice.advance_pitch(None);
        }
        assert!(voice.endx);
        assert_eq!(voice.adsr.phase(), EnvelopePhase::Stopped);
    }

    #[test]
    fn test_loop_end_sets_nax_to_lsa() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0100, 0x1234);
        let mut voice = keyed_voice(0x1000);
        voice.write_addr(0x6, 0x4000);

        // Empty buffer: first refill stops after 4 data words, second finishes the block
        voice.consumed = 0;
        voice.fifo.clear();
        voice.decode_samples(&ram);
        voice.fifo.pop(12);
        voice.decode_samples(&ram);
        assert!(voice.endx);
        assert!(voice.nax() >= 0x4000 && voice.nax() < 0x4008);
    }

    #[test]
    fn test_loop_end_keeps_noise_voice_alive() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0100, 0x1234);
        let mut voice = keyed_voice(0x1000);
        voice.noise = true;
        voice.pitch = 0x3FFF;

        for _ in 0..8 {
            voice.decode_samples(&ram);
            voice.advance_pitch(None);
        }
        assert!(voice.endx);
        assert_ne!(voice.adsr.phase(), EnvelopePhase::Stopped);
    }

    #[test]
    fn test_stopped_voice_still_walks_nax() {
        let mut ram = SoundRam::new();
        write_block(&mut ram, 0x1000, 0x0000, 0x7777);
        let mut voice = Voice::new(0);
        voice.write_addr(0x2, 0x1000);
        voice.write_addr(0xA, 0x1000);
        voice.decode_samples(&ram);
        assert!(voice.nax() > 0x1000);
        assert_eq!(voice.interpolate(), 0, "Stopped voices buffer silence");
    }

    #[test]
    fn test_pitch_counter_consumes_samples() {
        let mut voice = Voice::new(0);
        voice.pitch = 0x1800;
        voice.advance_pitch(None);
        assert_eq!(voice.consumed, 1);
        assert_eq!(voice.counter, 0x800);
        voice.advance_pitch(None);
        assert_eq!(voice.consumed, 3);
        assert_eq!(voice.counter, 0);
    }

    #[test]
    fn test_pitch_step_is_clamped() {
        let mut voice = Voice::new(0);
        voice.pitch = 0xFFFF;
        voice.advance_pitch(None);
        assert_eq!(voice.consumed, 3);
        assert_eq!(voice.counter, 0xFFF);
    }

    #[test]
    fn test_pitch_modulation() {
        let mut voice = Voice::new(1);
        voice.pitch = 0x1000;
        voice.pitch_mod = true;
        // Previous output 0 -> factor 0x8000 -> unity
        voice.advance_pitch(Some(0));
        assert_eq!(voice.consumed, 1);
        assert_eq!(voice.counter, 0);

        // Previous output -0x4000 -> factor 0x4000 -> half speed
        voice.advance_pitch(Some(-0x4000));
        assert_eq!(voice.counter, 0x800);
    }

    #[test]
    fn test_register_round_trip_and_volx_ignored() {
        let mut voice = Voice::new(3);
        assert!(voice.write_reg(0x0, 0x1234));
        assert!(voice.write_reg(0x4, 0x0800));
        assert!(voice.write_reg(0xC, 0x7777));
        assert_eq!(voice.read_reg(0x0), Some(0x1234));
        assert_eq!(voice.read_reg(0x4), Some(0x0800));
        assert_eq!(voice.read_reg(0xC), Some(0x2468), "VOLXL reports the current level");
        assert_eq!(voice.read_reg(0x3), None);
        assert!(!voice.write_reg(0x5, 0));
    }

    #[test]
    fn test_address_hi_is_four_bits() {
        let mut voice = Voice::new(0);
        voice.write_addr(0x0, 0xFFFF);
        voice.write_addr(0x2, 0xABCD);
        assert_eq!(voice.read_addr(0x0), Some(0x000F));
        assert_eq!(voice.read_addr(0x2), Some(0xABCD));
    }
}
