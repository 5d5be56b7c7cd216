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

//! One SPU2 core: 24 voices, mixer, reverb and transfer engine
//!
//! Both cores share sound RAM and the IRQ state; the owning [`super::Spu2`]
//! lends them to a core for each call.
//!
//! # Capture Buffers
//!
//! Every tick the core writes intermediate signals into fixed RAM regions
//! (0x100-sample halves, double buffered):
//!
//! ```text
//! Region  | Core 0 | Core 1 | Signal
//! --------|--------|--------|------------------------
//! SIN L/R | 0x0000 | 0x0800 | sound-in from core 0
//! Voice 1 | 0x0400 | 0x0C00 | voice 1 after ENVX
//! Voice 3 | 0x0600 | 0x0E00 | voice 3 after ENVX
//! Dry L/R | 0x1000 | 0x1800 | voice dry sums
//! Wet L/R | 0x1400 | 0x1C00 | voice wet sums
//! ```
//!
//! Mem-in (ADMA destination) sits at 0x2000/0x2200 for core 0 and
//! 0x2400/0x2600 for core 1.

use super::dma::{AdmaTargets, DmaEngine};
use super::irq::SharedInterruptState;
use super::noise::NoiseGenerator;
use super::ram::SoundRam;
use super::registers::{AdmaCtrl, AttrReg, Mmix, Reg32, SpdifConfig, TransferMode, VoiceMask};
use super::reverb::Reverb;
use super::voice::Voice;
use super::volume::VolumePair;
use super::{apply_volume, StereoSample};
use serde::{Deserialize, Serialize};

/// Voices per core
pub const NUM_VOICES: usize = 24;

/// Samples per capture buffer half
const HALF_BUFFER: u32 = 0x100;

/// Capture position at which the SPDIF bypass buffer flips
const BYPASS_FLIP_POS: u32 = 0x50;

/// Distance between the two cores' capture regions
const CAPTURE_CORE_STRIDE: u32 = 0x800;

/// Distance between the two cores' mem-in regions
const MEMIN_CORE_STRIDE: u32 = 0x400;

const MEMIN_L: u32 = 0x2000;
const MEMIN_R: u32 = 0x2200;

/// Capture region bases for core 0
pub mod capture {
    pub const SIN_L: u32 = 0x0000;
    pub const SIN_R: u32 = 0x0200;
    pub const VOICE1: u32 = 0x0400;
    pub const VOICE3: u32 = 0x0600;
    pub const DRY_L: u32 = 0x1000;
    pub const DRY_R: u32 = 0x1200;
    pub const WET_L: u32 = 0x1400;
    pub const WET_R: u32 = 0x1600;

    pub(super) const ALL: [u32; 8] = [
        SIN_L, SIN_R, VOICE1, VOICE3, DRY_L, DRY_R, WET_L, WET_R,
    ];
}

/// Gain applied to the voice sums routed through MMIX
const VOICE_MIX_GAIN: i16 = 0x7FFF;

/// Sound-in and mem-in lane gain until AVOL/BVOL are first written
const INPUT_LANE_GAIN: StereoSample = StereoSample::new(0x7FFF, 0x7FFF);

/// SPU2 core state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpuCore {
    /// Core number (0 or 1)
    id: usize,

    voices: Vec<Voice>,

    noise: NoiseGenerator,

    reverb: Reverb,

    /// Master volume (MVOL), sweepable
    mvol: VolumePair,

    /// Reverb return volume (EVOL)
    evol: StereoSample,

    /// Sound-in volume (AVOL)
    avol: StereoSample,

    /// Mem-in volume (BVOL)
    bvol: StereoSample,

    /// Gain applied to the sound-in lanes, tracks AVOL once written
    sin_gain: StereoSample,

    /// Gain applied to the mem-in lanes, tracks BVOL once written
    memin_gain: StereoSample,

    pmon: VoiceMask,
    non: VoiceMask,
    vmixl: VoiceMask,
    vmixel: VoiceMask,
    vmixr: VoiceMask,
    vmixer: VoiceMask,

    /// Pending key-on mask, consumed by the next tick
    kon: VoiceMask,

    /// Pending key-off mask, consumed by the next tick
    koff: VoiceMask,

    mmix: Mmix,

    attr: AttrReg,

    dma: DmaEngine,

    adma: AdmaCtrl,

    spdif_conf: SpdifConfig,

    spdif_media: Reg32,

    /// Position within the current capture buffer half
    buf_pos: u32,

    /// Capture buffer half being written (0 or 1)
    current_buffer: u32,

    /// SPDIF bypass buffer half (0 or 1)
    bypass_buffer: u32,

    /// Each voice's output after ENVX from the last tick
    outx: [i16; NUM_VOICES],
}

impl SpuCore {
    /// Create a core in its reset state
    ///
    /// # Arguments
    ///
    /// * `id` - Core number (0 or 1)
    pub fn new(id: usize) -> Self {
        Self {
            id,
            voices: (0..NUM_VOICES).map(Voice::new).collect(),
            noise: NoiseGenerator::new(),
            reverb: Reverb::new(),
            mvol: VolumePair::default(),
            evol: StereoSample::default(),
            avol: StereoSample::default(),
            bvol: StereoSample::default(),
            sin_gain: INPUT_LANE_GAIN,
            memin_gain: INPUT_LANE_GAIN,
            pmon: VoiceMask::default(),
            non: VoiceMask::default(),
            vmixl: VoiceMask::default(),
            vmixel: VoiceMask::default(),
            vmixr: VoiceMask::default(),
            vmixer: VoiceMask::default(),
            kon: VoiceMask::default(),
            koff: VoiceMask::default(),
            mmix: Mmix::empty(),
            attr: AttrReg::default(),
            dma: DmaEngine::new(),
            adma: AdmaCtrl::empty(),
            spdif_conf: SpdifConfig::empty(),
            spdif_media: Reg32::default(),
            buf_pos: 0,
            current_buffer: 0,
            bypass_buffer: 0,
            outx: [0; NUM_VOICES],
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Return every register and voice to power-on state
    ///
    /// Sound RAM is left untouched.
    pub fn reset(&mut self, irq: &mut SharedInterruptState) {
        log::info!("SPU2 core {} reset", self.id);
        *self = Self::new(self.id);
        irq.reset_core(self.id);
    }

    pub fn voice(&self, index: usize) -> &Voice {
        &self.voices[index]
    }

    pub fn voice_mut(&mut self, index: usize) -> &mut Voice {
        &mut self.voices[index]
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn dma(&self) -> &DmaEngine {
        &self.dma
    }

    /// Last value written to ATTR
    pub fn attr(&self) -> AttrReg {
        self.attr
    }

    /// Position within the current capture buffer half
    pub fn buf_pos(&self) -> u32 {
        self.buf_pos
    }

    pub fn current_buffer(&self) -> u32 {
        self.current_buffer
    }

    /// Output of each voice from the last tick
    pub fn outx(&self) -> &[i16; NUM_VOICES] {
        &self.outx
    }

    #[inline]
    fn adma_active(&self) -> bool {
        self.adma.contains(AdmaCtrl::core(self.id))
    }

    /// Mem-in half the next ADMA refill writes (the one not being played)
    fn adma_targets(&self) -> AdmaTargets {
        let half = if self.spdif_conf.contains(SpdifConfig::BYPASS) {
            self.bypass_buffer
        } else {
            self.current_buffer
        };
        let displacement = (1 - half) * HALF_BUFFER + self.id as u32 * MEMIN_CORE_STRIDE;
        AdmaTargets {
            left: MEMIN_L + displacement,
            right: MEMIN_R + displacement,
        }
    }

    fn adma_window(&self) -> Option<AdmaTargets> {
        self.adma_active().then(|| self.adma_targets())
    }

    // ========== Sample Generation ==========

    /// Produce one stereo output sample
    ///
    /// # Arguments
    ///
    /// * `input` - Sound-in for this tick (core 0's output when this is core 1)
    /// * `ram` - Shared sound RAM
    /// * `irq` - Shared IRQ state
    pub fn gen_sample(
        &mut self,
        input: StereoSample,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) -> StereoSample {
        self.capture(ram, capture::SIN_L, input.left);
        self.capture(ram, capture::SIN_R, input.right);

        self.process_key_events();
        self.test_irq(irq);

        for voice in &mut self.voices {
            voice.decode_samples(ram);
        }

        let mut samples = [0i16; NUM_VOICES];
        for (sample, voice) in samples.iter_mut().zip(&self.voices) {
            *sample = voice.interpolate();
        }

        for voice in &mut self.voices {
            voice.update_volume();
        }

        for i in 0..NUM_VOICES {
            let modulator = if i > 0 { Some(self.outx[i - 1]) } else { None };
            self.voices[i].advance_pitch(modulator);
        }

        let noise = self.noise.level();
        let mut voices_dry = StereoSample::default();
        let mut voices_wet = StereoSample::default();

        for (i, voice) in self.voices.iter().enumerate() {
            let raw = if voice.noise { noise } else { samples[i] };
            let sample = apply_volume(raw, voice.adsr.level());
            self.outx[i] = sample;

            let voiced = StereoSample::new(sample, sample)
                .volume(voice.volume.left.level(), voice.volume.right.level());

            if self.vmixl.get(i) {
                voices_dry.left = voices_dry.left.saturating_add(voiced.left);
            }
            if self.vmixr.get(i) {
                voices_dry.right = voices_dry.right.saturating_add(voiced.right);
            }
            if self.vmixel.get(i) {
                voices_wet.left = voices_wet.left.saturating_add(voiced.left);
            }
            if self.vmixer.get(i) {
                voices_wet.right = voices_wet.right.saturating_add(voiced.right);
            }
        }

        self.capture(ram, capture::VOICE1, self.outx[1]);
        self.capture(ram, capture::VOICE3, self.outx[3]);
        self.capture(ram, capture::WET_L, voices_wet.left);
        self.capture(ram, capture::WET_R, voices_wet.right);
        self.capture(ram, capture::DRY_L, voices_dry.left);
        self.capture(ram, capture::DRY_R, voices_dry.right);

        let mem_in = self.mem_in(ram);

        let (dry, wet) = self.route(input, mem_in, voices_dry, voices_wet);

        let reverb_out = self
            .reverb
            .run(wet, ram, irq)
            .volume(self.evol.left, self.evol.right);
        let out = dry.mix(reverb_out);

        self.advance_capture(ram, irq);

        self.noise.run();
        self.mvol.run();
        out.volume(self.mvol.left.level(), self.mvol.right.level())
    }

    /// Apply and clear the pending KON/KOFF masks
    fn process_key_events(&mut self) {
        if self.kon.is_empty() && self.koff.is_empty() {
            return;
        }

        for (i, voice) in self.voices.iter_mut().enumerate() {
            if self.kon.get(i) {
                voice.key_on();
            }
            if self.koff.get(i) {
                voice.key_off();
            }
        }

        self.kon = VoiceMask::default();
        self.koff = VoiceMask::default();
    }

    /// Compare this tick's RAM touch points against both cores' IRQA
    fn test_irq(&self, irq: &mut SharedInterruptState) {
        let base = self.current_buffer * HALF_BUFFER + self.buf_pos;
        let capture_base = base + self.id as u32 * CAPTURE_CORE_STRIDE;
        let memin_base = base + self.id as u32 * MEMIN_CORE_STRIDE;

        for core in 0..2 {
            if !irq.enabled(core) {
                continue;
            }
            let target = irq.irqa(core);

            let voice_hit = self
                .voices
                .iter()
                .any(|v| v.nax() == target || v.nax() & !7 == target);
            let capture_hit = capture::ALL
                .iter()
                .any(|&region| region + capture_base == target);
            let memin_hit = MEMIN_L + memin_base == target || MEMIN_R + memin_base == target;

            if voice_hit || capture_hit || memin_hit {
                irq.raise(core);
            }
        }
    }

    fn capture(&self, ram: &mut SoundRam, region: u32, value: i16) {
        let addr = region
            + self.id as u32 * CAPTURE_CORE_STRIDE
            + self.current_buffer * HALF_BUFFER
            + self.buf_pos;
        ram.write(addr, value as u16);
    }

    fn mem_in(&self, ram: &SoundRam) -> StereoSample {
        let displacement =
            self.current_buffer * HALF_BUFFER + self.buf_pos + self.id as u32 * MEMIN_CORE_STRIDE;
        StereoSample::new(
            ram.read(MEMIN_L + displacement) as i16,
            ram.read(MEMIN_R + displacement) as i16,
        )
    }

    /// Route voice sums, sound-in and mem-in onto the dry and wet buses
    fn route(
        &self,
        input: StereoSample,
        mem_in: StereoSample,
        voices_dry: StereoSample,
        voices_wet: StereoSample,
    ) -> (StereoSample, StereoSample) {
        let pick = |sample: i16, flag: Mmix, vol: i16| {
            if self.mmix.contains(flag) {
                apply_volume(sample, vol)
            } else {
                0
            }
        };

        let voices = (
            StereoSample::new(
                pick(voices_dry.left, Mmix::VOICE_L, VOICE_MIX_GAIN),
                pick(voices_dry.right, Mmix::VOICE_R, VOICE_MIX_GAIN),
            ),
            StereoSample::new(
                pick(voices_wet.left, Mmix::VOICE_WET_L, VOICE_MIX_GAIN),
                pick(voices_wet.right, Mmix::VOICE_WET_R, VOICE_MIX_GAIN),
            ),
        );
        let sound_in = (
            StereoSample::new(
                pick(input.left, Mmix::SIN_L, self.sin_gain.left),
                pick(input.right, Mmix::SIN_R, self.sin_gain.right),
            ),
            StereoSample::new(
                pick(input.left, Mmix::SIN_WET_L, self.sin_gain.left),
                pick(input.right, Mmix::SIN_WET_R, self.sin_gain.right),
            ),
        );
        let memory_in = (
            StereoSample::new(
                pick(mem_in.left, Mmix::MEMIN_L, self.memin_gain.left),
                pick(mem_in.right, Mmix::MEMIN_R, self.memin_gain.right),
            ),
            StereoSample::new(
                pick(mem_in.left, Mmix::MEMIN_WET_L, self.memin_gain.left),
                pick(mem_in.right, Mmix::MEMIN_WET_R, self.memin_gain.right),
            ),
        );

        let dry = voices.0.mix(sound_in.0).mix(memory_in.0);
        let wet = voices.1.mix(sound_in.1).mix(memory_in.1);
        (dry, wet)
    }

    /// Step the capture position and handle buffer-half boundaries
    fn advance_capture(&mut self, ram: &mut SoundRam, irq: &mut SharedInterruptState) {
        self.buf_pos += 1;

        if self.buf_pos == BYPASS_FLIP_POS {
            self.bypass_buffer = 1 - self.bypass_buffer;
            if self.adma_active() && self.spdif_conf.contains(SpdifConfig::BYPASS) {
                self.run_adma(ram, irq);
            }
        }

        if self.buf_pos == HALF_BUFFER {
            self.buf_pos = 0;
            self.current_buffer = 1 - self.current_buffer;
            irq.set_buffer_half(self.current_buffer == 1);
            self.bypass_buffer = 1 - self.bypass_buffer;

            if self.adma_active() {
                self.run_adma(ram, irq);
            }
        }
    }

    // ========== Transfers ==========

    fn run_adma(&mut self, ram: &mut SoundRam, irq: &mut SharedInterruptState) {
        let targets = self.adma_targets();
        log::trace!(
            "SPU2 core {} ADMA refill L=0x{:05X} R=0x{:05X}",
            self.id,
            targets.left,
            targets.right
        );
        if self.dma.start_adma(targets) {
            self.dma.run(0, Some(targets), self.id, ram, irq);
        }
    }

    /// Advance the transfer engine by `cycles` IOP cycles
    pub fn run_dma(&mut self, cycles: u32, ram: &mut SoundRam, irq: &mut SharedInterruptState) {
        let adma = self.adma_window();
        self.dma.run(cycles, adma, self.id, ram, irq);
    }

    /// Host-to-RAM transfer at TSA; the first burst runs immediately
    pub fn dma_write(&mut self, data: &[u16], ram: &mut SoundRam, irq: &mut SharedInterruptState) {
        if !self.adma_active() && self.attr.transfer_mode() != TransferMode::DmaWrite {
            log::trace!(
                "SPU2 core {} DMA write with transfer mode {:?}",
                self.id,
                self.attr.transfer_mode()
            );
        }

        let adma = self.adma_window();
        if self.dma.start_write(data, adma) {
            self.dma.run(0, adma, self.id, ram, irq);
        }
    }

    /// RAM-to-host transfer at TSA; refused while ADMA is active
    pub fn dma_read(
        &mut self,
        size: u32,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) -> bool {
        if self.adma_active() {
            log::warn!("SPU2 core {} DMA read refused while ADMA is active", self.id);
            return false;
        }

        self.dma.start_read(size);
        self.dma.run(0, None, self.id, ram, irq);
        true
    }

    /// Take the words produced by DMA reads
    pub fn take_dma_read_data(&mut self) -> Vec<u16> {
        self.dma.take_read_data()
    }

    // ========== Registers ==========

    /// Read a core-relative register
    pub fn read(&self, reg: u32, irq: &SharedInterruptState) -> u16 {
        if reg < 0x180 {
            let voice = (reg >> 4) as usize;
            return match self.voices[voice].read_reg(reg & 0xF) {
                Some(value) => value,
                None => self.unhandled_read(reg),
            };
        }

        if (0x1C0..0x2E0).contains(&reg) {
            let offset = reg - 0x1C0;
            let voice = (offset / 0xC) as usize;
            return match self.voices[voice].read_addr(offset % 0xC) {
                Some(value) => value,
                None => self.unhandled_read(reg),
            };
        }

        if (0x2E0..=0x33C).contains(&reg) {
            return match self.reverb.read_reg(reg) {
                Some(value) => value,
                None => self.unhandled_read(reg),
            };
        }

        match reg {
            0x180 => self.pmon.lo(),
            0x182 => self.pmon.hi(),
            0x184 => self.non.lo(),
            0x186 => self.non.hi(),
            0x188 => self.vmixl.lo(),
            0x18A => self.vmixl.hi(),
            0x18C => self.vmixel.lo(),
            0x18E => self.vmixel.hi(),
            0x190 => self.vmixr.lo(),
            0x192 => self.vmixr.hi(),
            0x194 => self.vmixer.lo(),
            0x196 => self.vmixer.hi(),
            0x198 => self.mmix.bits(),
            0x19A => self.attr.0,
            0x19C => (irq.irqa(self.id) >> 16) as u16,
            0x19E => irq.irqa(self.id) as u16,
            0x1A0 => self.kon.lo(),
            0x1A2 => self.kon.hi(),
            0x1A4 => self.koff.lo(),
            0x1A6 => self.koff.hi(),
            0x1A8 => self.dma.tsa().hi(),
            0x1AA => self.dma.tsa().lo(),
            0x1B0 => self.adma.bits(),
            0x340 => self.endx().lo(),
            0x342 => self.endx().hi(),
            0x344 => self.dma.statx.bits(),
            0x760 => self.mvol.left.level() as u16,
            0x762 => self.mvol.right.level() as u16,
            0x764 => self.evol.left as u16,
            0x766 => self.evol.right as u16,
            0x768 => self.avol.left as u16,
            0x76A => self.avol.right as u16,
            0x76C => self.bvol.left as u16,
            0x76E => self.bvol.right as u16,
            0x774 => self.reverb.v_iir as u16,
            0x776..=0x77C => self.reverb.v_comb[((reg - 0x776) / 2) as usize] as u16,
            0x77E => self.reverb.v_wall as u16,
            0x780 => self.reverb.v_apf1 as u16,
            0x782 => self.reverb.v_apf2 as u16,
            0x784 => self.reverb.v_in[0] as u16,
            0x786 => self.reverb.v_in[1] as u16,
            0x7C0 => self.spdif_conf.bits(),
            0x7C2 => irq.stat().bits(),
            0x7C6 => self.spdif_media.hi(),
            0x7C8 => self.spdif_media.lo(),
            _ => self.unhandled_read(reg),
        }
    }

    /// Write a core-relative register
    pub fn write(
        &mut self,
        reg: u32,
        value: u16,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) {
        log::trace!(
            "SPU2 core {} reg 0x{:03X} <- 0x{:04X}",
            self.id,
            reg,
            value
        );

        if reg < 0x180 {
            let voice = (reg >> 4) as usize;
            if !self.voices[voice].write_reg(reg & 0xF, value) {
                self.unhandled_write(reg, value);
            }
            return;
        }

        if (0x1C0..0x2E0).contains(&reg) {
            let offset = reg - 0x1C0;
            let voice = (offset / 0xC) as usize;
            if !self.voices[voice].write_addr(offset % 0xC, value) {
                self.unhandled_write(reg, value);
            }
            return;
        }

        if (0x2E0..=0x33C).contains(&reg) {
            if !self.reverb.write_reg(reg, value) {
                self.unhandled_write(reg, value);
            }
            return;
        }

        match reg {
            0x180 => {
                self.pmon.set_lo(value & !1);
                self.sync_voice_flags();
            }
            0x182 => {
                self.pmon.set_hi(value);
                self.sync_voice_flags();
            }
            0x184 => {
                self.non.set_lo(value);
                self.sync_voice_flags();
            }
            0x186 => {
                self.non.set_hi(value);
                self.sync_voice_flags();
            }
            0x188 => self.vmixl.set_lo(value),
            0x18A => self.vmixl.set_hi(value),
            0x18C => self.vmixel.set_lo(value),
            0x18E => self.vmixel.set_hi(value),
            0x190 => self.vmixr.set_lo(value),
            0x192 => self.vmixr.set_hi(value),
            0x194 => self.vmixer.set_lo(value),
            0x196 => self.vmixer.set_hi(value),
            0x198 => self.mmix = Mmix::from_bits_retain(value),
            0x19A => self.write_attr(value, irq),
            0x19C => irq.set_irqa_hi(self.id, value),
            0x19E => irq.set_irqa_lo(self.id, value),
            0x1A0 => self.kon.set_lo(value),
            0x1A2 => self.kon.set_hi(value),
            0x1A4 => self.koff.set_lo(value),
            0x1A6 => self.koff.set_hi(value),
            0x1A8 => self.dma.set_tsa_hi(value),
            0x1AA => self.dma.set_tsa_lo(value),
            0x1AC => self.dma.manual_write(ram, value),
            0x1B0 => {
                if value == 0 {
                    self.dma.reset_adma_count();
                }
                self.adma = AdmaCtrl::from_bits_retain(value);
                log::debug!("SPU2 core {} ADMA = 0x{:04X}", self.id, value);
            }
            0x340 => self.write_endx(value, false),
            0x342 => self.write_endx(value, true),
            0x344 => {
                log::trace!("SPU2 core {}: STATX is read-only", self.id);
            }
            0x760 => self.mvol.left.set(value),
            0x762 => self.mvol.right.set(value),
            0x764 => self.evol.left = value as i16,
            0x766 => self.evol.right = value as i16,
            0x768 => {
                self.avol.left = value as i16;
                self.sin_gain.left = self.avol.left;
            }
            0x76A => {
                self.avol.right = value as i16;
                self.sin_gain.right = self.avol.right;
            }
            0x76C => {
                self.bvol.left = value as i16;
                self.memin_gain.left = self.bvol.left;
            }
            0x76E => {
                self.bvol.right = value as i16;
                self.memin_gain.right = self.bvol.right;
            }
            0x774 => self.reverb.v_iir = value as i16,
            0x776..=0x77C => self.reverb.v_comb[((reg - 0x776) / 2) as usize] = value as i16,
            0x77E => self.reverb.v_wall = value as i16,
            0x780 => self.reverb.v_apf1 = value as i16,
            0x782 => self.reverb.v_apf2 = value as i16,
            0x784 => self.reverb.v_in[0] = value as i16,
            0x786 => self.reverb.v_in[1] = value as i16,
            0x7C0 => self.spdif_conf = SpdifConfig::from_bits_retain(value),
            0x7C2 => irq.set_stat(value),
            0x7C6 => self.spdif_media.set_hi(value),
            0x7C8 => self.spdif_media.set_lo(value),
            0x7CA => {}
            _ => self.unhandled_write(reg, value),
        }
    }

    fn write_attr(&mut self, value: u16, irq: &mut SharedInterruptState) {
        let attr = AttrReg(value);
        log::debug!(
            "SPU2 core {} ATTR=0x{:04X} core={} out={} ext={}/{} cd={}/{}",
            self.id,
            value,
            attr.core_enable(),
            attr.output_enable(),
            attr.ext_enable(),
            attr.ext_reverb(),
            attr.cd_enable(),
            attr.cd_reverb()
        );
        self.attr = attr;
        irq.set_enabled(self.id, self.attr.irq_enable());
        self.reverb.enabled = self.attr.effect_enable();
        self.noise.set_clock(self.attr.noise_clock());
    }

    fn sync_voice_flags(&mut self) {
        for (i, voice) in self.voices.iter_mut().enumerate() {
            voice.pitch_mod = self.pmon.get(i);
            voice.noise = self.non.get(i);
        }
    }

    fn endx(&self) -> VoiceMask {
        let mut mask = VoiceMask::default();
        for (i, voice) in self.voices.iter().enumerate() {
            mask.set(i, voice.endx);
        }
        mask
    }

    fn write_endx(&mut self, value: u16, hi: bool) {
        let mut mask = self.endx();
        if hi {
            mask.set_hi(value);
        } else {
            mask.set_lo(value);
        }
        for (i, voice) in self.voices.iter_mut().enumerate() {
            voice.endx = mask.get(i);
        }
    }

    fn unhandled_read(&self, reg: u32) -> u16 {
        log::error!("Unhandled SPU2 core {} read at 0x{:03X}", self.id, reg);
        debug_assert!(false, "unhandled SPU2 register read 0x{:03X}", reg);
        0
    }

    fn unhandled_write(&self, reg: u32, value: u16) {
        log::error!(
            "Unhandled SPU2 core {} write 0x{:04X} -> 0x{:03X}",
            self.id,
            value,
            reg
        );
        debug_assert!(false, "unhandled SPU2 register write 0x{:03X}", reg);
    }
}
