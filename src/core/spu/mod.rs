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

//! SPU2 (Sound Processing Unit 2) implementation
//!
//! The SPU2 is two SPU cores sharing 2MB of sound RAM:
//! - 24 voices per core with ADPCM decoding and Gaussian interpolation
//! - ADSR envelopes and sweepable volumes
//! - A reverb unit per core working in sound RAM
//! - DMA and auto-DMA (streamed PCM) transfer engines
//! - Capture buffers exposing intermediate mixes in RAM
//!
//! Core 0's output is fed into core 1 as its sound-in, and core 1's output is
//! the final 48kHz stereo stream.
//!
//! # Register Map (byte offsets from the SPU2 base)
//!
//! | Address Range | Target                                  |
//! |---------------|-----------------------------------------|
//! | 0x000-0x3FF   | Core 0 registers                        |
//! | 0x400-0x75F   | Core 1 registers (offset - 0x400)       |
//! | 0x760-0x787   | Core 0 volumes and reverb gains         |
//! | 0x788-0x7AF   | Core 1 volumes and reverb gains         |
//! | 0x7C0-0x7CA   | SPDIF and IRQ status (handled by core 0)|
//!
//! # Timing
//!
//! The IOP clock (36.864 MHz) drives [`Spu2::run`]; one sample is generated
//! every 768 cycles.

pub mod adpcm;
pub mod adsr;
pub mod dma;
pub mod gaussian;
pub mod irq;
pub mod noise;
pub mod output;
pub mod ram;
pub mod registers;
pub mod reverb;
pub mod spu_core;
pub mod vag;
pub mod voice;
pub mod volume;

pub use irq::SharedInterruptState;
pub use output::AudioSink;
pub use ram::SoundRam;
pub use spu_core::SpuCore;

use crate::core::error::Result;
use crate::core::interrupt::InterruptController;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// IOP cycles per output sample (36.864 MHz / 48 kHz)
pub const CYCLES_PER_SAMPLE: u32 = 768;

/// Output sample rate
pub const SAMPLE_RATE: u32 = 48_000;

/// One stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereoSample {
    pub left: i16,
    pub right: i16,
}

impl StereoSample {
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    /// Saturating sum of two samples
    #[inline]
    pub fn mix(self, other: StereoSample) -> Self {
        Self {
            left: self.left.saturating_add(other.left),
            right: self.right.saturating_add(other.right),
        }
    }

    /// Scale each channel by a signed 1.15 volume
    #[inline]
    pub fn volume(self, left: i16, right: i16) -> Self {
        Self {
            left: apply_volume(self.left, left),
            right: apply_volume(self.right, right),
        }
    }
}

/// Multiply a sample by a 1.15 volume with rounding, saturating to i16
#[inline(always)]
pub(crate) fn apply_volume(sample: i16, volume: i16) -> i16 {
    let product = (sample as i32 * volume as i32 + 0x4000) >> 15;
    product.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Split a byte offset into (core, core-relative register)
fn decode_address(addr: u32) -> (usize, u32) {
    match addr {
        0x000..=0x75F => (((addr >> 10) & 1) as usize, addr & 0x3FF),
        0x760..=0x787 => (0, addr),
        0x788..=0x7AF => (1, addr - 0x28),
        _ => (0, addr),
    }
}

/// SPU2 (both cores plus shared RAM and IRQ state)
///
/// # Example
///
/// ```
/// use spu2rx::core::spu::{Spu2, StereoSample};
///
/// let mut spu = Spu2::new();
/// let mut frames: Vec<StereoSample> = Vec::new();
/// spu.run(768 * 4, &mut frames);
/// assert_eq!(frames.len(), 4);
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct Spu2 {
    ram: SoundRam,

    cores: [SpuCore; 2],

    irq: SharedInterruptState,

    /// Cycles not yet converted into a sample, always below 768 between calls
    cycles: u64,
}

impl Spu2 {
    /// Create an SPU2 with zeroed RAM and both cores reset
    pub fn new() -> Self {
        Self {
            ram: SoundRam::new(),
            cores: [SpuCore::new(0), SpuCore::new(1)],
            irq: SharedInterruptState::new(),
            cycles: 0,
        }
    }

    /// Reset both cores; RAM contents survive
    pub fn reset(&mut self) {
        for core in &mut self.cores {
            core.reset(&mut self.irq);
        }
        self.cycles = 0;
    }

    /// Connect the IOP interrupt controller that receives SPU2 and DMA interrupts
    pub fn set_interrupt_controller(&mut self, controller: Rc<RefCell<InterruptController>>) {
        self.irq.set_controller(Some(controller));
    }

    pub fn ram(&self) -> &SoundRam {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut SoundRam {
        &mut self.ram
    }

    pub fn core(&self, index: usize) -> &SpuCore {
        &self.cores[index]
    }

    pub fn irq(&self) -> &SharedInterruptState {
        &self.irq
    }

    /// Read a register
    ///
    /// # Arguments
    ///
    /// * `addr` - Byte offset from the SPU2 base (0x000-0x7FF)
    pub fn read(&self, addr: u32) -> u16 {
        let (core, reg) = decode_address(addr);
        self.cores[core].read(reg, &self.irq)
    }

    /// Write a register
    ///
    /// # Arguments
    ///
    /// * `addr` - Byte offset from the SPU2 base (0x000-0x7FF)
    /// * `value` - Value to write
    pub fn write(&mut self, addr: u32, value: u16) {
        let (core, reg) = decode_address(addr);
        self.cores[core].write(reg, value, &mut self.ram, &mut self.irq);
    }

    /// Advance the SPU2 by `cycles` IOP cycles
    ///
    /// Both DMA engines are clocked first, then one sample is produced for
    /// every 768 accumulated cycles and pushed to `sink`.
    pub fn run<S: AudioSink + ?Sized>(&mut self, cycles: u32, sink: &mut S) {
        for core in 0..2 {
            self.run_dma(core, cycles);
        }

        for _ in 0..self.samples_due(cycles) {
            let frame = self.tick();
            sink.push(frame);
        }
    }

    /// Add `cycles` to the accumulator and take the whole samples it now holds
    fn samples_due(&mut self, cycles: u32) -> u64 {
        let per_sample = u64::from(CYCLES_PER_SAMPLE);
        self.cycles += u64::from(cycles);
        let due = self.cycles / per_sample;
        self.cycles %= per_sample;
        due
    }

    /// Generate one output sample: core 0, then core 1 with core 0 as sound-in
    pub fn tick(&mut self) -> StereoSample {
        let core0 =
            self.cores[0].gen_sample(StereoSample::default(), &mut self.ram, &mut self.irq);
        self.cores[1].gen_sample(core0, &mut self.ram, &mut self.irq)
    }

    /// Advance one core's DMA engine by `cycles` IOP cycles
    pub fn run_dma(&mut self, core: usize, cycles: u32) {
        self.cores[core].run_dma(cycles, &mut self.ram, &mut self.irq);
    }

    /// Start a host-to-RAM DMA transfer on `core` at its TSA
    pub fn dma_write(&mut self, core: usize, data: &[u16]) {
        self.cores[core].dma_write(data, &mut self.ram, &mut self.irq);
    }

    /// Start a RAM-to-host DMA transfer on `core` at its TSA
    ///
    /// Returns `false` when refused because ADMA is active on the core.
    pub fn dma_read(&mut self, core: usize, size: u32) -> bool {
        self.cores[core].dma_read(size, &mut self.ram, &mut self.irq)
    }

    /// Take the words produced so far by DMA reads on `core`
    pub fn take_dma_read_data(&mut self, core: usize) -> Vec<u16> {
        self.cores[core].take_dma_read_data()
    }

    /// Serialize the whole SPU2 state
    pub fn freeze(&self) -> Result<Vec<u8>> {
        let data = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        log::debug!("SPU2 state frozen ({} bytes)", data.len());
        Ok(data)
    }

    /// Restore state produced by [`Spu2::freeze`]
    ///
    /// The interrupt controller connection is kept.
    pub fn thaw(&mut self, data: &[u8]) -> Result<()> {
        let (mut state, _): (Spu2, usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        state.irq.set_controller(self.irq.controller().cloned());
        *self = state;
        log::debug!("SPU2 state restored");
        Ok(())
    }
}

impl Default for Spu2 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::registers::Mmix;
    use super::*;
    use crate::core::interrupt::dma_channels;

    #[test]
    fn test_apply_volume_rounds_and_saturates() {
        assert_eq!(apply_volume(0x4000, 0x7FFF), 0x4000);
        assert_eq!(apply_volume(0x4000, 0x4000), 0x2000);
        assert_eq!(apply_volume(i16::MIN, i16::MIN), i16::MAX);
        assert_eq!(apply_volume(1234, 0), 0);
    }

    #[test]
    fn test_stereo_mix_saturates() {
        let a = StereoSample::new(30000, -30000);
        let b = StereoSample::new(10000, -10000);
        assert_eq!(a.mix(b), StereoSample::new(i16::MAX, i16::MIN));
    }

    #[test]
    fn test_address_decode() {
        assert_eq!(decode_address(0x19A), (0, 0x19A));
        assert_eq!(decode_address(0x59A), (1, 0x19A));
        assert_eq!(decode_address(0x760), (0, 0x760));
        assert_eq!(decode_address(0x788), (1, 0x760));
        assert_eq!(decode_address(0x7AE), (1, 0x786));
        assert_eq!(decode_address(0x7C2), (0, 0x7C2));
    }

    #[test]
    fn test_run_produces_one_sample_per_768_cycles() {
        let mut spu = Spu2::new();
        let mut frames: Vec<StereoSample> = Vec::new();
        spu.run(700, &mut frames);
        assert!(frames.is_empty());
        spu.run(100, &mut frames);
        assert_eq!(frames.len(), 1);
        spu.run(768 * 10, &mut frames);
        assert_eq!(frames.len(), 11);
    }

    #[test]
    fn test_cycle_accumulator_takes_huge_steps() {
        let mut spu = Spu2::new();
        spu.cycles = 767;
        let total = 767 + u64::from(u32::MAX);
        assert_eq!(spu.samples_due(u32::MAX), total / 768);
        assert_eq!(spu.cycles, total % 768);

        let carried = spu.cycles + u64::from(u32::MAX);
        assert_eq!(spu.samples_due(u32::MAX), carried / 768);
        assert!(spu.cycles < 768);
    }

    #[test]
    fn test_core1_registers_reach_core1() {
        let mut spu = Spu2::new();
        spu.write(0x400 + 0x198, 0x0F00);
        spu.write(0x788, 0x1000);
        assert_eq!(spu.read(0x598), 0x0F00);
        assert_eq!(spu.read(0x198), 0);
        assert_eq!(spu.core(1).read(0x760, spu.irq()), 0x2000);
    }

    #[test]
    fn test_core0_output_feeds_core1_sound_in() {
        let mut spu = Spu2::new();
        // Core 0 passes mem-in through at full volume
        spu.ram_mut().write(0x2000, 0x3000);
        spu.ram_mut().write(0x2200, 0x1000);
        spu.write(0x76C, 0x7FFF);
        spu.write(0x76E, 0x7FFF);
        spu.write(0x198, 0x00C0);
        spu.write(0x760, 0x3FFF);
        spu.write(0x762, 0x3FFF);

        // Core 1 routes SIN to its output
        spu.write(0x400 + 0x198, 0x000C);
        spu.write(0x768 + 0x28, 0x7FFF);
        spu.write(0x76A + 0x28, 0x7FFF);
        spu.write(0x760 + 0x28, 0x3FFF);
        spu.write(0x762 + 0x28, 0x3FFF);

        let out = spu.tick();
        assert!((out.left as i32 - 0x3000).abs() <= 4, "{:?}", out);
        assert!((out.right as i32 - 0x1000).abs() <= 4, "{:?}", out);
    }

    #[test]
    fn test_input_lanes_pass_audio_before_avol_bvol_written() {
        let mut spu = Spu2::new();
        // Core 0 mem-in and core 1 sound-in routed, AVOL/BVOL untouched
        spu.ram_mut().load(0x2000, &[0x3000, 0x3000]);
        spu.ram_mut().write(0x2200, 0x1000);
        spu.write(0x198, (Mmix::MEMIN_L | Mmix::MEMIN_R).bits());
        spu.write(0x760, 0x3FFF);
        spu.write(0x762, 0x3FFF);
        spu.write(0x400 + 0x198, Mmix::SIN_L.bits());
        spu.write(0x760 + 0x28, 0x3FFF);
        spu.write(0x762 + 0x28, 0x3FFF);

        let out = spu.tick();
        assert!((out.left as i32 - 0x3000).abs() <= 4, "{:?}", out);
        assert_eq!(out.right, 0, "SIN_R not routed");

        // Registers still read back their reset value
        assert_eq!(spu.read(0x768 + 0x28), 0);
        assert_eq!(spu.read(0x76A + 0x28), 0);
        assert_eq!(spu.read(0x76C), 0);
        assert_eq!(spu.read(0x76E), 0);

        // Writing AVOL takes over the lane gain
        spu.write(0x768 + 0x28, 0);
        assert_eq!(spu.tick().left, 0);
    }

    #[test]
    fn test_dma_write_through_run_signals_dma7() {
        let controller = Rc::new(RefCell::new(InterruptController::new()));
        let mut spu = Spu2::new();
        spu.set_interrupt_controller(controller.clone());

        spu.write(0x400 + 0x1AA, 0x6000);
        let data = vec![0x1357u16; 96];
        spu.dma_write(1, &data);

        let mut frames: Vec<StereoSample> = Vec::new();
        spu.run(dma::CYCLES_PER_FIFO as u32 * 4, &mut frames);

        assert_eq!(spu.ram().read(0x6000 + 95), 0x1357);
        assert_eq!(controller.borrow().dma_completions(dma_channels::SPU2_CORE1), 1);
        assert_eq!(controller.borrow().dma_completions(dma_channels::SPU2_CORE0), 0);
    }

    #[test]
    fn test_dma_read_round_trip() {
        let mut spu = Spu2::new();
        spu.ram_mut().load(0x8000, &[1, 2, 3, 4]);
        spu.write(0x1AA, 0x8000);
        assert!(spu.dma_read(0, 32));
        let data = spu.take_dma_read_data(0);
        assert_eq!(&data[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_freeze_thaw_restores_state_and_keeps_controller() {
        let controller = Rc::new(RefCell::new(InterruptController::new()));
        let mut spu = Spu2::new();
        spu.set_interrupt_controller(controller.clone());
        spu.ram_mut().write(0x1234, 0xABCD);
        spu.write(0x1C2, 0x4000);
        spu.write(0x1A0, 0x0001);

        let state = spu.freeze().expect("freeze");

        let mut other = Spu2::new();
        other.set_interrupt_controller(controller.clone());
        other.thaw(&state).expect("thaw");

        assert_eq!(other.ram().read(0x1234), 0xABCD);
        assert_eq!(other.read(0x1C2), 0x4000);
        assert_eq!(other.read(0x1A0), 0x0001, "Pending KON survives");
        assert!(other.irq().controller().is_some());
    }

    #[test]
    fn test_thaw_rejects_garbage() {
        let mut spu = Spu2::new();
        assert!(spu.thaw(&[0xFF, 0x00, 0x12]).is_err());
    }

    #[test]
    fn test_reset_keeps_ram() {
        let mut spu = Spu2::new();
        spu.ram_mut().write(0x10, 0x55);
        spu.write(0x198, 0x0FFF);
        spu.reset();
        assert_eq!(spu.read(0x198), 0);
        assert_eq!(spu.ram().read(0x10), 0x55);
    }
}
