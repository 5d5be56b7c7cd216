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

//! SPU2 DMA and auto-DMA transfer engine
//!
//! Each core moves data between host memory and sound RAM in 32-word FIFO
//! bursts, one burst every 32 × 48 IOP cycles. The last burst of a transfer
//! raises the DMA-complete interrupt of the core's channel (DMA4 or DMA7).
//!
//! Auto-DMA (ADMA) streams audio into the core's mem-in buffer: every
//! half-buffer swap schedules 16 bursts, the first 8 into the left input
//! buffer and the last 8 into the right one.

use super::irq::SharedInterruptState;
use super::ram::{SoundRam, ADDRESS_MASK};
use super::registers::{Reg32, Statx};
use serde::{Deserialize, Serialize};

/// Words moved per burst
pub const FIFO_WORDS: u32 = 32;

/// IOP cycles between bursts
pub const CYCLES_PER_FIFO: i64 = 32 * 48;

/// Bursts per ADMA half-buffer refill
pub const ADMA_BURSTS: u32 = 16;

/// Transfer direction, fixed by the entry point that started it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaDirection {
    /// Host to sound RAM
    #[default]
    Write,
    /// Sound RAM to host
    Read,
}

/// Destination addresses for an ADMA refill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmaTargets {
    pub left: u32,
    pub right: u32,
}

/// Per-core DMA engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmaEngine {
    /// TSA register as written
    tsa: Reg32,

    /// Running transfer cursor
    cursor: u32,

    direction: DmaDirection,

    /// Words left in the current transfer
    remaining: u32,

    host: Vec<u16>,

    host_pos: usize,

    read_data: Vec<u16>,

    countdown: i64,

    /// Bursts are being clocked by `run`
    scheduled: bool,

    pub(crate) statx: Statx,

    /// ADMA bursts left in the current half-buffer refill
    buf_dma_count: u32,
}

impl DmaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tsa(&self) -> Reg32 {
        self.tsa
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn set_tsa_hi(&mut self, value: u16) {
        self.tsa.set_hi(value & 0xF);
        self.cursor = self.tsa.full();
    }

    pub fn set_tsa_lo(&mut self, value: u16) {
        self.tsa.set_lo(value);
        self.cursor = self.tsa.full();
    }

    /// Words still to be transferred
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn buf_dma_count(&self) -> u32 {
        self.buf_dma_count
    }

    /// ADMA register written with 0
    pub fn reset_adma_count(&mut self) {
        self.buf_dma_count = 0;
    }

    /// Manual transfer port: store one word at the cursor and post-increment
    pub fn manual_write(&mut self, ram: &mut SoundRam, value: u16) {
        ram.write(self.cursor, value);
        self.cursor = (self.cursor + 1) & ADDRESS_MASK;
    }

    /// Take everything DMA reads have produced so far
    pub fn take_read_data(&mut self) -> Vec<u16> {
        std::mem::take(&mut self.read_data)
    }

    fn begin(&mut self, direction: DmaDirection, size: u32) {
        self.direction = direction;
        self.remaining = size;
        self.countdown = 0;
        self.statx.insert(Statx::DMA_BUSY);
        self.statx.remove(Statx::DMA_REQUEST);
    }

    /// Start a host-to-RAM transfer
    ///
    /// With ADMA active the data only starts moving immediately if the
    /// current refill still needs bursts; otherwise it waits for the next
    /// half-buffer swap.
    pub fn start_write(&mut self, data: &[u16], adma: Option<AdmaTargets>) -> bool {
        self.begin(DmaDirection::Write, data.len() as u32);
        self.host = data.to_vec();
        self.host_pos = 0;

        log::debug!(
            "SPU2 DMA write: {} words to 0x{:05X}{}",
            data.len(),
            self.cursor,
            if adma.is_some() { " (ADMA)" } else { "" }
        );

        if adma.is_some() && self.buf_dma_count == 0 {
            self.scheduled = false;
            return false;
        }
        self.scheduled = true;
        true
    }

    /// Start a RAM-to-host transfer
    pub fn start_read(&mut self, size: u32) {
        self.begin(DmaDirection::Read, size);
        self.host.clear();
        self.host_pos = 0;
        self.scheduled = true;
        log::debug!("SPU2 DMA read: {} words from 0x{:05X}", size, self.cursor);
    }

    /// Begin an ADMA half-buffer refill
    ///
    /// A refill already in progress is left alone.
    pub fn start_adma(&mut self, targets: AdmaTargets) -> bool {
        if self.buf_dma_count > 0 {
            log::debug!(
                "SPU2 ADMA swap with {} bursts outstanding, not restarting",
                self.buf_dma_count
            );
            return false;
        }

        self.buf_dma_count = ADMA_BURSTS;
        self.cursor = targets.left;
        self.countdown = 0;
        self.scheduled = true;
        self.statx.insert(Statx::DMA_BUSY);
        self.statx.remove(Statx::DMA_REQUEST);
        true
    }

    /// Advance the burst countdown, transferring every burst that comes due
    ///
    /// # Arguments
    ///
    /// * `cycles` - IOP cycles elapsed
    /// * `adma` - Refill targets when ADMA is active for this core
    /// * `core` - Core index, selects the completion interrupt
    pub fn run(
        &mut self,
        cycles: u32,
        adma: Option<AdmaTargets>,
        core: usize,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) {
        if !self.scheduled {
            return;
        }

        self.countdown -= cycles as i64;
        while self.scheduled && self.countdown <= 0 {
            self.burst(adma, core, ram, irq);
        }
    }

    fn burst(
        &mut self,
        adma: Option<AdmaTargets>,
        core: usize,
        ram: &mut SoundRam,
        irq: &mut SharedInterruptState,
    ) {
        if self.remaining == 0 {
            self.finish();
            return;
        }

        if let Some(targets) = adma {
            if self.buf_dma_count == ADMA_BURSTS / 2 {
                self.cursor = targets.right;
            }
            if self.buf_dma_count == 0 {
                self.finish();
                return;
            }
            self.buf_dma_count -= 1;
        }

        let words = self.remaining.min(FIFO_WORDS);
        let last = self.cursor + FIFO_WORDS - 1;
        if last > ADDRESS_MASK {
            // Burst straddles the end of RAM
            irq.test_range(self.cursor, ADDRESS_MASK);
            irq.test_range(0, last & ADDRESS_MASK);
        } else {
            irq.test_range(self.cursor, last);
        }

        let direction = if adma.is_some() {
            DmaDirection::Write
        } else {
            self.direction
        };
        match direction {
            DmaDirection::Write => {
                for i in 0..words {
                    let word = self.host.get(self.host_pos).copied().unwrap_or(0);
                    ram.write(self.cursor + i, word);
                    self.host_pos += 1;
                }
            }
            DmaDirection::Read => {
                for i in 0..words {
                    self.read_data.push(ram.read(self.cursor + i));
                }
            }
        }

        self.cursor = (self.cursor + FIFO_WORDS) & ADDRESS_MASK;
        self.remaining -= words;

        if self.remaining == 0 {
            log::debug!("SPU2 core {} DMA complete", core);
            irq.signal_dma_complete(core);
        }

        self.countdown += CYCLES_PER_FIFO;
    }

    fn finish(&mut self) {
        self.statx.remove(Statx::DMA_BUSY);
        self.statx.insert(Statx::DMA_REQUEST);
        self.scheduled = false;
    }
}
