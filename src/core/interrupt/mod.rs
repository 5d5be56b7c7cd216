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

//! IOP Interrupt Controller (SPU2-facing surface)
//!
//! The SPU2 signals the IOP through two paths: its own interrupt line and the
//! DMA-complete interrupt of the channel serving each core. This controller
//! models the status/mask pair those signals land in, plus per-channel DMA
//! completion flags.
//!
//! ## Interrupt Sources Used Here
//!
//! ```text
//! Bit  | Source        | Raised by
//! -----|---------------|----------------------------------
//! 3    | DMA           | DMA4 (core 0) / DMA7 (core 1) completion
//! 9    | SPU2          | IRQA address match on either core
//! ```

use serde::{Deserialize, Serialize};

/// Interrupt source bit flags
pub mod interrupts {
    /// DMA transfer complete interrupt (bit 3)
    pub const DMA: u32 = 1 << 3;

    /// Sound processing unit interrupt (bit 9)
    pub const SPU2: u32 = 1 << 9;
}

/// IOP DMA channels that serve the SPU2 cores
pub mod dma_channels {
    /// Core 0 transfers
    pub const SPU2_CORE0: usize = 4;

    /// Core 1 transfers
    pub const SPU2_CORE1: usize = 7;
}

/// Interrupt controller
///
/// # Example
///
/// ```
/// use spu2rx::core::interrupt::{InterruptController, interrupts};
///
/// let mut ic = InterruptController::new();
/// ic.request(interrupts::SPU2);
/// ic.write_mask(interrupts::SPU2);
/// assert!(ic.is_pending());
///
/// ic.acknowledge(!interrupts::SPU2);
/// assert!(!ic.is_pending());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptController {
    /// Pending interrupt flags; writing 0 to a bit acknowledges it
    status: u32,

    /// 1 = interrupt enabled, 0 = masked
    mask: u32,

    /// Per-channel DMA completion flags (bit n = channel n)
    dma_flags: u8,

    /// Completions seen per channel since creation
    dma_completions: [u32; 8],
}

impl InterruptController {
    /// Create a new interrupt controller with everything cleared and masked
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an interrupt
    ///
    /// # Arguments
    ///
    /// * `interrupt` - Interrupt bit(s) to set (can be multiple ORed together)
    pub fn request(&mut self, interrupt: u32) {
        self.status |= interrupt;
        log::trace!(
            "IRQ requested: 0x{:08X}, status=0x{:08X}",
            interrupt,
            self.status
        );
    }

    /// Signal completion of a DMA channel
    ///
    /// Sets the channel's completion flag and raises the shared DMA interrupt.
    ///
    /// # Arguments
    ///
    /// * `channel` - IOP DMA channel number (0-7)
    pub fn request_dma(&mut self, channel: usize) {
        let channel = channel & 7;
        self.dma_flags |= 1 << channel;
        self.dma_completions[channel] += 1;
        log::debug!("DMA{} complete", channel);
        self.request(interrupts::DMA);
    }

    /// Acknowledge interrupts (bits written as 0 are cleared)
    pub fn acknowledge(&mut self, value: u32) {
        self.status &= value;
        log::trace!("IRQ acknowledged, status=0x{:08X}", self.status);
    }

    /// Clear a channel's DMA completion flag
    pub fn acknowledge_dma(&mut self, channel: usize) {
        self.dma_flags &= !(1 << (channel & 7));
    }

    /// Check if any unmasked interrupt is active
    pub fn is_pending(&self) -> bool {
        (self.status & self.mask) != 0
    }

    pub fn read_status(&self) -> u32 {
        self.status
    }

    pub fn read_mask(&self) -> u32 {
        self.mask
    }

    pub fn write_mask(&mut self, value: u32) {
        self.mask = value;
        log::debug!("IRQ mask set: 0x{:08X}", self.mask);
    }

    /// Whether the channel's completion flag is set
    pub fn dma_complete(&self, channel: usize) -> bool {
        self.dma_flags & (1 << (channel & 7)) != 0
    }

    /// Number of completions signalled on a channel
    pub fn dma_completions(&self, channel: usize) -> u32 {
        self.dma_completions[channel & 7]
    }
}
