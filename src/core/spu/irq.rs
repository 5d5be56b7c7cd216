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

//! IRQ state shared by both SPU2 cores
//!
//! Every sound RAM access made by either core is compared against the IRQ
//! address of *both* cores, so the address/enable pairs and the status word
//! live outside the cores and are lent to whichever core is running.

use super::registers::IrqStat;
use crate::core::interrupt::{dma_channels, interrupts, InterruptController};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// IRQA value after reset
pub const IRQA_RESET: u32 = 0x800;

/// IRQ addresses, enables and status shared by both cores
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedInterruptState {
    irqa: [u32; 2],

    enabled: [bool; 2],

    stat: IrqStat,

    #[serde(skip)]
    controller: Option<Rc<RefCell<InterruptController>>>,
}

impl SharedInterruptState {
    pub fn new() -> Self {
        Self {
            irqa: [IRQA_RESET; 2],
            ..Self::default()
        }
    }

    /// Connect the IOP interrupt controller
    pub fn set_controller(&mut self, controller: Option<Rc<RefCell<InterruptController>>>) {
        self.controller = controller;
    }

    pub fn controller(&self) -> Option<&Rc<RefCell<InterruptController>>> {
        self.controller.as_ref()
    }

    /// Reset one core's share of the state
    pub fn reset_core(&mut self, core: usize) {
        self.irqa[core] = IRQA_RESET;
        self.enabled[core] = false;
        self.stat.remove(IrqStat::cause(core) | IrqStat::BUFFER_HALF);
    }

    pub fn irqa(&self, core: usize) -> u32 {
        self.irqa[core]
    }

    pub fn set_irqa_hi(&mut self, core: usize, value: u16) {
        self.irqa[core] = (((value as u32) & 0xF) << 16) | (self.irqa[core] & 0xFFFF);
    }

    pub fn set_irqa_lo(&mut self, core: usize, value: u16) {
        self.irqa[core] = (self.irqa[core] & 0xF_0000) | value as u32;
    }

    pub fn enabled(&self, core: usize) -> bool {
        self.enabled[core]
    }

    /// Update a core's IRQ enable; disabling clears that core's cause bit
    pub fn set_enabled(&mut self, core: usize, enabled: bool) {
        self.enabled[core] = enabled;
        if !enabled {
            self.stat.remove(IrqStat::cause(core));
        }
    }

    pub fn stat(&self) -> IrqStat {
        self.stat
    }

    pub fn set_stat(&mut self, value: u16) {
        self.stat = IrqStat::from_bits_retain(value);
    }

    /// Track which capture buffer half is being written
    pub fn set_buffer_half(&mut self, upper: bool) {
        self.stat.set(IrqStat::BUFFER_HALF, upper);
    }

    /// Compare an address against both cores' IRQA and fire on match
    #[inline]
    pub fn test_address(&mut self, addr: u32) {
        for core in 0..2 {
            if self.enabled[core] && self.irqa[core] == addr {
                self.raise(core);
            }
        }
    }

    /// Compare an inclusive address range against both cores' IRQA
    pub fn test_range(&mut self, start: u32, end: u32) {
        for core in 0..2 {
            if self.enabled[core] && (start..=end).contains(&self.irqa[core]) {
                self.raise(core);
            }
        }
    }

    /// Set the core's cause bit and signal the SPU2 interrupt
    pub fn raise(&mut self, core: usize) {
        log::debug!(
            "SPU2 IRQ on core {} at IRQA=0x{:05X}",
            core,
            self.irqa[core]
        );
        self.stat.insert(IrqStat::cause(core));
        if let Some(controller) = &self.controller {
            controller.borrow_mut().request(interrupts::SPU2);
        }
    }

    /// Signal the DMA-complete interrupt of the channel serving `core`
    pub fn signal_dma_complete(&mut self, core: usize) {
        let channel = if core == 0 {
            dma_channels::SPU2_CORE0
        } else {
            dma_channels::SPU2_CORE1
        };
        if let Some(controller) = &self.controller {
            controller.borrow_mut().request_dma(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> (SharedInterruptState, Rc<RefCell<InterruptController>>) {
        let controller = Rc::new(RefCell::new(InterruptController::new()));
        let mut irq = SharedInterruptState::new();
        irq.set_controller(Some(controller.clone()));
        (irq, controller)
    }

    #[test]
    fn test_reset_irqa() {
        let irq = SharedInterruptState::new();
        assert_eq!(irq.irqa(0), 0x800);
        assert_eq!(irq.irqa(1), 0x800);
    }

    #[test]
    fn test_disabled_core_never_fires() {
        let (mut irq, controller) = connected();
        irq.test_address(0x800);
        assert!(irq.stat().is_empty());
        assert_eq!(controller.borrow().read_status(), 0);
    }

    #[test]
    fn test_match_fires_correct_core() {
        let (mut irq, controller) = connected();
        irq.set_irqa_hi(1, 0x0001);
        irq.set_irqa_lo(1, 0x2345);
        irq.set_enabled(1, true);
        irq.test_address(0x1_2345);
        assert_eq!(irq.stat(), IrqStat::CAUSE_C1);
        assert_eq!(controller.borrow().read_status(), interrupts::SPU2);
    }

    #[test]
    fn test_disable_clears_cause() {
        let (mut irq, _controller) = connected();
        irq.set_enabled(0, true);
        irq.test_range(0x7F0, 0x80F);
        assert!(irq.stat().contains(IrqStat::CAUSE_C0));
        irq.set_enabled(0, false);
        assert!(!irq.stat().contains(IrqStat::CAUSE_C0));
    }

    #[test]
    fn test_dma_complete_channels() {
        let (mut irq, controller) = connected();
        irq.signal_dma_complete(0);
        irq.signal_dma_complete(1);
        assert_eq!(controller.borrow().dma_completions(dma_channels::SPU2_CORE0), 1);
        assert_eq!(controller.borrow().dma_completions(dma_channels::SPU2_CORE1), 1);
    }
}
