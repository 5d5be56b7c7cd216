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

//! ADPCM (Adaptive Differential Pulse Code Modulation) decoder
//!
//! Sound RAM holds samples as 8-word blocks: one header word followed by
//! seven data words of four 4-bit nibbles each (28 samples per block).
//!
//! ```text
//! Header word:
//!   bit 10    LoopStart   (block address becomes the loop address)
//!   bit 9     LoopRepeat  (keep playing after LoopEnd)
//!   bit 8     LoopEnd     (jump to the loop address after this block)
//!   bits 4-6  filter
//!   bits 0-3  shift
//! Data word:
//!   bits 0-3 first sample ... bits 12-15 fourth sample
//! ```

use serde::{Deserialize, Serialize};

/// Positive filter coefficients (in 1/64 units)
const FILTER_POS: [i32; 5] = [0, 60, 115, 98, 122];

/// Negative filter coefficients (in 1/64 units)
const FILTER_NEG: [i32; 5] = [0, 0, -52, -55, -60];

/// Samples decoded per data word
pub const SAMPLES_PER_WORD: usize = 4;

/// ADPCM block header word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdpcmHeader(pub u16);

impl AdpcmHeader {
    pub fn loop_start(self) -> bool {
        self.0 & (1 << 10) != 0
    }

    pub fn loop_repeat(self) -> bool {
        self.0 & (1 << 9) != 0
    }

    pub fn loop_end(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// Raw filter selector (bits 4-6), may exceed the table size
    pub fn raw_filter(self) -> u8 {
        ((self.0 >> 4) & 7) as u8
    }

    /// Filter selector clamped to the coefficient table
    pub fn filter(self) -> usize {
        self.raw_filter().min(4) as usize
    }

    pub fn raw_shift(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// Effective shift; reserved values 13-15 behave as 9
    pub fn shift(self) -> u32 {
        match self.raw_shift() {
            s @ 0..=12 => s as u32,
            _ => 9,
        }
    }

    /// Log reserved header fields once per block load
    pub fn check(self, voice: usize) {
        if self.raw_filter() > 4 {
            log::error!(
                "SPU2 voice {}: invalid ADPCM filter {} in header 0x{:04X}, using 4",
                voice,
                self.raw_filter(),
                self.0
            );
        }
        if self.raw_shift() > 12 {
            log::debug!(
                "SPU2 voice {}: reserved ADPCM shift {} in header 0x{:04X}",
                voice,
                self.raw_shift(),
                self.0
            );
        }
    }
}

/// Decoder history (the two previously decoded samples)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdpcmHistory {
    pub h1: i16,
    pub h2: i16,
}

impl AdpcmHistory {
    /// Decode one data word into four samples
    ///
    /// # Arguments
    ///
    /// * `header` - Header of the block the word belongs to
    /// * `word` - Data word holding four nibbles, lowest first
    ///
    /// # Returns
    ///
    /// Four PCM samples in playback order
    pub fn decode_word(&mut self, header: AdpcmHeader, word: u16) -> [i16; SAMPLES_PER_WORD] {
        let filter = header.filter();
        let shift = header.shift();
        let f0 = FILTER_POS[filter];
        let f1 = FILTER_NEG[filter];

        let mut out = [0i16; SAMPLES_PER_WORD];
        for (i, sample) in out.iter_mut().enumerate() {
            let nibble = ((word >> (4 * i)) & 0xF) as i16;
            // Sign-extend the nibble into the top of a 16-bit word
            let raw = ((nibble << 12) as i32) >> shift;
            let predicted = (f0 * self.h1 as i32 + f1 * self.h2 as i32 + 32) >> 6;
            let value = (raw + predicted).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

            self.h2 = self.h1;
            self.h1 = value;
            *sample = value;
        }
        out
    }
}

/// Capacity of a voice's decode buffer
pub const FIFO_CAPACITY: usize = 32;

/// Fixed-size ring of decoded samples waiting to be interpolated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeFifo {
    samples: [i16; FIFO_CAPACITY],
    read: usize,
    len: usize,
}

impl DecodeFifo {
    pub fn new() -> Self {
        Self {
            samples: [0; FIFO_CAPACITY],
            read: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.len = 0;
    }

    /// Append a sample; a full buffer drops the newest sample
    pub fn push(&mut self, sample: i16) {
        if self.len == FIFO_CAPACITY {
            log::warn!("SPU2 decode buffer overflow");
            return;
        }
        self.samples[(self.read + self.len) % FIFO_CAPACITY] = sample;
        self.len += 1;
    }

    /// Discard up to `count` of the oldest samples
    pub fn pop(&mut self, count: usize) {
        let count = count.min(self.len);
        self.read = (self.read + count) % FIFO_CAPACITY;
        self.len -= count;
    }

    /// Sample `index` positions after the oldest one (0 when not yet decoded)
    #[inline(always)]
    pub fn peek(&self, index: usize) -> i16 {
        if index < self.len {
            self.samples[(self.read + index) % FIFO_CAPACITY]
        } else {
            0
        }
    }
}

impl Default for DecodeFifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_flags() {
        let header = AdpcmHeader(0x0700 | 0x2C);
        assert!(header.loop_start());
        assert!(header.loop_repeat());
        assert!(header.loop_end());
        assert_eq!(header.filter(), 2);
        assert_eq!(header.shift(), 12);
    }

    #[test]
    fn test_invalid_filter_clamps_to_four() {
        let header = AdpcmHeader(0x0070);
        assert_eq!(header.raw_filter(), 7);
        assert_eq!(header.filter(), 4);
    }

    #[test]
    fn test_reserved_shift_behaves_as_nine() {
        let reserved = AdpcmHeader(0x000D);
        let nine = AdpcmHeader(0x0009);
        let mut a = AdpcmHistory::default();
        let mut b = AdpcmHistory::default();
        assert_eq!(a.decode_word(reserved, 0x7F18), b.decode_word(nine, 0x7F18));
    }

    #[test]
    fn test_filter_zero_scales_nibbles() {
        let mut history = AdpcmHistory::default();
        // Nibbles 1, 7, 8 (-8), F (-1), shift 0
        let samples = history.decode_word(AdpcmHeader(0x0000), 0xF871);
        assert_eq!(samples, [0x1000, 0x7000, -0x8000, -0x1000]);
    }

    #[test]
    fn test_shift_reduces_amplitude() {
        let mut history = AdpcmHistory::default();
        let samples = history.decode_word(AdpcmHeader(0x0004), 0x0001);
        assert_eq!(samples[0], 0x0100);
    }

    #[test]
    fn test_filter_one_uses_history() {
        let mut history = AdpcmHistory { h1: 640, h2: 0 };
        let samples = history.decode_word(AdpcmHeader(0x0010), 0x0000);
        // (60 * 640 + 32) >> 6 = 600
        assert_eq!(samples[0], 600);
        assert_eq!(history.h2, samples[2]);
        assert_eq!(history.h1, samples[3]);
    }

    #[test]
    fn test_decode_clamps() {
        let mut history = AdpcmHistory { h1: 32767, h2: -32768 };
        // Filter 4: 122 * 32767 + 60 * 32768 overflows the 16-bit range
        let samples = history.decode_word(AdpcmHeader(0x0040), 0x0007);
        assert_eq!(samples[0], i16::MAX);
    }

    #[test]
    fn test_fifo_push_pop_peek() {
        let mut fifo = DecodeFifo::new();
        for i in 0..5 {
            fifo.push(i);
        }
        assert_eq!(fifo.len(), 5);
        fifo.pop(2);
        assert_eq!(fifo.peek(0), 2);
        assert_eq!(fifo.peek(2), 4);
        assert_eq!(fifo.peek(3), 0, "Past the end reads as silence");
        fifo.pop(10);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_fifo_wraps() {
        let mut fifo = DecodeFifo::new();
        for round in 0..4 {
            for i in 0..20 {
                fifo.push(round * 100 + i);
            }
            assert_eq!(fifo.peek(0), round * 100);
            fifo.pop(20);
        }
    }

    proptest! {
        #[test]
        fn prop_zero_nibbles_filter_zero_decode_to_zero(h1 in any::<i16>(), h2 in any::<i16>(), shift in 0u16..16) {
            let mut history = AdpcmHistory { h1, h2 };
            let samples = history.decode_word(AdpcmHeader(shift), 0x0000);
            prop_assert_eq!(samples, [0; 4]);
        }

        #[test]
        fn prop_history_tracks_last_two(header in any::<u16>(), word in any::<u16>(), h1 in any::<i16>(), h2 in any::<i16>()) {
            let mut history = AdpcmHistory { h1, h2 };
            let samples = history.decode_word(AdpcmHeader(header), word);
            prop_assert_eq!(history.h1, samples[3]);
            prop_assert_eq!(history.h2, samples[2]);
        }
    }
}
