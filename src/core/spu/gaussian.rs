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

//! 4-tap Gaussian interpolation
//!
//! The table has 256 rows of 4 taps, selected by bits 4-11 of the voice's
//! pitch counter. It is generated once from a 512-point windowed sinc and
//! every row is scaled to sum to exactly 0x7F80.

use std::f64::consts::PI;
use std::sync::OnceLock;

/// Target sum of every table row
pub const ROW_SUM: i32 = 0x7F80;

type GaussTable = [[i16; 4]; 256];

static TABLE: OnceLock<GaussTable> = OnceLock::new();

fn build_table() -> GaussTable {
    let mut curve = [0f64; 512];
    for n in 0..512 {
        let k = 0.5 + n as f64;
        let s = (PI * k * 1.280 / 1024.0).sin();
        let t = ((PI * k * 2.0 / 1023.0).cos() - 1.0) * 0.5;
        let u = ((PI * k * 4.0 / 1023.0).cos() - 1.0) * 0.08;
        curve[511 - n] = s * (t + u + 1.0) / k;
    }

    let mut table = [[0i16; 4]; 256];
    for (i, row) in table.iter_mut().enumerate() {
        let taps = [curve[255 - i], curve[511 - i], curve[256 + i], curve[i]];
        let sum: f64 = taps.iter().sum();
        let scale = ROW_SUM as f64 / sum;

        let mut scaled = [0i32; 4];
        for (out, tap) in scaled.iter_mut().zip(taps) {
            *out = (tap * scale).round() as i32;
        }

        // Largest tap absorbs the rounding residue
        let residue = ROW_SUM - scaled.iter().sum::<i32>();
        let mut largest = 0;
        for j in 1..4 {
            if scaled[j] > scaled[largest] {
                largest = j;
            }
        }
        scaled[largest] += residue;

        for (out, value) in row.iter_mut().zip(scaled) {
            *out = value as i16;
        }
    }
    table
}

/// Interpolation table, built on first use
pub fn table() -> &'static GaussTable {
    TABLE.get_or_init(build_table)
}

/// Interpolate between four consecutive samples
///
/// # Arguments
///
/// * `samples` - Four samples, oldest first
/// * `counter` - Voice pitch counter (12-bit fraction)
#[inline]
pub fn interpolate(samples: [i16; 4], counter: u32) -> i16 {
    let row = &table()[((counter >> 4) & 0xFF) as usize];
    let sum: i32 = row
        .iter()
        .zip(samples)
        .map(|(&tap, sample)| tap as i32 * sample as i32)
        .sum();
    (sum >> 15).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_sum_to_constant() {
        for (i, row) in table().iter().enumerate() {
            let sum: i32 = row.iter().map(|&tap| tap as i32).sum();
            assert!((sum - ROW_SUM).abs() <= 1, "Row {} sums to 0x{:04X}", i, sum);
        }
    }

    #[test]
    fn test_row_zero_weights_second_sample() {
        let row = table()[0];
        assert!(row[1] > row[0] && row[1] > row[2] && row[1] > row[3]);
    }

    #[test]
    fn test_table_is_symmetric() {
        let t = table();
        for i in 0..256 {
            assert!((t[i][0] as i32 - t[255 - i][3] as i32).abs() <= 1);
            assert!((t[i][1] as i32 - t[255 - i][2] as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_dc_input_is_nearly_preserved() {
        for counter in [0u32, 0x400, 0x800, 0xFF0] {
            let out = interpolate([0x4000; 4], counter);
            // 0x4000 * 0x7F80 >> 15
            assert_eq!(out, 0x3FC0);
        }
    }

    #[test]
    fn test_interpolate_clamps() {
        assert!(interpolate([i16::MAX; 4], 0x800) <= i16::MAX);
        assert!(interpolate([i16::MIN; 4], 0x800) >= i16::MIN);
    }
}
