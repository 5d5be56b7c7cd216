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

//! Sample generator benchmarks

use criterion::{criterion_group, criterion_main, Criterion};
use spu2rx::core::spu::registers::Mmix;
use spu2rx::core::spu::{Spu2, StereoSample, CYCLES_PER_SAMPLE};
use std::hint::black_box;

/// Looping ADPCM block: filter 1, shift 3, loop start + loop end + repeat
const LOOP_BLOCK: [u16; 8] = [
    0x0713, 0x1357, 0x7531, 0x0F0F, 0x9ABC, 0x4321, 0x0000, 0xFFF0,
];

/// All 48 voices playing the same looping block, core 0 routed into core 1
fn busy_spu() -> Spu2 {
    let mut spu = Spu2::new();
    spu.ram_mut().load(0x5000, &LOOP_BLOCK);

    for core in 0..2u32 {
        let base = core * 0x400;
        for voice in 0..24u32 {
            let regs = base + voice * 0x10;
            spu.write(regs, 0x3FFF);
            spu.write(regs + 0x2, 0x3FFF);
            spu.write(regs + 0x4, 0x0C00 + voice as u16 * 0x40);
            spu.write(regs + 0x6, 0x000F);
            spu.write(regs + 0x8, 0x0000);
            let addr = base + 0x1C0 + voice * 0xC;
            spu.write(addr, 0x0000);
            spu.write(addr + 0x2, 0x5000);
        }
        spu.write(base + 0x188, 0xFFFF);
        spu.write(base + 0x18A, 0x00FF);
        spu.write(base + 0x190, 0xFFFF);
        spu.write(base + 0x192, 0x00FF);
        spu.write(
            base + 0x198,
            (Mmix::VOICE_L | Mmix::VOICE_R | Mmix::SIN_L | Mmix::SIN_R).bits(),
        );
        spu.write(base + 0x19A, 0x8000);
        spu.write(base + 0x1A0, 0xFFFF);
        spu.write(base + 0x1A2, 0x00FF);
    }
    spu.write(0x760, 0x3FFF);
    spu.write(0x762, 0x3FFF);
    spu.write(0x788, 0x3FFF);
    spu.write(0x78A, 0x3FFF);
    spu.write(0x790, 0x7FFF);
    spu.write(0x792, 0x7FFF);
    spu
}

fn bench_tick(c: &mut Criterion) {
    let mut spu = busy_spu();
    c.bench_function("spu2_tick_48_voices", |b| {
        b.iter(|| black_box(spu.tick()))
    });
}

fn bench_run_one_frame(c: &mut Criterion) {
    let mut spu = busy_spu();
    let mut frames: Vec<StereoSample> = Vec::with_capacity(800);
    c.bench_function("spu2_run_800_samples", |b| {
        b.iter(|| {
            frames.clear();
            spu.run(black_box(CYCLES_PER_SAMPLE * 800), &mut frames);
            black_box(frames.len())
        })
    });
}

criterion_group!(benches, bench_tick, bench_run_one_frame);
criterion_main!(benches);
