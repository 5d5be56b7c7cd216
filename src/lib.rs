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

//! spu2rx: A PlayStation 2 SPU2 emulator
//!
//! This crate emulates the PS2 sound processor: two cores of 24 ADPCM
//! voices each, sharing 2MB of sound RAM, with reverb, auto-DMA streaming
//! and a 48kHz stereo output.
//!
//! # Architecture
//!
//! - [`core::spu`]: The SPU2 itself (voices, envelopes, reverb, DMA, output)
//! - [`core::interrupt`]: Host interrupt controller and the SPU2 IRQ latch
//! - [`config`]: TOML configuration for the `spu2rx-play` binary
//!
//! # Example
//!
//! ```no_run
//! use spu2rx::core::spu::{Spu2, StereoSample, CYCLES_PER_SAMPLE};
//!
//! let mut spu = Spu2::new();
//! let mut frames: Vec<StereoSample> = Vec::new();
//! spu.run(CYCLES_PER_SAMPLE * 48_000, &mut frames);
//! assert_eq!(frames.len(), 48_000);
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, EmulatorError>`.

pub mod config;
pub mod core;

// Re-export commonly used types
pub use core::error::{EmulatorError, Result};
