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

//! spu2rx-play entry point
//!
//! Loads an ADPCM sample into SPU2 RAM over DMA, keys it on in voice 0 of
//! core 0, and renders the mixed output of core 1 to a WAV file. Core 0's
//! output reaches core 1 through sound-in, the same path the console uses.

use clap::{Parser, ValueEnum};
use serde::Serialize;
use spu2rx::config::Config;
use spu2rx::core::spu::output::write_wav;
use spu2rx::core::spu::registers::{Mmix, Statx};
use spu2rx::core::spu::vag::AdpcmSample;
use spu2rx::core::spu::{AudioSink, Spu2, StereoSample, CYCLES_PER_SAMPLE, SAMPLE_RATE};
use std::path::PathBuf;

/// Where the sample is uploaded
const SAMPLE_ADDR: u32 = 0x5000;

/// Core 1 register block offset
const CORE1: u32 = 0x400;

/// Core 1 MVOL/AVOL live in the 0x788 block
const CORE1_VOLUMES: u32 = 0x28;

/// Frames generated per render step
const CHUNK_FRAMES: u32 = 1024;

/// ATTR: core enable + DMA write transfer mode
const ATTR_DMA_WRITE: u16 = 0x8020;
/// ATTR: effect enable
const ATTR_EFFECT: u16 = 0x0080;

#[derive(Parser, Debug)]
#[command(name = "spu2rx-play", version, about = "Render an ADPCM sample through the SPU2")]
struct Args {
    /// VAG file or raw ADPCM blocks
    input: PathBuf,

    /// Sample rate assumed for raw ADPCM input
    #[arg(long, default_value_t = SAMPLE_RATE)]
    raw_rate: u32,

    /// Voice pitch (hex), defaults to the sample's native rate
    #[arg(long, value_parser = parse_hex)]
    pitch: Option<u16>,

    /// ADSR1 register (hex)
    #[arg(long, value_parser = parse_hex, default_value = "000F")]
    adsr1: u16,

    /// ADSR2 register (hex)
    #[arg(long, value_parser = parse_hex, default_value = "1FC0")]
    adsr2: u16,

    /// Voice volume register for both channels (hex)
    #[arg(long, value_parser = parse_hex, default_value = "3FFF")]
    volume: u16,

    /// Seconds to render (overrides config)
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Output WAV file (overrides config)
    #[arg(short, long)]
    wav: Option<PathBuf>,

    /// Play through the default audio device while rendering
    #[arg(short, long)]
    play: bool,

    /// Reverb preset applied to core 0
    #[arg(long, value_enum, default_value_t = ReverbPreset::Off)]
    reverb: ReverbPreset,

    /// Write a JSON state report (overrides config)
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write a save state after rendering
    #[arg(long)]
    dump_state: Option<PathBuf>,

    /// Config file (defaults to $SPU2RX_CONFIG or ./spu2rx.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_hex(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{}': {}", s, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum ReverbPreset {
    Off,
    Room,
    Hall,
}

/// Reverb work area layout and coefficients
struct ReverbParams {
    /// Work area size in words, placed at the top of RAM
    size: u32,
    /// dAPF1..mRAPF2 in register order
    offsets: [u32; 22],
    /// vIIR, vCOMB1-4, vWALL, vAPF1, vAPF2, vLIN, vRIN
    coefficients: [u16; 10],
}

impl ReverbPreset {
    fn params(self) -> Option<ReverbParams> {
        match self {
            ReverbPreset::Off => None,
            ReverbPreset::Room => Some(ReverbParams {
                size: 0x1360,
                offsets: [
                    0x01F4, 0x016C, 0x1358, 0x0CCC, 0x0FC0, 0x089C, 0x0DD0, 0x07BC, 0x0CD0,
                    0x06D4, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
                    0x06D0, 0x04D8, 0x02E0, 0x0170,
                ],
                coefficients: [
                    0x6D80, 0x54B8, 0xBED0, 0x0000, 0x0000, 0xBA80, 0x5800, 0x5300, 0x8000,
                    0x8000,
                ],
            }),
            ReverbPreset::Hall => Some(ReverbParams {
                size: 0x56F0,
                offsets: [
                    0x0694, 0x04E4, 0x56E8, 0x46EC, 0x5308, 0x42F4, 0x46F0, 0x3704, 0x4700,
                    0x370C, 0x3700, 0x2704, 0x2F10, 0x1F04, 0x2800, 0x1B34, 0x2708, 0x1704,
                    0x1700, 0x1068, 0x09D0, 0x04E8,
                ],
                coefficients: [
                    0x6000, 0x5000, 0x4C00, 0xB800, 0xBC00, 0xC000, 0x6000, 0x5C00, 0x8000,
                    0x8000,
                ],
            }),
        }
    }
}

/// JSON summary written after rendering
#[derive(Serialize)]
struct StateReport {
    generated_at: chrono::DateTime<chrono::Local>,
    input: PathBuf,
    sample_name: String,
    sample_rate: u32,
    blocks: usize,
    pitch: u16,
    reverb: ReverbPreset,
    frames: usize,
    peak_left: i16,
    peak_right: i16,
    voice0_envx: u16,
    voice0_nax: u32,
    endx_core0: u32,
    irq_stat: u16,
    core_enabled: [bool; 2],
    output_enabled: [bool; 2],
}

/// Collects every frame and optionally feeds the playback ring
struct RenderSink {
    frames: Vec<StereoSample>,
    #[cfg(feature = "audio")]
    live: Option<spu2rx::core::spu::output::RingProducer>,
}

impl AudioSink for RenderSink {
    fn push(&mut self, sample: StereoSample) {
        self.frames.push(sample);
        #[cfg(feature = "audio")]
        {
            if let Some(live) = self.live.as_mut() {
                live.push(sample);
            }
        }
    }
}

fn upload_sample(spu: &mut Spu2, sample: &AdpcmSample) {
    spu.write(0x19A, ATTR_DMA_WRITE);
    spu.write(0x1A8, (SAMPLE_ADDR >> 16) as u16);
    spu.write(0x1AA, SAMPLE_ADDR as u16);
    spu.dma_write(0, &sample.data);

    while spu.read(0x344) & Statx::DMA_BUSY.bits() != 0 {
        spu.run_dma(0, CYCLES_PER_SAMPLE);
    }
    log::info!(
        "Uploaded {} words to 0x{:05X}",
        sample.data.len(),
        SAMPLE_ADDR
    );
}

fn apply_reverb(spu: &mut Spu2, params: &ReverbParams) {
    let eea = 0x000F_FFFF;
    let esa = eea + 1 - params.size;
    spu.write(0x2E0, (esa >> 16) as u16);
    spu.write(0x2E2, esa as u16);
    spu.write(0x33C, (eea >> 16) as u16);

    for (i, &offset) in params.offsets.iter().enumerate() {
        let reg = 0x2E4 + i as u32 * 4;
        spu.write(reg, (offset >> 16) as u16);
        spu.write(reg + 2, offset as u16);
    }
    for (i, &coefficient) in params.coefficients.iter().enumerate() {
        spu.write(0x774 + i as u32 * 2, coefficient);
    }

    spu.write(0x764, 0x3000);
    spu.write(0x766, 0x3000);
    spu.write(0x18C, 1);
    spu.write(0x194, 1);
    spu.write(0x19A, ATTR_DMA_WRITE | ATTR_EFFECT);
    log::info!("Reverb work area 0x{:05X}-0x{:05X}", esa, eea);
}

fn setup_voice(spu: &mut Spu2, args: &Args, pitch: u16) {
    spu.write(0x1C0, (SAMPLE_ADDR >> 16) as u16);
    spu.write(0x1C2, SAMPLE_ADDR as u16);
    spu.write(0x000, args.volume);
    spu.write(0x002, args.volume);
    spu.write(0x004, pitch);
    spu.write(0x006, args.adsr1);
    spu.write(0x008, args.adsr2);
    spu.write(0x188, 1);
    spu.write(0x190, 1);
}

fn setup_mixer(spu: &mut Spu2, reverb: bool) {
    let mut mmix = Mmix::VOICE_L | Mmix::VOICE_R;
    if reverb {
        mmix |= Mmix::VOICE_WET_L | Mmix::VOICE_WET_R;
    }
    spu.write(0x198, mmix.bits());
    spu.write(0x760, 0x3FFF);
    spu.write(0x762, 0x3FFF);

    spu.write(CORE1 + 0x19A, 0x8000);
    spu.write(CORE1 + 0x198, (Mmix::SIN_L | Mmix::SIN_R).bits());
    spu.write(0x768 + CORE1_VOLUMES, 0x7FFF);
    spu.write(0x76A + CORE1_VOLUMES, 0x7FFF);
    spu.write(0x760 + CORE1_VOLUMES, 0x3FFF);
    spu.write(0x762 + CORE1_VOLUMES, 0x3FFF);
}

#[cfg(feature = "audio")]
fn wait_for_ring(sink: &RenderSink, limit: usize) {
    if let Some(live) = sink.live.as_ref() {
        while live.len() > limit {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::discover(args.config.as_deref())?;

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .parse_default_env()
        .init();

    log::info!("Starting spu2rx-play...");

    let sample = AdpcmSample::load(&args.input, args.raw_rate)?;
    let pitch = args.pitch.unwrap_or_else(|| sample.pitch());
    let seconds = args.seconds.unwrap_or(config.render.seconds).max(0.0);
    let wav_path = args.wav.clone().unwrap_or(config.render.wav_path.clone());
    let report_path = args.report.clone().or(config.render.state_report.clone());
    let play = args.play || config.output.play;

    let mut spu = Spu2::new();
    upload_sample(&mut spu, &sample);
    setup_voice(&mut spu, &args, pitch);
    let reverb = args.reverb.params();
    if let Some(params) = reverb.as_ref() {
        apply_reverb(&mut spu, params);
    }
    setup_mixer(&mut spu, reverb.is_some());
    spu.write(0x1A0, 1);

    let total_frames = (seconds * SAMPLE_RATE as f64) as usize;
    let mut sink = RenderSink {
        frames: Vec::with_capacity(total_frames),
        #[cfg(feature = "audio")]
        live: None,
    };

    #[cfg(feature = "audio")]
    let _device = if play {
        let (producer, consumer) =
            spu2rx::core::spu::output::sample_ring(config.output.recover_threshold);
        let device = spu2rx::core::spu::output::CpalOutput::start(consumer)?;
        sink.live = Some(producer);
        Some(device)
    } else {
        None
    };
    #[cfg(not(feature = "audio"))]
    {
        if play {
            log::warn!("Built without the `audio` feature, playback disabled");
        }
    }

    log::info!(
        "Rendering {:.2}s at pitch 0x{:04X} (reverb: {:?})",
        seconds,
        pitch,
        args.reverb
    );

    while sink.frames.len() < total_frames {
        let step = (total_frames - sink.frames.len()).min(CHUNK_FRAMES as usize) as u32;
        spu.run(step * CYCLES_PER_SAMPLE, &mut sink);

        #[cfg(feature = "audio")]
        wait_for_ring(
            &sink,
            spu2rx::core::spu::output::RING_CAPACITY - CHUNK_FRAMES as usize,
        );
    }

    #[cfg(feature = "audio")]
    wait_for_ring(&sink, 0);

    write_wav(&wav_path, &sink.frames)?;

    if let Some(path) = report_path {
        let peak = |f: fn(&StereoSample) -> i16| {
            sink.frames
                .iter()
                .map(|s| f(s).saturating_abs())
                .max()
                .unwrap_or(0)
        };
        let report = StateReport {
            generated_at: chrono::Local::now(),
            input: args.input.clone(),
            sample_name: sample.name.clone(),
            sample_rate: sample.sample_rate,
            blocks: sample.blocks(),
            pitch,
            reverb: args.reverb,
            frames: sink.frames.len(),
            peak_left: peak(|s| s.left),
            peak_right: peak(|s| s.right),
            voice0_envx: spu.read(0x00A),
            voice0_nax: (spu.read(0x1C8) as u32) << 16 | spu.read(0x1CA) as u32,
            endx_core0: (spu.read(0x342) as u32) << 16 | spu.read(0x340) as u32,
            irq_stat: spu.read(0x7C2),
            core_enabled: [0, 1].map(|core| spu.core(core).attr().core_enable()),
            output_enabled: [0, 1].map(|core| spu.core(core).attr().output_enable()),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        log::info!("State report written to {}", path.display());
    }

    if let Some(path) = args.dump_state.as_ref() {
        std::fs::write(path, spu.freeze()?)?;
        log::info!("Save state written to {}", path.display());
    }

    Ok(())
}
