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

//! Audio output hand-off
//!
//! The emulation thread pushes frames into a bounded single-producer /
//! single-consumer ring; the audio thread drains it. Neither side blocks:
//! a full ring drops new frames, and an underrun plays silence until the
//! ring has refilled past the recovery threshold.

use super::{StereoSample, SAMPLE_RATE};
use crate::core::error::Result;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Frames held by the ring
pub const RING_CAPACITY: usize = 0x2000;

const RING_MASK: usize = RING_CAPACITY - 1;

/// Buffered frames required to leave the underrun state
pub const DEFAULT_RECOVER_THRESHOLD: usize = 0x1000;

/// Destination for generated frames
pub trait AudioSink {
    fn push(&mut self, sample: StereoSample);
}

impl AudioSink for Vec<StereoSample> {
    fn push(&mut self, sample: StereoSample) {
        Vec::push(self, sample);
    }
}

#[inline]
fn pack(sample: StereoSample) -> u32 {
    (sample.left as u16 as u32) | ((sample.right as u16 as u32) << 16)
}

#[inline]
fn unpack(value: u32) -> StereoSample {
    StereoSample::new(value as u16 as i16, (value >> 16) as u16 as i16)
}

struct Ring {
    frames: Box<[AtomicU32]>,
    read: AtomicUsize,
    write: AtomicUsize,
}

impl Ring {
    fn len(&self) -> usize {
        self.write
            .load(Ordering::Acquire)
            .wrapping_sub(self.read.load(Ordering::Acquire))
    }
}

/// Create a connected producer/consumer pair
///
/// # Arguments
///
/// * `recover_threshold` - Frames that must be buffered before playback
///   resumes after an underrun (clamped to the ring capacity)
pub fn sample_ring(recover_threshold: usize) -> (RingProducer, RingConsumer) {
    let ring = Arc::new(Ring {
        frames: (0..RING_CAPACITY).map(|_| AtomicU32::new(0)).collect(),
        read: AtomicUsize::new(0),
        write: AtomicUsize::new(0),
    });

    let producer = RingProducer {
        ring: ring.clone(),
        overrun: false,
    };
    let consumer = RingConsumer {
        ring,
        underrun: true,
        recover_threshold: recover_threshold.min(RING_CAPACITY - 1),
    };
    (producer, consumer)
}

/// Emulation-side end of the ring
pub struct RingProducer {
    ring: Arc<Ring>,
    overrun: bool,
}

impl RingProducer {
    /// Frames currently buffered
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AudioSink for RingProducer {
    fn push(&mut self, sample: StereoSample) {
        if self.ring.len() >= RING_CAPACITY {
            if !self.overrun {
                log::warn!("Audio buffer overrun, dropping frames");
                self.overrun = true;
            }
            return;
        }
        if self.overrun {
            log::debug!("Audio buffer overrun cleared");
            self.overrun = false;
        }

        let write = self.ring.write.load(Ordering::Relaxed);
        self.ring.frames[write & RING_MASK].store(pack(sample), Ordering::Relaxed);
        self.ring
            .write
            .store(write.wrapping_add(1), Ordering::Release);
    }
}

/// Audio-thread end of the ring
pub struct RingConsumer {
    ring: Arc<Ring>,
    underrun: bool,
    recover_threshold: usize,
}

impl RingConsumer {
    /// Frames currently buffered
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Still refilling after an underrun (output is silence)
    pub fn is_recovering(&self) -> bool {
        self.underrun
    }

    /// Fill `out` with buffered frames, or silence while recovering
    pub fn fill(&mut self, out: &mut [StereoSample]) {
        let mut available = self.ring.len();

        if available < out.len() && !self.underrun {
            log::warn!("Audio buffer underrun, rebuilding buffer");
            self.underrun = true;
        }

        if self.underrun && available > self.recover_threshold {
            log::debug!("Audio buffer refilled ({} frames)", available);
            self.underrun = false;
        }

        if self.underrun {
            out.fill(StereoSample::default());
            return;
        }

        let mut read = self.ring.read.load(Ordering::Relaxed);
        for slot in out.iter_mut() {
            if available > 0 {
                *slot = unpack(self.ring.frames[read & RING_MASK].load(Ordering::Relaxed));
                read = read.wrapping_add(1);
                available -= 1;
            } else {
                *slot = StereoSample::default();
            }
        }
        self.ring.read.store(read, Ordering::Release);
    }
}

/// Write frames to a 16-bit stereo 48kHz WAV file
pub fn write_wav<P: AsRef<Path>>(path: P, frames: &[StereoSample]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for frame in frames {
        writer.write_sample(frame.left)?;
        writer.write_sample(frame.right)?;
    }
    writer.finalize()?;

    log::info!(
        "Wrote {} frames to {}",
        frames.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(feature = "audio")]
pub use self::device::CpalOutput;

#[cfg(feature = "audio")]
mod device {
    use super::{RingConsumer, StereoSample, SAMPLE_RATE};
    use crate::core::error::{EmulatorError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    /// Host audio stream draining a [`RingConsumer`]
    pub struct CpalOutput {
        _stream: cpal::Stream,
    }

    impl CpalOutput {
        /// Open the default output device at 48kHz stereo and start playback
        pub fn start(mut consumer: RingConsumer) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| EmulatorError::Audio("no output device available".to_string()))?;

            log::info!(
                "Audio: {} @ {} Hz",
                device.name().unwrap_or_default(),
                SAMPLE_RATE
            );

            let config = cpal::StreamConfig {
                channels: 2,
                sample_rate: cpal::SampleRate(SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let mut frames = Vec::new();
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        frames.resize(data.len() / 2, StereoSample::default());
                        consumer.fill(&mut frames);
                        for (out, frame) in data.chunks_exact_mut(2).zip(&frames) {
                            out[0] = frame.left;
                            out[1] = frame.right;
                        }
                    },
                    |err| log::error!("Audio stream error: {}", err),
                    None,
                )
                .map_err(|e| EmulatorError::Audio(e.to_string()))?;

            stream
                .play()
                .map_err(|e| EmulatorError::Audio(e.to_string()))?;

            Ok(Self { _stream: stream })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: i16) -> StereoSample {
        StereoSample::new(n, -n)
    }

    #[test]
    fn test_pack_preserves_sign() {
        let sample = StereoSample::new(-1, i16::MIN);
        assert_eq!(unpack(pack(sample)), sample);
    }

    #[test]
    fn test_starts_recovering_then_plays() {
        let (mut producer, mut consumer) = sample_ring(4);
        let mut out = [StereoSample::default(); 2];

        for n in 1..=3 {
            producer.push(frame(n));
        }
        consumer.fill(&mut out);
        assert!(consumer.is_recovering(), "Needs more than 4 frames");
        assert_eq!(out, [StereoSample::default(); 2]);

        for n in 4..=5 {
            producer.push(frame(n));
        }
        consumer.fill(&mut out);
        assert!(!consumer.is_recovering());
        assert_eq!(out, [frame(1), frame(2)]);
        assert_eq!(consumer.len(), 3);
    }

    #[test]
    fn test_underrun_pads_silence_and_recovers() {
        let (mut producer, mut consumer) = sample_ring(2);
        for n in 1..=3 {
            producer.push(frame(n));
        }
        let mut out = [StereoSample::default(); 2];
        consumer.fill(&mut out);
        assert_eq!(out, [frame(1), frame(2)]);

        // One frame left, two requested: underrun
        consumer.fill(&mut out);
        assert!(consumer.is_recovering());
        assert_eq!(out, [StereoSample::default(); 2]);

        for n in 4..=5 {
            producer.push(frame(n));
        }
        consumer.fill(&mut out);
        assert!(!consumer.is_recovering());
        assert_eq!(out, [frame(3), frame(4)]);
    }

    #[test]
    fn test_overrun_drops_newest() {
        let (mut producer, mut consumer) = sample_ring(0);
        for n in 0..(RING_CAPACITY + 10) {
            producer.push(frame((n & 0x7FFF) as i16));
        }
        assert_eq!(producer.len(), RING_CAPACITY);

        let mut out = vec![StereoSample::default(); RING_CAPACITY];
        consumer.fill(&mut out);
        assert_eq!(out[0], frame(0));
        assert_eq!(out[RING_CAPACITY - 1], frame((RING_CAPACITY - 1) as i16));
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<StereoSample> = Vec::new();
        AudioSink::push(&mut sink, frame(7));
        assert_eq!(sink, vec![frame(7)]);
    }

    #[test]
    fn test_write_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let frames: Vec<StereoSample> = (0..100).map(|n| frame(n * 100)).collect();
        write_wav(&path, &frames).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 200);
        assert_eq!(samples[2], 100);
        assert_eq!(samples[3], -100);
    }
}
