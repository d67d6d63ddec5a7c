//! Streaming loudness measurement session
//!
//! A [`Session`] accepts interleaved audio in chunks of any size and keeps the
//! filter state, a partially filled analysis block per channel, the powers of
//! every block that passed the absolute gate, and the running sample peak.
//! How the stream is chunked has no effect on the result.

use crate::channel::ChannelMap;
use crate::coefficients::supports_sample_rate;
use crate::error::{LoudnessError, Result};
use crate::filter::KWeightingFilter;
use crate::gating::{gated_loudness, power_to_lufs};
use crate::peak::calculate_sample_peak;
use crate::{LoudnessInfo, ABSOLUTE_GATE_LUFS, BLOCK_DURATION_MS, BLOCK_OVERLAP};
use std::fmt;

/// Interleaved PCM samples with their stream format
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    /// Interleaved samples, one `f32` per channel per frame
    pub samples: &'a [f32],
    pub sample_rate: u32,
    pub channels: u32,
}

impl<'a> AudioChunk<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32, channels: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }
}

/// Lifecycle of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, no audio yet
    Created,
    /// At least one chunk has been processed
    Accumulating,
    /// Integrated loudness has been queried; more audio may still follow
    Finalized,
    /// Terminal; every further call fails with [`LoudnessError::SessionDisposed`]
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Accumulating => "accumulating",
            Self::Finalized => "finalized",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Collects filtered samples into overlapping blocks and keeps the powers of
/// blocks above the absolute gate
struct BlockAccumulator {
    frames_per_block: usize,
    frames_per_step: usize,
    /// Filled frames in each channel buffer
    fill: usize,
    /// One `frames_per_block`-long buffer per channel
    buffers: Vec<Vec<f64>>,
    weights: Vec<Option<f64>>,
    /// Append-only; never pruned by the relative gate
    block_powers: Vec<f64>,
}

impl BlockAccumulator {
    fn new(sample_rate: u32, weights: Vec<Option<f64>>) -> Self {
        let frames_per_block =
            (f64::from(sample_rate) * BLOCK_DURATION_MS / 1000.0).round() as usize;
        let frames_per_step = (frames_per_block as f64 * (1.0 - BLOCK_OVERLAP)).round() as usize;

        Self {
            frames_per_block,
            frames_per_step,
            fill: 0,
            buffers: vec![vec![0.0; frames_per_block]; weights.len()],
            weights,
            block_powers: Vec::new(),
        }
    }

    /// Frames that still fit into the current block
    fn remaining(&self) -> usize {
        self.frames_per_block - self.fill
    }

    /// Account for `frames` newly written frames, closing the block when full
    fn advance(&mut self, frames: usize) {
        self.fill += frames;
        if self.fill == self.frames_per_block {
            self.close_block();
        }
    }

    fn close_block(&mut self) {
        let energy: f64 = self
            .buffers
            .iter()
            .zip(&self.weights)
            .filter_map(|(buffer, weight)| {
                weight.map(|w| buffer.iter().map(|s| s * s).sum::<f64>() * w)
            })
            .sum();
        let power = energy / self.frames_per_block as f64;
        let lufs = power_to_lufs(power);

        let kept = lufs > ABSOLUTE_GATE_LUFS;
        if kept {
            self.block_powers.push(power);
        }
        tracing::trace!(
            "Block {}: {:.2} LUFS ({})",
            self.block_powers.len(),
            lufs,
            if kept { "kept" } else { "gated" }
        );

        // Carry the overlap region into the next block
        for buffer in &mut self.buffers {
            buffer.copy_within(self.frames_per_step.., 0);
        }
        self.fill = self.frames_per_block - self.frames_per_step;
    }
}

/// Streaming integrated loudness measurement for one audio stream
///
/// # Example
///
/// ```ignore
/// use cantor_loudness::Session;
///
/// let mut session = Session::new(44100, 2, None);
/// for chunk in decoded_chunks {
///     session.add_frames(&chunk)?;
/// }
/// println!("{:.1} LUFS, peak {:.3}", session.integrated_loudness()?, session.peak()?);
/// ```
///
/// A session is single-writer: it does no internal locking. Independent
/// sessions can run on separate threads.
pub struct Session {
    sample_rate: u32,
    channels: u32,
    channel_map: ChannelMap,
    filter: KWeightingFilter,
    blocks: BlockAccumulator,
    peak: f64,
    frames_processed: u64,
    state: SessionState,
}

impl Session {
    /// Create a session
    ///
    /// Without a channel map, the default layout for `channels` is used. A map
    /// whose length differs from `channels` is replaced by the default layout.
    /// Zero channels or a zero sample rate produce a session that measures
    /// nothing.
    pub fn new(sample_rate: u32, channels: u32, channel_map: Option<ChannelMap>) -> Self {
        let channel_map = match channel_map {
            Some(map) if map.len() == channels as usize => map,
            Some(map) => {
                tracing::warn!(
                    "Ignoring channel map with {} entries for {} channels, using default layout",
                    map.len(),
                    channels
                );
                ChannelMap::default_for(channels)
            }
            None => ChannelMap::default_for(channels),
        };

        if sample_rate != 0 && !supports_sample_rate(sample_rate) {
            tracing::warn!(
                "K-weighting is unstable at {} Hz, loudness values will be meaningless",
                sample_rate
            );
        }

        let filter = KWeightingFilter::new(sample_rate, channels as usize);
        let blocks = BlockAccumulator::new(sample_rate, channel_map.weights());

        tracing::debug!(
            "Loudness session: {} Hz, {} channels, block {} frames, step {} frames, map {:?}",
            sample_rate,
            channels,
            blocks.frames_per_block,
            blocks.frames_per_step,
            channel_map.as_slice()
        );

        Self {
            sample_rate,
            channels,
            channel_map,
            filter,
            blocks,
            peak: 0.0,
            frames_processed: 0,
            state: SessionState::Created,
        }
    }

    /// Create a session, rejecting a channel map of the wrong length
    pub fn try_new(
        sample_rate: u32,
        channels: u32,
        channel_map: Option<ChannelMap>,
    ) -> Result<Self> {
        if let Some(map) = &channel_map {
            if map.len() != channels as usize {
                return Err(LoudnessError::InvalidChannelMap {
                    expected: channels,
                    actual: map.len(),
                });
            }
        }
        Ok(Self::new(sample_rate, channels, channel_map))
    }

    /// Process one chunk of interleaved audio
    ///
    /// The chunk's sample rate and channel count are expected to match the
    /// session's; they are not used for processing. A trailing partial frame
    /// is ignored. Empty chunks are a no-op.
    pub fn process_chunk(&mut self, chunk: AudioChunk<'_>) -> Result<()> {
        self.ensure_usable()?;

        if chunk.sample_rate != self.sample_rate || chunk.channels != self.channels {
            tracing::warn!(
                "Chunk format {} Hz / {} ch differs from session format {} Hz / {} ch",
                chunk.sample_rate,
                chunk.channels,
                self.sample_rate,
                self.channels
            );
        }

        let channels = self.channels as usize;
        if chunk.samples.is_empty() || channels == 0 || self.blocks.frames_per_block == 0 {
            return Ok(());
        }

        let frames = chunk.samples.len() / channels;
        if chunk.samples.len() % channels != 0 {
            tracing::warn!(
                "Dropping {} trailing samples that do not form a full {}-channel frame",
                chunk.samples.len() % channels,
                channels
            );
        }
        let samples = &chunk.samples[..frames * channels];

        self.peak = self.peak.max(calculate_sample_peak(samples));

        let mut done = 0;
        while done < frames {
            let run = self.blocks.remaining().min(frames - done);
            self.filter.process(
                &samples[done * channels..(done + run) * channels],
                run,
                &mut self.blocks.buffers,
                self.blocks.fill,
            );
            self.blocks.advance(run);
            done += run;
        }

        self.frames_processed += frames as u64;
        self.state = SessionState::Accumulating;
        Ok(())
    }

    /// Process interleaved samples in the session's own format
    pub fn add_frames(&mut self, samples: &[f32]) -> Result<()> {
        self.process_chunk(AudioChunk::new(samples, self.sample_rate, self.channels))
    }

    /// Largest absolute sample value seen so far (linear)
    pub fn peak(&self) -> Result<f64> {
        self.ensure_usable()?;
        Ok(self.peak)
    }

    /// Gated integrated loudness of everything processed so far, in LUFS
    ///
    /// Negative infinity means no block passed gating. The value is recomputed
    /// on every call.
    pub fn integrated_loudness(&mut self) -> Result<f64> {
        self.ensure_usable()?;
        self.state = SessionState::Finalized;
        Ok(gated_loudness(&[&self.blocks.block_powers]))
    }

    /// Snapshot of the measurement
    pub fn finish(&mut self) -> Result<LoudnessInfo> {
        let integrated_lufs = self.integrated_loudness()?;
        let duration_seconds = if self.sample_rate == 0 {
            0.0
        } else {
            self.frames_processed as f64 / f64::from(self.sample_rate)
        };

        Ok(LoudnessInfo {
            integrated_lufs,
            sample_peak: self.peak,
            duration_seconds,
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_count: self.blocks.block_powers.len(),
        })
    }

    /// Mark the session unusable and release its buffers
    pub fn dispose(&mut self) {
        if self.state != SessionState::Disposed {
            tracing::trace!("Disposing loudness session after {} frames", self.frames_processed);
        }
        self.state = SessionState::Disposed;
        self.blocks.buffers = Vec::new();
        self.blocks.block_powers = Vec::new();
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Frames per analysis block
    pub fn block_frames(&self) -> usize {
        self.blocks.frames_per_block
    }

    /// Frames between the starts of consecutive blocks
    pub fn step_frames(&self) -> usize {
        self.blocks.frames_per_step
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Powers of the blocks that passed the absolute gate
    pub fn block_powers(&self) -> Result<&[f64]> {
        self.ensure_usable()?;
        Ok(&self.blocks.block_powers)
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Disposed => Err(LoudnessError::SessionDisposed),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("state", &self.state)
            .field("frames_processed", &self.frames_processed)
            .field("blocks", &self.blocks.block_powers.len())
            .field("peak", &self.peak)
            .finish()
    }
}

/// Integrated loudness of several sessions gated as one programme
///
/// The relative gate is computed over the blocks of all sessions together,
/// which is how album loudness is defined.
pub fn integrated_loudness_multiple(sessions: &[&Session]) -> Result<f64> {
    let groups = sessions
        .iter()
        .map(|s| s.block_powers())
        .collect::<Result<Vec<_>>>()?;
    Ok(gated_loudness(&groups))
}

/// Measure a whole buffer in one call
pub fn measure_integrated_loudness(
    samples: &[f32],
    sample_rate: u32,
    channels: u32,
    channel_map: Option<ChannelMap>,
) -> f64 {
    let mut session = Session::new(sample_rate, channels, channel_map);
    session
        .process_chunk(AudioChunk::new(samples, sample_rate, channels))
        .and_then(|()| session.integrated_loudness())
        .unwrap_or(f64::NEG_INFINITY)
}
