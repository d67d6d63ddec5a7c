//! Track loudness analysis
//!
//! Decodes audio files with Symphonia and streams every decoded packet into a
//! [`Session`]. Results are summarised in [`LoudnessInfo`], which is what the
//! library scanner stores and what ReplayGain values are derived from.

use crate::error::{LoudnessError, Result};
use crate::session::{AudioChunk, Session};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Information about the loudness characteristics of an audio track
#[derive(Debug, Clone, PartialEq)]
pub struct LoudnessInfo {
    /// Integrated loudness in LUFS, negative infinity if nothing passed gating
    pub integrated_lufs: f64,

    /// Sample peak as a linear amplitude
    pub sample_peak: f64,

    /// Duration of the analyzed audio in seconds
    pub duration_seconds: f64,

    /// Sample rate of the analyzed audio
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u32,

    /// Number of analysis blocks that passed the absolute gate
    pub block_count: usize,
}

impl LoudnessInfo {
    /// Sample peak in dBFS
    pub fn sample_peak_dbfs(&self) -> f64 {
        if self.sample_peak > 0.0 {
            20.0 * self.sample_peak.log10()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Check if the audio might clip when applying gain
    pub fn will_clip_at_gain(&self, gain_db: f64) -> bool {
        self.sample_peak_dbfs() + gain_db > 0.0
    }

    /// Calculate the maximum safe gain (to prevent clipping)
    pub fn max_safe_gain(&self) -> f64 {
        -self.sample_peak_dbfs()
    }

    /// Whether an integrated loudness could be measured
    pub fn is_measurable(&self) -> bool {
        self.integrated_lufs.is_finite()
    }
}

impl fmt::Display for LoudnessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loudness: {:.1} LUFS, Sample Peak: {:.1} dBFS, Duration: {:.1} s",
            self.integrated_lufs,
            self.sample_peak_dbfs(),
            self.duration_seconds
        )
    }
}

/// Analyze one audio file
///
/// # Errors
/// Returns [`LoudnessError::NoSamples`] if the file decodes to nothing and
/// [`LoudnessError::SilentAudio`] if no block passes gating.
pub fn analyze_file(path: impl AsRef<Path>) -> Result<LoudnessInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoudnessError::FileNotFound(path.display().to_string()));
    }

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| LoudnessError::UnsupportedFormat(format!("{}: {}", path.display(), e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| LoudnessError::UnsupportedFormat("No audio tracks found".to_string()))?;
    let track_id = track.id;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut session: Option<Session> = None;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count() as u32;
        let session = session.get_or_insert_with(|| Session::new(spec.rate, channels, None));

        let capacity = decoded.capacity() as u64;
        let buf = match &mut sample_buf {
            Some(buf) if buf.capacity() >= decoded.capacity() * spec.channels.count() => buf,
            slot => slot.insert(SampleBuffer::new(capacity, spec)),
        };
        buf.copy_interleaved_ref(decoded);

        session.process_chunk(AudioChunk::new(buf.samples(), spec.rate, channels))?;
    }

    let mut session = session.ok_or(LoudnessError::NoSamples)?;
    if session.frames_processed() == 0 {
        return Err(LoudnessError::NoSamples);
    }

    let info = session.finish()?;
    if !info.is_measurable() {
        return Err(LoudnessError::SilentAudio);
    }

    tracing::info!("Analyzed {}: {}", path.display(), info);
    Ok(info)
}

/// Analyze many files in parallel
///
/// Each file gets its own session on a rayon worker; results keep the input
/// order.
pub fn analyze_files<P>(paths: &[P]) -> Vec<(PathBuf, Result<LoudnessInfo>)>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            let result = analyze_file(path);
            if let Err(e) = &result {
                tracing::warn!("Loudness analysis failed for {}: {}", path.display(), e);
            }
            (path.to_path_buf(), result)
        })
        .collect()
}
