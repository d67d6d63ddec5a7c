//! Loudness measurement for Cantor
//!
//! This crate provides:
//! - ITU-R BS.1770 K-weighting with per-sample-rate coefficient caching
//! - Streaming integrated loudness (LUFS) with absolute and relative gating
//! - Sample peak detection
//! - ReplayGain 2.0 track and album gain calculation
//! - File analysis for the library scanner
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ AudioChunk  │ ──► │ Peak        │ ──► │ running peak     │
//! └─────────────┘     └─────────────┘     └──────────────────┘
//!        │
//!        ▼
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ K-weighting │ ──► │ 400 ms      │ ──► │ block powers     │
//! │ filter      │     │ blocks, 50% │     │ (> -70 LUFS)     │
//! └─────────────┘     └─────────────┘     └──────────────────┘
//!                                                  │
//!                                                  ▼
//!                                         ┌──────────────────┐
//!                                         │ relative gate    │
//!                                         │ → integrated     │
//!                                         └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cantor_loudness::{ReplayGainCalculator, Session};
//!
//! let mut session = Session::new(44100, 2, None);
//! session.add_frames(&audio_samples)?;
//! let info = session.finish()?;
//!
//! println!("Integrated loudness: {:.1} LUFS", info.integrated_lufs);
//!
//! if let Some(rg) = ReplayGainCalculator::new().track_gain(&info) {
//!     println!("Track gain: {:.2} dB", rg.safe_gain());
//! }
//! ```

#![deny(unsafe_code)]

mod analyzer;
mod channel;
mod coefficients;
mod error;
mod filter;
mod gating;
mod peak;
mod replaygain;
mod session;

pub use analyzer::{analyze_file, analyze_files, LoudnessInfo};
pub use channel::{Channel, ChannelMap};
pub use coefficients::{filter_coefficients, supports_sample_rate, FilterCoefficients};
pub use error::{LoudnessError, Result};
pub use filter::KWeightingFilter;
pub use gating::{integrated_loudness_from_powers, power_to_lufs};
pub use peak::{calculate_sample_peak, sample_peak_scalar};
pub use replaygain::{AlbumGain, ReplayGainCalculator, TrackGain};
pub use session::{
    integrated_loudness_multiple, measure_integrated_loudness, AudioChunk, Session, SessionState,
};

/// Duration of one analysis block in milliseconds
pub const BLOCK_DURATION_MS: f64 = 400.0;

/// Fraction of each block shared with the next one
///
/// EBU R128 momentary loudness uses 75%; stored ReplayGain values are
/// calibrated against 50%.
pub const BLOCK_OVERLAP: f64 = 0.5;

/// Blocks at or below this loudness are discarded as they are produced
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;

/// Relative gate, in LU below the ungated mean
pub const RELATIVE_GATE_LU: f64 = -10.0;

/// Offset in the BS.1770 power-to-loudness formula
pub const LUFS_OFFSET: f64 = -0.691;

/// Frames between flushes of near-denormal filter state
pub const DENORMAL_FLUSH_INTERVAL: usize = 16384;

/// Filter state below this magnitude is flushed to zero
pub const DENORMAL_THRESHOLD: f64 = 1e-15;

/// ReplayGain 2.0 reference loudness level (-18 LUFS)
pub const REPLAYGAIN_REFERENCE_LUFS: f64 = -18.0;

/// EBU R128 broadcast reference level (-23 LUFS)
pub const EBU_R128_BROADCAST_LUFS: f64 = -23.0;

/// EBU R128 streaming reference level (-14 LUFS, common for streaming platforms)
pub const EBU_R128_STREAMING_LUFS: f64 = -14.0;
