//! ReplayGain 2.0 calculation
//!
//! ReplayGain 2.0 uses -18 LUFS as the reference level.
//!
//! # Gain Calculation
//!
//! - Track Gain = Reference Level (-18 LUFS) - Track Integrated Loudness
//! - Album Gain = Reference Level (-18 LUFS) - Album Integrated Loudness
//!
//! Album loudness gates the blocks of all tracks together rather than
//! averaging per-track values.
//!
//! # Peak Values
//!
//! Peaks are linear sample peaks. Applying a gain clips when
//! `peak * 10^(gain / 20) > 1.0`.

use crate::error::Result;
use crate::session::{integrated_loudness_multiple, Session};
use crate::{LoudnessInfo, REPLAYGAIN_REFERENCE_LUFS};

/// Largest gain in dB that keeps `peak` at or below full scale
fn headroom_db(peak: f64) -> f64 {
    if peak > 0.0 {
        -20.0 * peak.log10()
    } else {
        f64::INFINITY
    }
}

fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// ReplayGain values for a single track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackGain {
    /// Gain in dB, negative for tracks louder than the reference
    pub gain_db: f64,
    /// Linear sample peak
    pub peak: f64,
    /// Measured integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// Reference the gain was computed against
    pub reference_lufs: f64,
}

impl TrackGain {
    /// Whether the full gain pushes the peak past full scale
    pub fn would_clip(&self) -> bool {
        self.gain_db > headroom_db(self.peak)
    }

    /// Gain capped at the available headroom
    pub fn safe_gain(&self) -> f64 {
        self.gain_db.min(headroom_db(self.peak))
    }

    /// Gain as an amplitude factor
    pub fn linear_gain(&self) -> f64 {
        db_to_linear(self.gain_db)
    }

    /// Capped gain as an amplitude factor
    pub fn safe_linear_gain(&self) -> f64 {
        db_to_linear(self.safe_gain())
    }
}

/// ReplayGain values for a set of tracks played as one album
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumGain {
    /// Gain in dB shared by every track of the album
    pub gain_db: f64,
    /// Maximum sample peak across all tracks (linear)
    pub peak: f64,
    /// Integrated loudness of all tracks gated together, in LUFS
    pub integrated_lufs: f64,
    /// Number of tracks pooled
    pub track_count: usize,
    /// Reference the gain was computed against
    pub reference_lufs: f64,
}

impl AlbumGain {
    /// Whether the album gain clips the loudest track
    pub fn would_clip(&self) -> bool {
        self.gain_db > headroom_db(self.peak)
    }

    /// Album gain capped at the headroom of the loudest peak
    pub fn safe_gain(&self) -> f64 {
        self.gain_db.min(headroom_db(self.peak))
    }

    /// Capped gain as an amplitude factor
    pub fn safe_linear_gain(&self) -> f64 {
        db_to_linear(self.safe_gain())
    }
}

/// Derives track and album gains relative to a reference loudness
pub struct ReplayGainCalculator {
    /// Target loudness in LUFS
    reference_lufs: f64,
}

impl ReplayGainCalculator {
    /// Calculator targeting the ReplayGain 2.0 reference
    pub fn new() -> Self {
        Self {
            reference_lufs: REPLAYGAIN_REFERENCE_LUFS,
        }
    }

    /// Calculator targeting `reference_lufs`, e.g. an EBU R128 level
    pub fn with_reference(reference_lufs: f64) -> Self {
        Self { reference_lufs }
    }

    pub fn reference_lufs(&self) -> f64 {
        self.reference_lufs
    }

    /// Track gain for a finished measurement
    ///
    /// Returns `None` when the track has no measurable loudness.
    pub fn track_gain(&self, info: &LoudnessInfo) -> Option<TrackGain> {
        if !info.integrated_lufs.is_finite() {
            return None;
        }

        Some(TrackGain {
            gain_db: self.reference_lufs - info.integrated_lufs,
            peak: info.sample_peak,
            integrated_lufs: info.integrated_lufs,
            reference_lufs: self.reference_lufs,
        })
    }

    /// Calculate album gain from the sessions of every track on the album
    ///
    /// Returns `Ok(None)` when the album has no measurable loudness.
    pub fn album_gain(&self, tracks: &[&Session]) -> Result<Option<AlbumGain>> {
        let integrated_lufs = integrated_loudness_multiple(tracks)?;
        if !integrated_lufs.is_finite() {
            return Ok(None);
        }

        let mut peak = 0.0_f64;
        for track in tracks {
            peak = peak.max(track.peak()?);
        }

        Ok(Some(AlbumGain {
            gain_db: self.reference_lufs - integrated_lufs,
            peak,
            integrated_lufs,
            track_count: tracks.len(),
            reference_lufs: self.reference_lufs,
        }))
    }
}

impl Default for ReplayGainCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_loudness_info(integrated_lufs: f64, sample_peak: f64) -> LoudnessInfo {
        LoudnessInfo {
            integrated_lufs,
            sample_peak,
            duration_seconds: 180.0,
            sample_rate: 44100,
            channels: 2,
            block_count: 900,
        }
    }

    fn sine_session(amplitude: f32, seconds: f32) -> Session {
        let rate = 48000;
        let frames = (rate as f32 * seconds) as usize;
        let samples: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / rate as f32;
                let s = amplitude * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
                [s, s]
            })
            .collect();
        let mut session = Session::new(rate, 2, None);
        session.add_frames(&samples).unwrap();
        session
    }

    #[test]
    fn test_track_gain_quiet() {
        let calc = ReplayGainCalculator::new();
        let gain = calc.track_gain(&make_loudness_info(-23.0, 0.5)).unwrap();

        // -18 - (-23) = +5 dB, peak at -6 dBFS leaves room
        assert!((gain.gain_db - 5.0).abs() < 0.001);
        assert!(!gain.would_clip());
        assert_eq!(gain.safe_gain(), gain.gain_db);
    }

    #[test]
    fn test_track_gain_clipping() {
        let calc = ReplayGainCalculator::new();
        let gain = calc.track_gain(&make_loudness_info(-28.0, 0.5)).unwrap();

        // +10 dB on a -6 dBFS peak would clip
        assert!((gain.gain_db - 10.0).abs() < 0.001);
        assert!(gain.would_clip());
        assert!((gain.safe_gain() - 6.0206).abs() < 0.001);
        assert!((gain.safe_linear_gain() * 0.5 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_silent_track_has_no_gain() {
        let calc = ReplayGainCalculator::new();
        assert!(calc.track_gain(&make_loudness_info(f64::NEG_INFINITY, 0.0)).is_none());
    }

    #[test]
    fn test_zero_peak_never_clips() {
        let calc = ReplayGainCalculator::new();
        let gain = calc.track_gain(&make_loudness_info(-40.0, 0.0)).unwrap();
        assert!(!gain.would_clip());
        assert_eq!(gain.safe_gain(), gain.gain_db);
    }

    #[test]
    fn test_linear_gain_conversion() {
        let calc = ReplayGainCalculator::new();
        let gain = calc.track_gain(&make_loudness_info(-24.0, 0.1)).unwrap();
        assert!((gain.gain_db - 6.0).abs() < 0.001);
        assert!((gain.linear_gain() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_custom_reference_level() {
        let calc = ReplayGainCalculator::with_reference(-23.0);
        let gain = calc.track_gain(&make_loudness_info(-18.0, 0.5)).unwrap();

        // -23 - (-18) = -5 dB
        assert!((gain.gain_db - (-5.0)).abs() < 0.001);
        assert_eq!(gain.reference_lufs, -23.0);
        assert_eq!(calc.reference_lufs(), -23.0);
        assert_eq!(ReplayGainCalculator::default().reference_lufs(), REPLAYGAIN_REFERENCE_LUFS);
    }

    #[test]
    fn test_album_gain() {
        let loud = sine_session(0.5, 3.0);
        let quiet = sine_session(0.05, 3.0);

        let calc = ReplayGainCalculator::new();
        let album = calc.album_gain(&[&loud, &quiet]).unwrap().unwrap();

        assert_eq!(album.track_count, 2);
        assert!((album.peak - 0.5).abs() < 1e-3);
        // The quiet track is 20 dB down and falls under the relative gate
        let loud_only = integrated_loudness_multiple(&[&loud]).unwrap();
        assert!((album.integrated_lufs - loud_only).abs() < 1e-9);
        assert!((album.gain_db - (-18.0 - loud_only)).abs() < 1e-9);
    }

    #[test]
    fn test_album_gain_empty() {
        let calc = ReplayGainCalculator::new();
        assert!(calc.album_gain(&[]).unwrap().is_none());
    }
}
