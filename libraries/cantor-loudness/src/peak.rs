//! Sample peak detection

#[cfg(any(
    target_feature = "sse2",
    target_feature = "neon",
    target_feature = "simd128"
))]
use wide::f32x8;

/// Maximum absolute sample value (linear, not dB)
///
/// Returns `0.0` for an empty buffer. Uses vector max-abs reduction where the
/// target has SIMD registers and the scalar loop otherwise; both give the same
/// result for finite input.
pub fn calculate_sample_peak(samples: &[f32]) -> f64 {
    #[cfg(any(
        target_feature = "sse2",
        target_feature = "neon",
        target_feature = "simd128"
    ))]
    {
        sample_peak_simd(samples)
    }
    #[cfg(not(any(
        target_feature = "sse2",
        target_feature = "neon",
        target_feature = "simd128"
    )))]
    {
        sample_peak_scalar(samples)
    }
}

/// Portable reference implementation of [`calculate_sample_peak`]
pub fn sample_peak_scalar(samples: &[f32]) -> f64 {
    f64::from(samples.iter().fold(0.0_f32, |max, s| max.max(s.abs())))
}

#[cfg(any(
    target_feature = "sse2",
    target_feature = "neon",
    target_feature = "simd128"
))]
fn sample_peak_simd(samples: &[f32]) -> f64 {
    let chunks = samples.chunks_exact(8);
    let tail = chunks.remainder();

    let mut max = f32x8::ZERO;
    let mut lanes = [0.0_f32; 8];
    for chunk in chunks {
        lanes.copy_from_slice(chunk);
        max = max.max(f32x8::from(lanes).abs());
    }

    let peak = max.to_array().into_iter().fold(0.0_f32, f32::max);
    f64::from(tail.iter().fold(peak, |max, s| max.max(s.abs())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        assert_eq!(calculate_sample_peak(&[]), 0.0);
        assert_eq!(sample_peak_scalar(&[]), 0.0);
    }

    #[test]
    fn test_negative_peak() {
        let samples = [0.1, -0.9, 0.3, 0.5, -0.2, 0.0, 0.4, 0.8, 0.1, -0.3];
        assert_eq!(calculate_sample_peak(&samples), f64::from(0.9_f32));
    }

    #[test]
    fn test_peak_in_tail() {
        // Nine samples: one full vector plus a one-sample tail holding the peak
        let mut samples = vec![0.25_f32; 9];
        samples[8] = -0.75;
        assert_eq!(calculate_sample_peak(&samples), 0.75);
    }

    #[test]
    fn test_simd_matches_scalar() {
        let samples: Vec<f32> = (0..1027).map(|i| ((i * 37) % 101) as f32 / 50.0 - 1.0).collect();
        assert_eq!(calculate_sample_peak(&samples), sample_peak_scalar(&samples));
    }
}
