//! K-weighting filter coefficients
//!
//! The K-weighting curve is a high-shelf "pre-filter" followed by the RLB
//! high-pass, both designed with the bilinear transform and then multiplied
//! into a single 4th-order transfer function. Coefficients depend only on the
//! sample rate, so they are computed once per rate and shared process-wide.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

/// Pre-filter (high shelf) centre frequency in Hz
const SHELF_F0: f64 = 1681.974450955533;
/// Pre-filter gain in dB
const SHELF_GAIN_DB: f64 = 3.999843853973347;
/// Pre-filter quality factor
const SHELF_Q: f64 = 0.7071752369554196;
/// Exponent mapping the high-frequency gain to the band gain
const SHELF_VB_EXPONENT: f64 = 0.4996667741545416;

/// RLB high-pass cutoff in Hz
const HIGHPASS_F0: f64 = 38.13547087602444;
/// RLB high-pass quality factor
const HIGHPASS_Q: f64 = 0.5003270373238773;

/// Numerator and denominator of one second-order section (`a[0] == 1`)
type Biquad = ([f64; 3], [f64; 3]);

/// Cascaded K-weighting transfer function for one sample rate
///
/// `b` holds the five feed-forward taps, `a` the five feedback taps with
/// `a[0]` always `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    pub b: [f64; 5],
    pub a: [f64; 5],
}

impl FilterCoefficients {
    /// Design the combined filter for `sample_rate`
    pub fn design(sample_rate: u32) -> Self {
        let fs = f64::from(sample_rate);
        let (pb, pa) = shelving_stage(fs);
        let (rb, ra) = highpass_stage(fs);

        Self {
            b: convolve(&pb, &rb),
            a: convolve(&pa, &ra),
        }
    }
}

/// High-shelf pre-filter modelling the acoustic effect of the head
fn shelving_stage(fs: f64) -> Biquad {
    let k = (PI * SHELF_F0 / fs).tan();
    let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
    let vb = vh.powf(SHELF_VB_EXPONENT);
    let a0 = 1.0 + k / SHELF_Q + k * k;

    let b = [
        (vh + vb * k / SHELF_Q + k * k) / a0,
        2.0 * (k * k - vh) / a0,
        (vh - vb * k / SHELF_Q + k * k) / a0,
    ];
    let a = [
        1.0,
        2.0 * (k * k - 1.0) / a0,
        (1.0 - k / SHELF_Q + k * k) / a0,
    ];
    (b, a)
}

/// Revised low-frequency B-curve high-pass
fn highpass_stage(fs: f64) -> Biquad {
    let k = (PI * HIGHPASS_F0 / fs).tan();
    let a0 = 1.0 + k / HIGHPASS_Q + k * k;

    let b = [1.0, -2.0, 1.0];
    let a = [
        1.0,
        2.0 * (k * k - 1.0) / a0,
        (1.0 - k / HIGHPASS_Q + k * k) / a0,
    ];
    (b, a)
}

/// Polynomial product of two quadratics
fn convolve(p: &[f64; 3], r: &[f64; 3]) -> [f64; 5] {
    [
        p[0] * r[0],
        p[0] * r[1] + p[1] * r[0],
        p[0] * r[2] + p[1] * r[1] + p[2] * r[0],
        p[1] * r[2] + p[2] * r[1],
        p[2] * r[2],
    ]
}

type Cache = RwLock<HashMap<u32, Arc<FilterCoefficients>>>;

static CACHE: OnceLock<Cache> = OnceLock::new();

/// Rates designed through the cache, in insertion order
#[cfg(test)]
static DESIGNED_RATES: parking_lot::Mutex<Vec<u32>> = parking_lot::Mutex::new(Vec::new());

/// Whether the pre-filter shelf lies below Nyquist at `sample_rate`
///
/// Below roughly 3.4 kHz the bilinear design produces an unstable filter.
pub fn supports_sample_rate(sample_rate: u32) -> bool {
    f64::from(sample_rate) > 2.0 * SHELF_F0
}

/// Coefficients for `sample_rate`, designed on first use
///
/// Every caller asking for the same rate receives the same `Arc`. The write
/// lock is re-checked after acquisition so concurrent first requests design
/// the filter exactly once.
pub fn filter_coefficients(sample_rate: u32) -> Arc<FilterCoefficients> {
    let cache = CACHE.get_or_init(Cache::default);

    if let Some(coeffs) = cache.read().get(&sample_rate) {
        return Arc::clone(coeffs);
    }

    let mut cache = cache.write();
    let coeffs = cache.entry(sample_rate).or_insert_with(|| {
        tracing::debug!("Designing K-weighting filter for {} Hz", sample_rate);
        #[cfg(test)]
        DESIGNED_RATES.lock().push(sample_rate);
        Arc::new(FilterCoefficients::design(sample_rate))
    });
    Arc::clone(coeffs)
}
