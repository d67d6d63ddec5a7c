//! K-weighting filter
//!
//! Runs the cascaded 4th-order K-weighting filter over interleaved input,
//! de-interleaving into one output buffer per channel. Stereo input takes a
//! two-lane SIMD path; every other layout uses the per-channel scalar loop.
//! Both paths perform the same operations in the same order, so their output
//! is bit-identical.

use crate::coefficients::{filter_coefficients, FilterCoefficients};
use crate::{DENORMAL_FLUSH_INTERVAL, DENORMAL_THRESHOLD};
use std::sync::Arc;
use wide::f64x2;

/// Transposed direct-form state, `s0..s3`
type State = [f64; 4];

/// Multi-channel K-weighting filter with persistent state
pub struct KWeightingFilter {
    coeffs: Arc<FilterCoefficients>,
    state: Vec<State>,
    /// Frames filtered since the last denormal flush
    since_flush: usize,
}

impl KWeightingFilter {
    /// Create a filter for `channels` channels at `sample_rate`
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            coeffs: filter_coefficients(sample_rate),
            state: vec![[0.0; 4]; channels],
            since_flush: 0,
        }
    }

    pub fn channels(&self) -> usize {
        self.state.len()
    }

    /// Filter `frames` interleaved frames from `input`
    ///
    /// Channel `c` of frame `i` is written to `outputs[c][offset + i]`. State
    /// carries over between calls, so splitting a stream into several calls
    /// produces the same output as a single call.
    ///
    /// # Panics
    /// Panics if `input` holds fewer than `frames` frames or an output buffer
    /// is shorter than `offset + frames`.
    pub fn process(
        &mut self,
        input: &[f32],
        frames: usize,
        outputs: &mut [Vec<f64>],
        offset: usize,
    ) {
        let channels = self.channels();
        if channels == 0 || frames == 0 {
            return;
        }

        let mut done = 0;
        while done < frames {
            let run = (DENORMAL_FLUSH_INTERVAL - self.since_flush).min(frames - done);
            let segment = &input[done * channels..(done + run) * channels];

            if channels == 2 && outputs.len() == 2 {
                self.process_stereo(segment, run, outputs, offset + done);
            } else {
                self.process_generic(segment, run, outputs, offset + done);
            }

            done += run;
            self.since_flush += run;
            if self.since_flush == DENORMAL_FLUSH_INTERVAL {
                self.flush_denormals();
                self.since_flush = 0;
            }
        }
    }

    /// Clear all filter memory
    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = [0.0; 4]);
        self.since_flush = 0;
    }

    /// Both channels advance in lockstep in the two lanes of an `f64x2`
    fn process_stereo(
        &mut self,
        input: &[f32],
        frames: usize,
        outputs: &mut [Vec<f64>],
        offset: usize,
    ) {
        let c = &*self.coeffs;
        let [b0, b1, b2, b3, b4] = c.b.map(f64x2::splat);
        let [_, a1, a2, a3, a4] = c.a.map(f64x2::splat);

        let ([left, right], [out_l, out_r]) = (self.state.as_mut_slice(), outputs) else {
            return;
        };

        let lanes = |i: usize| f64x2::new([left[i], right[i]]);
        let (mut s0, mut s1, mut s2, mut s3) = (lanes(0), lanes(1), lanes(2), lanes(3));

        for (i, frame) in input.chunks_exact(2).take(frames).enumerate() {
            let x = f64x2::new([f64::from(frame[0]), f64::from(frame[1])]);
            let y = b0 * x + s0;
            s0 = b1 * x - a1 * y + s1;
            s1 = b2 * x - a2 * y + s2;
            s2 = b3 * x - a3 * y + s3;
            s3 = b4 * x - a4 * y;

            let [yl, yr] = y.to_array();
            out_l[offset + i] = yl;
            out_r[offset + i] = yr;
        }

        for (i, s) in [s0, s1, s2, s3].iter().enumerate() {
            let [l, r] = s.to_array();
            left[i] = l;
            right[i] = r;
        }
    }

    pub(crate) fn process_generic(
        &mut self,
        input: &[f32],
        frames: usize,
        outputs: &mut [Vec<f64>],
        offset: usize,
    ) {
        let channels = self.state.len();
        let FilterCoefficients { b, a } = *self.coeffs;

        for (ch, (state, out)) in self.state.iter_mut().zip(outputs.iter_mut()).enumerate() {
            let [mut s0, mut s1, mut s2, mut s3] = *state;

            for (i, frame) in input.chunks_exact(channels).take(frames).enumerate() {
                let x = f64::from(frame[ch]);
                let y = b[0] * x + s0;
                s0 = b[1] * x - a[1] * y + s1;
                s1 = b[2] * x - a[2] * y + s2;
                s2 = b[3] * x - a[3] * y + s3;
                s3 = b[4] * x - a[4] * y;
                out[offset + i] = y;
            }

            *state = [s0, s1, s2, s3];
        }
    }

    fn flush_denormals(&mut self) {
        for register in self.state.iter_mut().flatten() {
            if register.abs() < DENORMAL_THRESHOLD {
                *register = 0.0;
            }
        }
    }
}
