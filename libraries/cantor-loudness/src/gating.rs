//! Two-stage gated integration of block powers
//!
//! Blocks are gated twice: against the absolute threshold as they are
//! produced (see `session`), and here against a threshold 10 LU below the
//! ungated mean of everything that survived the first gate. The relative
//! threshold depends on the whole population, so it can only be applied once
//! all blocks are known.

use crate::{LUFS_OFFSET, RELATIVE_GATE_LU};

/// Convert a mean-square block power to LUFS
///
/// Non-positive power is silence and maps to negative infinity.
pub fn power_to_lufs(power: f64) -> f64 {
    if power <= 0.0 {
        f64::NEG_INFINITY
    } else {
        LUFS_OFFSET + 10.0 * power.log10()
    }
}

/// Gated integrated loudness of a set of block powers
///
/// Returns negative infinity when no block survives either gate.
pub fn integrated_loudness_from_powers(block_powers: &[f64]) -> f64 {
    gated_loudness(&[block_powers])
}

/// Gated integrated loudness over several block populations treated as one
///
/// Used for album loudness, where the relative gate is computed over the
/// blocks of every track together.
pub(crate) fn gated_loudness(groups: &[&[f64]]) -> f64 {
    let blocks = || groups.iter().flat_map(|g| g.iter().copied());

    let Some(ungated) = mean(blocks()) else {
        return f64::NEG_INFINITY;
    };
    let threshold = power_to_lufs(ungated) + RELATIVE_GATE_LU;

    match mean(blocks().filter(|&p| power_to_lufs(p) > threshold)) {
        Some(gated) => power_to_lufs(gated),
        None => f64::NEG_INFINITY,
    }
}

fn mean(powers: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = powers.fold((0.0, 0_usize), |(sum, n), p| (sum + p, n + 1));
    (count > 0).then(|| sum / count as f64)
}
