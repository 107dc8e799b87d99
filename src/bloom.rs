//! Directional charge-overflow redistribution ("blooming").
//!
//! Mirrors `_applyBloom` from the distilled reference implementation: a 3x3 convolution kernel with
//! non-zero weight only at the orthogonal neighbors enabled in `bloom_dirs`, applied iteratively to
//! excess (over-full-well) charge until it drains to nothing.

use ndarray::parallel::prelude::*;
use ndarray::Array2;

/// One of the four orthogonal neighbor directions charge can bloom into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    PosX,
    NegX,
    PosY,
    NegY,
}

impl Direction {
    const ALL: [Direction; 4] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
    ];

    fn offset(self) -> (isize, isize) {
        match self {
            Direction::PosX => (0, 1),
            Direction::NegX => (0, -1),
            Direction::PosY => (1, 0),
            Direction::NegY => (-1, 0),
        }
    }
}

/// Clips every pixel to `full_well` in place. Used when no bloom directions are enabled.
///
/// Elementwise and independent per pixel, so this runs across the `ndarray` `rayon` feature's
/// thread pool rather than a plain sequential `mapv_inplace`.
fn clip_to_full_well(pixels: &mut Array2<f64>, full_well: f64) {
    pixels.par_mapv_inplace(|v| v.min(full_well));
}

/// One convolution pass: `same`-mode, zero-fill-boundary convolution of `excess` against the 3x3
/// kernel implied by `dirs`, each active direction weighted `1/n_dirs`, followed by a single
/// `floor` of the aggregated result per destination pixel.
///
/// The floor must be applied once per destination cell, after summing every contributing
/// neighbor's share (not per source pixel before the sum), so that two saturated pixels
/// blooming into the same destination still lose at most one electron there, matching
/// `floor(convolve2d(...))` in the reference implementation.
fn spread_excess(excess: &Array2<f64>, dirs: &[Direction]) -> Array2<f64> {
    let (rows, cols) = excess.dim();
    let mut spread = Array2::<f64>::zeros((rows, cols));
    let weight = 1.0 / dirs.len() as f64;

    for dir in dirs {
        let (dr, dc) = dir.offset();
        for r in 0..rows {
            for c in 0..cols {
                let e = excess[[r, c]];
                if e <= 0.0 {
                    continue;
                }
                let nr = r as isize + dr;
                let nc = c as isize + dc;
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue; // charge escapes off the sensor edge
                }
                spread[[nr as usize, nc as usize]] += e * weight;
            }
        }
    }

    spread.mapv_inplace(f64::floor);
    spread
}

/// Applies the bloom state machine to `pixels` in place.
///
/// `bloom_dirs` empty means simple clipping with no redistribution. Otherwise excess charge is
/// iteratively drained into the enabled neighbor directions until the peak excess drops below one
/// electron, or until a hard iteration cap is hit (logged, not an error; see design notes).
pub fn apply_bloom(pixels: &mut Array2<f64>, full_well: f64, bloom_dirs: &[Direction]) {
    if bloom_dirs.is_empty() {
        clip_to_full_well(pixels, full_well);
        return;
    }

    let (rows, cols) = pixels.dim();
    let max_iterations = 4 * rows.max(cols).max(1);

    for iteration in 0..max_iterations {
        let mut excess = pixels.clone();
        excess.par_mapv_inplace(|v| (v - full_well).max(0.0));
        let peak = excess.iter().cloned().fold(0.0_f64, f64::max);
        if peak < 1.0 {
            return;
        }

        *pixels -= &excess;
        let spread = spread_excess(&excess, bloom_dirs);
        *pixels += &spread;

        if iteration + 1 == max_iterations {
            log::warn!(
                "bloom did not converge within {} iterations, peak excess {}",
                max_iterations,
                peak
            );
        }
    }
}

/// Parses the full set of directions from a slice, preserving duplicates-as-identity (a `HashSet` would
/// also work; callers are expected to pass a deduplicated slice, so this is left as a thin pass-through
/// to keep `Sensor`'s field type simple).
pub fn all_directions() -> [Direction; 4] {
    Direction::ALL
}
