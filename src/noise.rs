//! Poisson sampling helpers threaded through a caller-supplied RNG.
//!
//! Adapted from the Poisson/Gaussian-switch noise generation used elsewhere in this lineage of code,
//! but generalized to draw from an injected `RngCore` rather than an internally seeded one: the core's
//! strict draw-order requirement (source flux, then background, then dark current, then read noise)
//! only holds if every stage shares the same generator in the same call.

use ndarray::Array2;
use rand::RngCore;
use rand_distr::{Distribution, Normal, Poisson};

/// Samples a single Poisson draw with the given non-negative mean, falling back to a Gaussian
/// approximation above the point where `rand_distr::Poisson` itself switches internally, matching the
/// corpus's own large-mean handling and keeping sampling cost bounded for bright sources.
pub(crate) fn poisson_sample(mean: f64, rng: &mut impl RngCore) -> f64 {
    if mean <= 0.0 {
        return 0.0;
    }
    if mean >= 1e8 {
        // rand_distr::Poisson::new rejects means this large; a Gaussian approximation is
        // indistinguishable from a true Poisson draw at this scale.
        let normal = Normal::new(mean, mean.sqrt()).unwrap();
        return normal.sample(rng).max(0.0);
    }
    Poisson::new(mean).unwrap().sample(rng)
}

/// Adds an independent `Poisson(mean)` draw to every pixel, in row-major order, using `rng`.
pub fn add_poisson_field(pixels: &mut Array2<f64>, mean: f64, rng: &mut impl RngCore) {
    for v in pixels.iter_mut() {
        *v += poisson_sample(mean, rng);
    }
}

/// Adds an independent `Poisson(means[r, c])` draw to every pixel, in row-major order, using `rng`.
pub fn add_poisson_field_varying(
    pixels: &mut Array2<f64>,
    means: &Array2<f64>,
    rng: &mut impl RngCore,
) {
    for (v, &mean) in pixels.iter_mut().zip(means.iter()) {
        *v += poisson_sample(mean, rng);
    }
}
