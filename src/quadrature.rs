//! Composite trapezoidal quadrature of a point-spread function over a pixel footprint.
//!
//! Generalizes the 1-D trapezoidal integration used elsewhere in this lineage of code
//! (`trap_integrate`) to the nested 2-D integral the PSF deposit requires: for each pixel in a
//! source's footprint window, the fraction of the source's total flux landing on that pixel is the
//! double integral of the PSF density over the pixel's active-area rectangle.

use crate::psf::PointSpreadFunction;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QuadratureError {
    #[error("quadrature sample count must be at least 2, got {0}")]
    InsufficientSamples(usize),
}

/// Chooses a sample count along one axis so the step size does not exceed `resolution`, floored at 2.
pub fn sample_count(extent: f64, resolution: f64) -> usize {
    if resolution <= 0.0 {
        return 2;
    }
    let n = (extent / resolution).ceil() as usize + 1;
    n.max(2)
}

/// Integrates `psf` over the axis-aligned rectangle `[x_lo, x_hi] x [y_lo, y_hi]` (in micrometers,
/// relative to the PSF's own center) using composite trapezoidal quadrature with `nx` by `ny` samples.
///
/// Returns the dimensionless fraction of the PSF's total density captured by the rectangle.
pub fn integrate_rect(
    psf: &dyn PointSpreadFunction,
    x_lo: f64,
    x_hi: f64,
    y_lo: f64,
    y_hi: f64,
    nx: usize,
    ny: usize,
) -> Result<f64, QuadratureError> {
    if nx < 2 {
        return Err(QuadratureError::InsufficientSamples(nx));
    }
    if ny < 2 {
        return Err(QuadratureError::InsufficientSamples(ny));
    }

    let dx = (x_hi - x_lo) / (nx - 1) as f64;
    let dy = (y_hi - y_lo) / (ny - 1) as f64;

    // Evaluate the PSF on the full nx*ny grid in one call so implementations can batch internally.
    let mut xs = Vec::with_capacity(nx * ny);
    let mut ys = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        let y = y_lo + dy * j as f64;
        for i in 0..nx {
            let x = x_lo + dx * i as f64;
            xs.push(x);
            ys.push(y);
        }
    }
    let mut densities = vec![0.0; nx * ny];
    psf.evaluate(&xs, &ys, &mut densities);

    // Composite trapezoidal weights: 1 at interior points, 1/2 on an edge, 1/4 at a corner.
    let mut total = 0.0;
    for j in 0..ny {
        let wy = if j == 0 || j == ny - 1 { 0.5 } else { 1.0 };
        for i in 0..nx {
            let wx = if i == 0 || i == nx - 1 { 0.5 } else { 1.0 };
            total += wx * wy * densities[j * nx + i];
        }
    }

    Ok(total * dx * dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psf::GaussianPsf;
    use approx::assert_relative_eq;

    #[test]
    fn insufficient_samples_errors() {
        let psf = GaussianPsf::new(3.0);
        let err = integrate_rect(&psf, -1.0, 1.0, -1.0, 1.0, 1, 5).unwrap_err();
        assert_eq!(err, QuadratureError::InsufficientSamples(1));
    }

    #[test]
    fn sample_count_floors_at_two() {
        assert_eq!(sample_count(10.0, 1000.0), 2);
        assert_eq!(sample_count(10.0, 1.0), 11);
    }

    #[test]
    fn gaussian_integral_over_large_rect_approaches_one() {
        let sigma = 3.0;
        let psf = GaussianPsf::new(sigma);
        let bound = sigma * 12.0;
        let total = integrate_rect(&psf, -bound, bound, -bound, bound, 400, 400).unwrap();
        assert_relative_eq!(total, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn gaussian_central_pixel_fraction_matches_erf() {
        // sigma=3um, 10um pixel pitch, centered: central pixel spans [-5, 5] x [-5, 5].
        let sigma = 3.0;
        let psf = GaussianPsf::new(sigma);
        let total = integrate_rect(&psf, -5.0, 5.0, -5.0, 5.0, 300, 300).unwrap();
        // erf(5 / (sigma*sqrt(2)))^2 for sigma=3 is about 0.818.
        assert_relative_eq!(total, 0.818, epsilon = 2e-3);
    }
}
