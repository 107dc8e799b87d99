//! The `Sensor`: geometry, photometric/electronic parameters, and the mutable pixel buffer.
//!
//! Constructor validation, draw order, and the accumulate/readout/clear lifecycle are grounded in the
//! distilled reference `Sensor` class this crate replaces; constructor signature conventions (named
//! fields validated up front, returning a `Result`) follow `SatelliteConfig::new` and the `Scene`
//! doc example from the sensor-simulation module this crate was adapted from.

use ndarray::Array2;
use rand::RngCore;
use rayon::prelude::*;

use crate::bloom::{apply_bloom, Direction};
use crate::error::SensorError;
use crate::noise::{add_poisson_field, add_poisson_field_varying};
use crate::psf::Lens;
use crate::quadrature::{integrate_rect, sample_count};
use crate::units::{Celsius, Electrons, Micrometers, Seconds};

/// One pA/m^2 of dark current corresponds to this many electrons per second per square meter.
pub const DARK_CURRENT_PA_PER_M2_TO_E_PER_S: f64 = 6.28e6;

const CM2_PER_M2: f64 = 1.0e4;
const UM2_PER_M2: f64 = 1.0e12;

/// Per-pixel background photon flux: either uniform across the sensor or given pixel by pixel.
#[derive(Debug, Clone)]
pub enum BackgroundFlux {
    Uniform(f64),
    PerPixel(Array2<f64>),
}

/// Pre-validated per-pixel background electron means, ready to draw from without further
/// shape or sign checks. Kept separate from `BackgroundFlux` so validation and the Poisson
/// draw it gates are distinct steps.
enum BackgroundMeans {
    Uniform(f64),
    PerPixel(Array2<f64>),
}

/// The digital bias offset applied during readout: a single value, one value per column
/// (broadcast across every row), or a full per-pixel array.
#[derive(Debug, Clone)]
pub enum Bias {
    Scalar(i64),
    Row(Vec<i64>),
    Full(Array2<i64>),
}

/// Geometry and photometric/electronic configuration for a `Sensor`.
pub struct SensorConfig {
    pub width_px: usize,
    pub height_px: usize,
    pub px_len_x: Micrometers,
    pub px_len_y: Micrometers,
    pub px_pitch_x: Micrometers,
    pub px_pitch_y: Micrometers,
    pub quantum_efficiency: f64,
    pub dark_current: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    pub hot_pixels: Option<Array2<f64>>,
    pub read_noise: Electrons,
    pub gain: f64,
    pub bias: Bias,
    pub full_well: Electrons,
    pub adc_limit: i64,
    pub bloom_dirs: Vec<Direction>,
    pub readout_time: Seconds,
}

/// Image-formation core: a stateful detector-plane electron buffer driven by `clear`, `accumulate`,
/// and `readout`.
pub struct Sensor {
    width_px: usize,
    height_px: usize,
    px_len_x: f64,
    px_len_y: f64,
    px_pitch_x: f64,
    px_pitch_y: f64,
    quantum_efficiency: f64,
    dark_current: Box<dyn Fn(f64) -> f64 + Send + Sync>,
    hot_pixels: Array2<f64>,
    read_noise: f64,
    gain: f64,
    bias: Array2<i64>,
    full_well: f64,
    adc_limit: i64,
    bloom_dirs: Vec<Direction>,
    readout_time: f64,
    pixels: Array2<f64>,
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), SensorError> {
    if value <= 0.0 {
        return Err(SensorError::NonPositive { field, value });
    }
    Ok(())
}

fn broadcast_bias(bias: Bias, height: usize, width: usize) -> Result<Array2<i64>, SensorError> {
    match bias {
        Bias::Scalar(v) => Ok(Array2::from_elem((height, width), v)),
        Bias::Row(row) => {
            if row.len() != width {
                return Err(SensorError::LengthMismatch {
                    what: "bias row",
                    other: "width_px",
                    len_a: row.len(),
                    len_b: width,
                });
            }
            Ok(Array2::from_shape_fn((height, width), |(_, c)| row[c]))
        }
        Bias::Full(arr) => {
            if arr.dim() != (height, width) {
                return Err(SensorError::ShapeError {
                    what: "bias",
                    expected: (height, width),
                    actual: arr.dim(),
                });
            }
            Ok(arr)
        }
    }
}

impl Sensor {
    /// Constructs a new sensor, validating every shape and range up front. No partial state is
    /// created on failure.
    pub fn new(config: SensorConfig) -> Result<Self, SensorError> {
        validate_positive("width_px", config.width_px as f64)?;
        validate_positive("height_px", config.height_px as f64)?;
        validate_positive("px_len_x", config.px_len_x.value())?;
        validate_positive("px_len_y", config.px_len_y.value())?;
        validate_positive("px_pitch_x", config.px_pitch_x.value())?;
        validate_positive("px_pitch_y", config.px_pitch_y.value())?;
        validate_positive("full_well", config.full_well.value())?;

        if !(0.0..=1.0).contains(&config.quantum_efficiency) {
            return Err(SensorError::OutOfRange {
                field: "quantum_efficiency",
                lo: 0.0,
                hi: 1.0,
                value: config.quantum_efficiency,
            });
        }
        if config.read_noise.value() < 0.0 {
            return Err(SensorError::Negative {
                field: "read_noise",
                value: config.read_noise.value(),
            });
        }
        if config.px_pitch_x.value() < config.px_len_x.value() {
            return Err(SensorError::NonPositive {
                field: "px_pitch_x - px_len_x",
                value: config.px_pitch_x.value() - config.px_len_x.value(),
            });
        }
        if config.px_pitch_y.value() < config.px_len_y.value() {
            return Err(SensorError::NonPositive {
                field: "px_pitch_y - px_len_y",
                value: config.px_pitch_y.value() - config.px_len_y.value(),
            });
        }

        let hot_pixels = match config.hot_pixels {
            Some(arr) => {
                if arr.dim() != (config.height_px, config.width_px) {
                    return Err(SensorError::ShapeError {
                        what: "hot_pixels",
                        expected: (config.height_px, config.width_px),
                        actual: arr.dim(),
                    });
                }
                if let Some(&v) = arr.iter().find(|&&v| v < 0.0) {
                    return Err(SensorError::Negative {
                        field: "hot_pixels",
                        value: v,
                    });
                }
                arr
            }
            None => Array2::ones((config.height_px, config.width_px)),
        };

        let bias = broadcast_bias(config.bias, config.height_px, config.width_px)?;

        Ok(Self {
            width_px: config.width_px,
            height_px: config.height_px,
            px_len_x: config.px_len_x.value(),
            px_len_y: config.px_len_y.value(),
            px_pitch_x: config.px_pitch_x.value(),
            px_pitch_y: config.px_pitch_y.value(),
            quantum_efficiency: config.quantum_efficiency,
            dark_current: config.dark_current,
            hot_pixels,
            read_noise: config.read_noise.value(),
            gain: config.gain,
            bias,
            full_well: config.full_well.value(),
            adc_limit: config.adc_limit,
            bloom_dirs: config.bloom_dirs,
            readout_time: config.readout_time.value(),
            pixels: Array2::zeros((config.height_px, config.width_px)),
        })
    }

    /// Sensor extent in micrometers along x. Includes a half-pitch margin beyond the outermost pixel
    /// edges: `(width_px + 1) * pitch - pixel_len`. See design notes for why the naively "cleaner"
    /// `width_px * pitch` formula is not used.
    pub fn extent_x(&self) -> f64 {
        (self.width_px as f64 + 1.0) * self.px_pitch_x - self.px_len_x
    }

    /// Sensor extent in micrometers along y, mirroring `extent_x`.
    pub fn extent_y(&self) -> f64 {
        (self.height_px as f64 + 1.0) * self.px_pitch_y - self.px_len_y
    }

    /// Resets every pixel to zero electrons.
    pub fn clear(&mut self) {
        self.pixels.fill(0.0);
    }

    /// Read-only view of the current electron buffer.
    pub fn pixels(&self) -> &Array2<f64> {
        &self.pixels
    }

    /// The configured readout time in seconds, carried through for downstream use (e.g. scheduling
    /// successive exposures); not consumed by `accumulate` or `readout` itself.
    pub fn readout_time(&self) -> f64 {
        self.readout_time
    }

    /// Sensor dimensions as `(width_px, height_px)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width_px, self.height_px)
    }

    fn center_pixel_index(&self, x: f64, y: f64) -> (i64, i64) {
        // extent_x = (width_px+1)*pitch - len, and the footprint geometry below places pixel c's
        // right edge at c*pitch, so the denominator reduces to (width_px-1)*pitch; kept in the
        // extent-derived form to mirror the geometry anomaly documented on `extent_x`/`extent_y`.
        let denom_x = self.extent_x() - 2.0 * self.px_pitch_x + self.px_len_x;
        let denom_y = self.extent_y() - 2.0 * self.px_pitch_y + self.px_len_y;
        let xi = (x * self.width_px as f64 / denom_x).round_ties_even();
        let yi = (y * self.height_px as f64 / denom_y).round_ties_even();
        (xi as i64, yi as i64)
    }

    /// Adds the per-source PSF-integrated flux, background, and dark-current electrons for one
    /// exposure phase. May be called multiple times before `readout`; draw order is source flux
    /// (per source, per pixel in footprint, in source-input order), then background (row-major),
    /// then dark current (row-major).
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate(
        &mut self,
        lens: &dyn Lens,
        exposure_time: Seconds,
        temperature: Celsius,
        xs: &[f64],
        ys: &[f64],
        fluxes: &[f64],
        background_flux: BackgroundFlux,
        rng: &mut impl RngCore,
    ) -> Result<(), SensorError> {
        let exposure_s = exposure_time.value();
        validate_positive("exposure_time", exposure_s)?;

        if xs.len() != ys.len() {
            return Err(SensorError::LengthMismatch {
                what: "xs",
                other: "ys",
                len_a: xs.len(),
                len_b: ys.len(),
            });
        }
        if xs.len() != fluxes.len() {
            return Err(SensorError::LengthMismatch {
                what: "xs",
                other: "fluxes",
                len_a: xs.len(),
                len_b: fluxes.len(),
            });
        }

        // Every mean that can be validated without touching `pixels` is computed and checked up
        // front, before any write, per the "no partial state on validation failure" policy: a
        // mis-shaped per-pixel background or a pathological dark-current reading must error out
        // before the source electrons are deposited, not after.
        let background_means = self.validate_background(lens, exposure_s, &background_flux)?;
        let dark_means = self.validate_dark_current(exposure_s, temperature.value())?;

        if !xs.is_empty() {
            self.deposit_sources(lens, exposure_s, xs, ys, fluxes, rng)?;
        }

        self.apply_background(background_means, rng);
        self.apply_dark_current(&dark_means, rng);

        apply_bloom(&mut self.pixels, self.full_well, &self.bloom_dirs);

        Ok(())
    }

    fn deposit_sources(
        &mut self,
        lens: &dyn Lens,
        exposure_s: f64,
        xs: &[f64],
        ys: &[f64],
        fluxes: &[f64],
        rng: &mut impl RngCore,
    ) -> Result<(), SensorError> {
        let psf = lens.psf();
        let bounds_x = lens.psf_bounds_x().value();
        let bounds_y = lens.psf_bounds_y().value();
        let resolution = lens.psf_resolution().value();

        if bounds_x > self.extent_x() || bounds_y > self.extent_y() {
            return Err(SensorError::PsfSupportTooLarge {
                bounds_x,
                bounds_y,
                extent_x: self.extent_x(),
                extent_y: self.extent_y(),
            });
        }

        let nx = sample_count(self.px_len_x, resolution);
        let ny = sample_count(self.px_len_y, resolution);

        // The original implementation sizes the footprint window in pixel-length units, not
        // pixel-pitch units, even though the two differ whenever there is a gap between active
        // areas; preserved here to match its addressing convention.
        let bx = (bounds_x / self.px_len_x).ceil() as i64;
        let by = (bounds_y / self.px_len_y).ceil() as i64;

        let px_pitch_x = self.px_pitch_x;
        let px_pitch_y = self.px_pitch_y;
        let px_len_x = self.px_len_x;
        let px_len_y = self.px_len_y;

        for i in 0..xs.len() {
            let x = xs[i];
            let y = ys[i];
            let dose = fluxes[i] * exposure_s * self.quantum_efficiency * lens.area();

            let (xi, yi) = self.center_pixel_index(x, y);
            let c_lo = (xi - bx).max(0) as usize;
            let c_hi = ((xi + bx + 1).min(self.width_px as i64)).max(0) as usize;
            let r_lo = (yi - by).max(0) as usize;
            let r_hi = ((yi + by + 1).min(self.height_px as i64)).max(0) as usize;

            // The per-pixel quadrature weight is a pure function of (r, c) with no shared mutable
            // state, so this footprint tile computes across a rayon thread pool (§5); the Poisson
            // draws that consume the resulting fractions are sequenced afterward, in row-major
            // order, against the single injected RNG, preserving the required draw order.
            let coords: Vec<(usize, usize)> = (r_lo..r_hi)
                .flat_map(|r| (c_lo..c_hi).map(move |c| (r, c)))
                .collect();

            let fractions: Vec<Result<f64, SensorError>> = coords
                .par_iter()
                .map(|&(r, c)| {
                    let x_lo = c as f64 * px_pitch_x - px_len_x - x;
                    let x_hi = c as f64 * px_pitch_x - x;
                    let y_lo = r as f64 * px_pitch_y - px_len_y - y;
                    let y_hi = r as f64 * px_pitch_y - y;

                    let fraction = integrate_rect(psf, x_lo, x_hi, y_lo, y_hi, nx, ny)
                        .expect("nx/ny are floored at 2 by sample_count");

                    if !fraction.is_finite() {
                        Err(SensorError::NonFiniteContract { x, y, value: fraction })
                    } else if fraction < 0.0 {
                        Err(SensorError::NegativeContract { x, y, value: fraction })
                    } else {
                        Ok(fraction)
                    }
                })
                .collect();

            for (&(r, c), fraction) in coords.iter().zip(fractions) {
                let fraction = fraction?;
                let mean = dose * fraction;
                if mean < 0.0 {
                    return Err(SensorError::NegativeMean {
                        field: "source flux",
                        value: mean,
                    });
                }
                let sampled = crate::noise::poisson_sample(mean, rng);
                self.pixels[[r, c]] += sampled;
            }
        }

        Ok(())
    }

    /// Computes and validates the per-pixel background electron means, without touching `pixels`,
    /// so a mis-shaped or pathological `background_flux` is reported before any write this call
    /// makes.
    fn validate_background(
        &self,
        lens: &dyn Lens,
        exposure_s: f64,
        background_flux: &BackgroundFlux,
    ) -> Result<BackgroundMeans, SensorError> {
        match background_flux {
            BackgroundFlux::Uniform(flux) => {
                let mean = flux * exposure_s * lens.area();
                if mean < 0.0 {
                    return Err(SensorError::NegativeMean {
                        field: "background_flux",
                        value: mean,
                    });
                }
                Ok(BackgroundMeans::Uniform(mean))
            }
            BackgroundFlux::PerPixel(flux_map) => {
                if flux_map.dim() != (self.height_px, self.width_px) {
                    return Err(SensorError::ShapeError {
                        what: "background_flux",
                        expected: (self.height_px, self.width_px),
                        actual: flux_map.dim(),
                    });
                }
                let means = flux_map.mapv(|f| f * exposure_s * lens.area());
                if let Some(&v) = means.iter().find(|&&v| v < 0.0) {
                    return Err(SensorError::NegativeMean {
                        field: "background_flux",
                        value: v,
                    });
                }
                Ok(BackgroundMeans::PerPixel(means))
            }
        }
    }

    /// Draws the validated background means into `pixels`. Call only after `validate_background`
    /// has already checked shape and sign.
    fn apply_background(&mut self, means: BackgroundMeans, rng: &mut impl RngCore) {
        match means {
            BackgroundMeans::Uniform(mean) => add_poisson_field(&mut self.pixels, mean, rng),
            BackgroundMeans::PerPixel(means) => {
                add_poisson_field_varying(&mut self.pixels, &means, rng)
            }
        }
    }

    /// Computes and validates the per-pixel dark-current electron means, without touching
    /// `pixels`, so a pathological `dark_current` closure is reported before any write this call
    /// makes.
    fn validate_dark_current(
        &self,
        exposure_s: f64,
        temperature_c: f64,
    ) -> Result<Array2<f64>, SensorError> {
        let j_pa_per_cm2 = (self.dark_current)(temperature_c);
        let j_pa_per_m2 = j_pa_per_cm2 * CM2_PER_M2;
        let current_density_e_per_s_per_m2 = j_pa_per_m2 * DARK_CURRENT_PA_PER_M2_TO_E_PER_S;
        let px_area_m2 = (self.px_len_x * self.px_len_y) / UM2_PER_M2;

        let means = self
            .hot_pixels
            .mapv(|h| h * current_density_e_per_s_per_m2 * exposure_s * px_area_m2);
        if let Some(&v) = means.iter().find(|&&v| v < 0.0) {
            return Err(SensorError::NegativeMean {
                field: "dark_current",
                value: v,
            });
        }
        Ok(means)
    }

    /// Draws the validated dark-current means into `pixels`. Call only after
    /// `validate_dark_current` has already checked sign.
    fn apply_dark_current(&mut self, means: &Array2<f64>, rng: &mut impl RngCore) {
        add_poisson_field_varying(&mut self.pixels, means, rng);
    }

    /// Reads the sensor out to a digital image. Non-destructive: `pixels` is not reset, aside from
    /// the read-noise draw being added in place, so repeated `readout` calls accumulate read noise.
    /// Callers invoke `clear()` to start a new exposure.
    pub fn readout(&mut self, rng: &mut impl RngCore) -> Array2<i64> {
        add_poisson_field(&mut self.pixels, self.read_noise, rng);

        let gain = self.gain;
        let adc_limit = self.adc_limit;
        let bias = &self.bias;

        Array2::from_shape_fn((self.height_px, self.width_px), |(r, c)| {
            let raw = (self.pixels[[r, c]] * gain).floor() as i64 + bias[[r, c]];
            raw.clamp(0, adc_limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::psf::{GaussianPsf, PointSpreadFunction};
    use float_cmp::approx_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct FixedLens {
        area_m2: f64,
        psf: GaussianPsf,
        bounds: Micrometers,
        resolution: Micrometers,
    }

    impl Lens for FixedLens {
        fn area(&self) -> f64 {
            self.area_m2
        }
        fn psf(&self) -> &dyn PointSpreadFunction {
            &self.psf
        }
        fn psf_bounds_x(&self) -> Micrometers {
            self.bounds
        }
        fn psf_bounds_y(&self) -> Micrometers {
            self.bounds
        }
        fn psf_resolution(&self) -> Micrometers {
            self.resolution
        }
    }

    fn basic_sensor(width: usize, height: usize) -> Sensor {
        Sensor::new(SensorConfig {
            width_px: width,
            height_px: height,
            px_len_x: Micrometers(10.0),
            px_len_y: Micrometers(10.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.0,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: None,
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Scalar(100),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap()
    }

    #[test]
    fn dark_frame_returns_flat_bias() {
        let mut sensor = basic_sensor(8, 8);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[],
                &[],
                &[],
                BackgroundFlux::Uniform(0.0),
                &mut rng,
            )
            .unwrap();
        let image = sensor.readout(&mut rng);

        assert!(image.iter().all(|&v| v == 100));
    }

    #[test]
    fn readout_clips_to_adc_limit_and_stays_non_negative() {
        let mut sensor = basic_sensor(4, 4);
        sensor.pixels[[0, 0]] = 1.0e9;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let image = sensor.readout(&mut rng);
        assert!(image.iter().all(|&v| (0..=65535).contains(&v)));
    }

    #[test]
    fn accumulate_rejects_mismatched_lengths() {
        let mut sensor = basic_sensor(4, 4);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[1.0, 2.0],
                &[1.0],
                &[1.0, 1.0],
                BackgroundFlux::Uniform(0.0),
                &mut rng,
            )
            .unwrap_err();
        assert!(matches!(err, SensorError::LengthMismatch { .. }));
    }

    #[test]
    fn determinism_under_fixed_seed() {
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };

        let run = |seed: u64| {
            let mut sensor = basic_sensor(16, 16);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sensor
                .accumulate(
                    &lens,
                    Seconds(1.0),
                    Celsius(20.0),
                    &[80.0],
                    &[80.0],
                    &[1.0e5],
                    BackgroundFlux::Uniform(1.0),
                    &mut rng,
                )
                .unwrap();
            sensor.readout(&mut rng)
        };

        assert_eq!(run(42), run(42));
        assert_ne!(run(1), run(2));
    }

    #[test]
    fn bias_row_broadcasts_across_every_row() {
        let mut sensor = Sensor::new(SensorConfig {
            width_px: 4,
            height_px: 3,
            px_len_x: Micrometers(10.0),
            px_len_y: Micrometers(10.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.0,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: None,
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Row(vec![10, 20, 30, 40]),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let image = sensor.readout(&mut rng);
        for r in 0..3 {
            assert_eq!(image[[r, 0]], 10);
            assert_eq!(image[[r, 1]], 20);
            assert_eq!(image[[r, 2]], 30);
            assert_eq!(image[[r, 3]], 40);
        }
    }

    #[test]
    fn rejects_mismatched_hot_pixel_shape() {
        let err = Sensor::new(SensorConfig {
            width_px: 4,
            height_px: 4,
            px_len_x: Micrometers(10.0),
            px_len_y: Micrometers(10.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.0,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: Some(Array2::ones((3, 4))),
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Scalar(0),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap_err();
        assert!(matches!(err, SensorError::ShapeError { .. }));
    }

    #[test]
    fn rejects_negative_hot_pixels() {
        let err = Sensor::new(SensorConfig {
            width_px: 4,
            height_px: 4,
            px_len_x: Micrometers(10.0),
            px_len_y: Micrometers(10.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.0,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: Some(Array2::from_elem((4, 4), -0.1)),
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Scalar(0),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap_err();
        assert!(matches!(err, SensorError::Negative { field: "hot_pixels", .. }));
    }

    #[test]
    fn rejects_negative_dark_current_mean() {
        let mut sensor = basic_sensor(4, 4);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };
        // the lens and sensor otherwise zero everything out; a pathological dark_current
        // closure returning a negative current density must be reported, not clamped.
        sensor.dark_current = Box::new(|_t| -1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[],
                &[],
                &[],
                BackgroundFlux::Uniform(0.0),
                &mut rng,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SensorError::NegativeMean {
                field: "dark_current",
                ..
            }
        ));
    }

    #[test]
    fn rejects_psf_support_larger_than_sensor() {
        let mut sensor = basic_sensor(4, 4);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(1.0e6),
            resolution: Micrometers(2.0),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[20.0],
                &[20.0],
                &[1.0],
                BackgroundFlux::Uniform(0.0),
                &mut rng,
            )
            .unwrap_err();
        assert!(matches!(err, SensorError::PsfSupportTooLarge { .. }));
    }

    #[test]
    fn negative_dark_current_mean_leaves_pixels_untouched() {
        let mut sensor = basic_sensor(8, 8);
        sensor.dark_current = Box::new(|_t| -1.0);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // A bright source would deposit plenty of charge if `deposit_sources` ran first; the
        // pathological dark-current mean must be caught before any write happens.
        let err = sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[40.0],
                &[40.0],
                &[1.0e8],
                BackgroundFlux::Uniform(0.0),
                &mut rng,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            SensorError::NegativeMean {
                field: "dark_current",
                ..
            }
        ));
        assert_eq!(sensor.pixels.sum(), 0.0);
    }

    #[test]
    fn mismatched_background_shape_leaves_pixels_untouched() {
        let mut sensor = basic_sensor(8, 8);
        let lens = FixedLens {
            area_m2: 1.0,
            psf: GaussianPsf::new(3.0),
            bounds: Micrometers(15.0),
            resolution: Micrometers(2.0),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let err = sensor
            .accumulate(
                &lens,
                Seconds(1.0),
                Celsius(20.0),
                &[40.0],
                &[40.0],
                &[1.0e8],
                BackgroundFlux::PerPixel(Array2::zeros((3, 3))),
                &mut rng,
            )
            .unwrap_err();

        assert!(matches!(err, SensorError::ShapeError { what: "background_flux", .. }));
        assert_eq!(sensor.pixels.sum(), 0.0);
    }

    #[test]
    fn extent_includes_half_pitch_margin_on_each_side() {
        // px_len != px_pitch so the "cleaner" width_px*pitch formula would disagree with the
        // half-pitch-margin convention this sensor actually uses.
        let sensor = Sensor::new(SensorConfig {
            width_px: 8,
            height_px: 8,
            px_len_x: Micrometers(8.0),
            px_len_y: Micrometers(8.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.0,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: None,
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Scalar(0),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap();
        let expected = (8.0 + 1.0) * 10.0 - 8.0;
        assert!(approx_eq!(f64, sensor.extent_x(), expected, epsilon = 1e-9));
    }

    #[test]
    fn rejects_out_of_range_quantum_efficiency() {
        let err = Sensor::new(SensorConfig {
            width_px: 4,
            height_px: 4,
            px_len_x: Micrometers(10.0),
            px_len_y: Micrometers(10.0),
            px_pitch_x: Micrometers(10.0),
            px_pitch_y: Micrometers(10.0),
            quantum_efficiency: 1.5,
            dark_current: Box::new(|_t| 0.0),
            hot_pixels: None,
            read_noise: Electrons(0.0),
            gain: 1.0,
            bias: Bias::Scalar(0),
            full_well: Electrons(65535.0),
            adc_limit: 65535,
            bloom_dirs: vec![],
            readout_time: Seconds(1.0),
        })
        .unwrap_err();
        assert!(matches!(err, SensorError::OutOfRange { .. }));
    }
}
