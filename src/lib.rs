//! Deterministic image-formation core for a synthetic astronomical CCD/CMOS sensor.
//!
//! Given a lens collaborator (aperture area, point-spread function, PSF support, PSF quadrature
//! resolution) and a list of point sources projected onto the focal plane, [`Sensor`] accumulates the
//! stochastic electron count recorded per pixel over an exposure (PSF integration, background and
//! dark-current shot noise, directional well-overflow ("blooming")), and reads it out to a digital
//! image with gain, bias, and ADC clipping applied.
//!
//! Catalogs, filters, magnitude systems, and the lens model itself are external collaborators,
//! consumed only through the [`Lens`] and [`PointSpreadFunction`] traits.
//!
//! ```
//! use ndarray::Array2;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use sensor_core::{
//!     BackgroundFlux, Bias, Celsius, Electrons, GaussianPsf, Lens, Micrometers, PointSpreadFunction,
//!     Seconds, Sensor, SensorConfig,
//! };
//!
//! struct ExampleLens {
//!     psf: GaussianPsf,
//! }
//!
//! impl Lens for ExampleLens {
//!     fn area(&self) -> f64 {
//!         0.1
//!     }
//!     fn psf(&self) -> &dyn PointSpreadFunction {
//!         &self.psf
//!     }
//!     fn psf_bounds_x(&self) -> Micrometers {
//!         Micrometers(15.0)
//!     }
//!     fn psf_bounds_y(&self) -> Micrometers {
//!         Micrometers(15.0)
//!     }
//!     fn psf_resolution(&self) -> Micrometers {
//!         Micrometers(2.0)
//!     }
//! }
//!
//! let mut sensor = Sensor::new(SensorConfig {
//!     width_px: 64,
//!     height_px: 64,
//!     px_len_x: Micrometers(10.0),
//!     px_len_y: Micrometers(10.0),
//!     px_pitch_x: Micrometers(10.0),
//!     px_pitch_y: Micrometers(10.0),
//!     quantum_efficiency: 0.8,
//!     dark_current: Box::new(|temp_c: f64| 0.01 * 2.0_f64.powf((temp_c - 20.0) / 8.0)),
//!     hot_pixels: None,
//!     read_noise: Electrons(2.0),
//!     gain: 1.0,
//!     bias: Bias::Scalar(100),
//!     full_well: Electrons(65_535.0),
//!     adc_limit: 65_535,
//!     bloom_dirs: vec![],
//!     readout_time: Seconds(0.5),
//! })
//! .unwrap();
//!
//! let lens = ExampleLens { psf: GaussianPsf::new(3.0) };
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! sensor
//!     .accumulate(
//!         &lens,
//!         Seconds(1.0),
//!         Celsius(20.0),
//!         &[320.0],
//!         &[320.0],
//!         &[1.0e6],
//!         BackgroundFlux::Uniform(1.0),
//!         &mut rng,
//!     )
//!     .unwrap();
//!
//! let image: Array2<i64> = sensor.readout(&mut rng);
//! assert_eq!(image.dim(), (64, 64));
//! ```

pub mod bloom;
pub mod error;
pub mod noise;
pub mod psf;
pub mod quadrature;
pub mod sensor;
pub mod units;

pub use bloom::Direction;
pub use error::SensorError;
pub use psf::{GaussianPsf, Lens, PointSpreadFunction};
pub use sensor::{BackgroundFlux, Bias, Sensor, SensorConfig, DARK_CURRENT_PA_PER_M2_TO_E_PER_S};
pub use units::{Celsius, Electrons, Micrometers, Seconds};
