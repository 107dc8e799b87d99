//! Error taxonomy for the sensor core.
//!
//! One enum per fallible surface, following the corpus convention of a dedicated `thiserror` type per
//! module rather than a single catch-all error.

use thiserror::Error;

/// Errors raised by `Sensor` construction and `accumulate`/`readout` entry validation.
#[derive(Debug, Error, PartialEq)]
pub enum SensorError {
    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeError {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("{what} and {other} must have equal length ({len_a} vs {len_b})")]
    LengthMismatch {
        what: &'static str,
        other: &'static str,
        len_a: usize,
        len_b: usize,
    },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} out of range [{lo}, {hi}], got {value}")]
    OutOfRange {
        field: &'static str,
        lo: f64,
        hi: f64,
        value: f64,
    },

    #[error("lens PSF produced non-finite density at ({x}, {y}): {value}")]
    NonFiniteContract { x: f64, y: f64, value: f64 },

    #[error("lens PSF produced a negative density at ({x}, {y}): {value}")]
    NegativeContract { x: f64, y: f64, value: f64 },

    #[error(
        "lens PSF support ({bounds_x}, {bounds_y}) exceeds sensor extent ({extent_x}, {extent_y})"
    )]
    PsfSupportTooLarge {
        bounds_x: f64,
        bounds_y: f64,
        extent_x: f64,
        extent_y: f64,
    },

    #[error("{field} computed a negative mean ({value}); check the supplied collaborator")]
    NegativeMean { field: &'static str, value: f64 },
}
