#![allow(dead_code)]

/// Mean Earth radius in km, used by the slant-range model.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Horizontal step of the calibration mesh in meters.
pub const DEFAULT_HORIZONTAL_RESOLUTION: f64 = 2.0;
/// Vertical step of the calibration mesh in meters.
pub const DEFAULT_VERTICAL_RESOLUTION: f64 = 3.0;

/// Mesh samples drawn to fit the RPC.
pub const DEFAULT_TRAIN_SAMPLES: usize = 50000;
/// Mesh samples drawn to evaluate the fit.
pub const DEFAULT_TEST_SAMPLES: usize = 100000;

/// Coefficient-change tolerance of the RPC calibration.
pub const FIT_TOLERANCE: f64 = 1e-10;
/// Iteration budget of the RPC calibration.
pub const FIT_MAX_ITERATIONS: usize = 20;
