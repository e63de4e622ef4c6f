//! Tolerance constants for model and metric tests.
//!
//! Different comparisons require different precision levels.

/// Floating point rounding errors (checkpoint reloads, exact gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Same computation over differently shaped tensors (chunked vs whole-signal).
pub const TENSOR_EPSILON: f32 = 1e-5;

/// Metric comparisons after the `1e-10` energy guard.
pub const METRIC_EPSILON: f64 = 1e-6;

/// Silence threshold (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;
