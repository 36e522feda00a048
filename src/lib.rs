//! Unscented Kalman Filter fusing lidar and radar measurements of a single
//! object moving under a constant turn rate and velocity (CTRV) model.

#[macro_use(
    slog_o,
    slog_kv,
    slog_b,
    slog_record,
    slog_record_static,
    slog_log,
    slog_trace,
    slog_debug,
    slog_info,
    slog_warn,
    slog_error,
    slog_crit
)]
extern crate slog;
#[macro_use]
extern crate slog_scope;

pub mod config;
pub mod error;
pub mod filter;
pub mod sensor;
pub mod ukf_type;
pub mod util;

pub use config::FilterConfig;
pub use error::{ConfigError, EvaluationError, FilterError, InputError};
pub use filter::kalman_filter::{FilterState, Nis, UnscentedKalmanFilter, UKF};
pub use sensor::measurement::{
    EstimationPackage, GroundTruthPackage, LidarMeasurement, MeasurementPackage,
    RadarMeasurement, SensorReading, SensorType,
};
pub use ukf_type::ukf::{CovarMatrix, StateVector};
