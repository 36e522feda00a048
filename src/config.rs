use crate::error::ConfigError;

/// Tuning constants for a filter instance. Fixed once the filter is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    // if this is false, lidar measurements will be ignored (except for init)
    pub use_laser: bool,

    // if this is false, radar measurements will be ignored (except for init)
    pub use_radar: bool,

    // process noise standard deviation longitudinal acceleration in m/s^2
    pub std_a: f64,

    // process noise standard deviation yaw acceleration in rad/s^2
    pub std_yawdd: f64,

    // lidar noise standard deviation px and py in m
    pub std_laspx: f64,
    pub std_laspy: f64,

    // radar noise standard deviation radius in m
    pub std_radr: f64,

    // radar noise standard deviation angle in rad
    pub std_radphi: f64,

    // radar noise standard deviation radius change in m/s
    pub std_radrd: f64,
}

impl Default for FilterConfig {
    fn default() -> FilterConfig {
        FilterConfig {
            use_laser: true,
            use_radar: true,
            std_a: 2.0,
            std_yawdd: 2.0,
            std_laspx: 0.15,
            std_laspy: 0.15,
            std_radr: 0.3,
            std_radphi: 0.03,
            std_radrd: 0.3,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let noises = [
            ("std_a", self.std_a),
            ("std_yawdd", self.std_yawdd),
            ("std_laspx", self.std_laspx),
            ("std_laspy", self.std_laspy),
            ("std_radr", self.std_radr),
            ("std_radphi", self.std_radphi),
            ("std_radrd", self.std_radrd),
        ];

        for &(name, value) in noises.iter() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidNoise { name, value });
            }
        }
        Ok(())
    }
}
