#[allow(non_snake_case)]
pub mod helper {

    extern crate nalgebra as na;

    use na::Vector4;
    use num_traits::{Float, FloatConst};

    use crate::error::EvaluationError;
    use crate::sensor::measurement::SensorType;
    use crate::ukf_type::ukf::CovarMatrix;

    // 95% chi-square quantiles for 2 and 3 degrees of freedom
    pub const CHI_SQUARE_95_LIDAR: f64 = 5.991;
    pub const CHI_SQUARE_95_RADAR: f64 = 7.815;

    /// Wraps an angle into (-pi, pi].
    pub fn normalize_angle<T: Float + FloatConst>(radians: T) -> T {
        let pi = T::PI();
        let two_pi = pi + pi;
        let wrapped = radians % two_pi;
        if wrapped > pi {
            wrapped - two_pi
        } else if wrapped <= -pi {
            wrapped + two_pi
        } else {
            wrapped
        }
    }

    // removes the asymmetry left behind by covariance subtraction
    pub fn symmetrise(P: &CovarMatrix) -> CovarMatrix {
        (P + P.transpose()) * 0.5
    }

    /// Element-wise root mean square error between estimations and ground
    /// truth, both as `[px py vx vy]`.
    pub fn calculate_rmse(
        estimations: &[Vector4<f64>],
        ground_truths: &[Vector4<f64>],
    ) -> Result<Vector4<f64>, EvaluationError> {
        if estimations.len() != ground_truths.len() {
            warn!("Invalid estimation or ground truth data");
            return Err(EvaluationError::LengthMismatch {
                estimations: estimations.len(),
                ground_truths: ground_truths.len(),
            });
        }
        if estimations.is_empty() {
            return Err(EvaluationError::Empty);
        }

        // accumulate squared residuals
        let mut rmse = Vector4::<f64>::zeros();
        for (estimation, ground_truth) in estimations.iter().zip(ground_truths) {
            let residual = estimation - ground_truth;

            // coefficient-wise multiplications
            rmse += residual.component_mul(&residual);
        }

        // calculate the mean, then the square root
        let rmse = rmse / estimations.len() as f64;
        Ok(rmse.map(f64::sqrt))
    }

    pub fn chi_square_95(sensor: SensorType) -> f64 {
        match sensor {
            SensorType::Lidar => CHI_SQUARE_95_LIDAR,
            SensorType::Radar => CHI_SQUARE_95_RADAR,
        }
    }

    /// Fraction of Normalised Innovation Squared values above the 95%
    /// threshold for the sensor. A consistent filter sits near 0.05.
    pub fn nis_exceedance(nis_values: &[f64], sensor: SensorType) -> Option<f64> {
        if nis_values.is_empty() {
            return None;
        }
        let threshold = chi_square_95(sensor);
        let above = nis_values.iter().filter(|&&nis| nis > threshold).count();
        Some(above as f64 / nis_values.len() as f64)
    }

}
