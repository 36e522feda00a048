#[allow(non_snake_case)]
pub mod ukf {
    extern crate nalgebra as na;
    use na::{DVector, OMatrix, OVector};
    use na::{U15, U2, U3, U5, U7};

    use crate::util::helper::normalize_angle;

    // nalgebra dimension types

    // state dimensions
    pub const N_X: usize = 5;
    pub type UX = U5;

    // augmented state dimensions
    pub const N_AUG: usize = 7;
    pub type UAUG = U7;

    // number of sigma points (2 * N_AUG + 1)
    pub const N_SIGMA: usize = 2 * N_AUG + 1;
    pub type USigmaPoints = U15;

    // size of lidar and radar measurement state vectors
    pub const N_Z_LIDAR: usize = 2;
    pub type UZLIDAR = U2;
    pub const N_Z_RADAR: usize = 3;
    pub type UZRADAR = U3;

    // define the spreading parameter
    pub const LAMBDA: f64 = 3.0 - N_AUG as f64;

    // below this yaw rate the straight line motion model is used
    pub const YAWD_EPSILON: f64 = 1e-3;

    // below this range the radar range rate of a sigma point is taken as zero
    pub const RHO_EPSILON: f64 = 1e-6;

    // innovation covariances with a smaller determinant are treated as singular
    pub const SINGULAR_EPSILON: f64 = 1e-12;

    // state vector: [pos1 pos2 vel_abs yaw_angle yaw_rate] in SI units and rad
    pub type StateVector = OVector<f64, UX>;
    pub type AugStateVector = OVector<f64, UAUG>;

    pub type LidarStateVector = OVector<f64, UZLIDAR>;
    pub type RadarStateVector = OVector<f64, UZRADAR>;

    // measurement covariance matrices
    pub type CovarMatrix = OMatrix<f64, UX, UX>;
    pub type AugCovarMatrix = OMatrix<f64, UAUG, UAUG>;
    pub type CholeskyMatrix = AugCovarMatrix;
    pub type LidarCovarMatrix = OMatrix<f64, UZLIDAR, UZLIDAR>;
    pub type LidarNoiseCovarMatrix = LidarCovarMatrix;
    pub type RadarCovarMatrix = OMatrix<f64, UZRADAR, UZRADAR>;
    pub type RadarNoiseCovarMatrix = RadarCovarMatrix;

    // lidar measurement matrix, projects the state onto [px py]
    pub type LidarProjectionMatrix = OMatrix<f64, UZLIDAR, UX>;

    // augmented sigma points matrix (n_aug, 2 * n_aug + 1)
    pub type AugSigmaPoints = OMatrix<f64, UAUG, USigmaPoints>;

    // predicted sigma points matrix (n_x, 2* n_aug + 1)
    pub type SigmaPoints = OMatrix<f64, UX, USigmaPoints>;
    pub type RadarSigmaPoints = OMatrix<f64, UZRADAR, USigmaPoints>;

    // sigma point weights
    pub type SigmaPointWeights = OVector<f64, USigmaPoints>;

    // cross correlation matrix
    pub type RadarCrossCorrelationMatrix = OMatrix<f64, UX, UZRADAR>;

    pub type LidarKalmanGain = OMatrix<f64, UX, UZLIDAR>;
    pub type RadarKalmanGain = OMatrix<f64, UX, UZRADAR>;

    /// Unscented transform weights for an augmented state of size `n_aug`,
    /// with the spreading parameter `3 - n_aug`. The first weight is negative
    /// once `n_aug > 3`; the weights always sum to one.
    pub fn sigma_point_weights(n_aug: usize) -> DVector<f64> {
        let lambda = 3.0 - n_aug as f64;
        let weight = 0.5 / (n_aug as f64 + lambda);

        let mut weights = DVector::from_element(2 * n_aug + 1, weight);
        weights[0] = lambda / (lambda + n_aug as f64);
        weights
    }

    pub trait NewSigmaPointWeights {
        fn new() -> SigmaPointWeights;
    }

    impl NewSigmaPointWeights for SigmaPointWeights {
        fn new() -> SigmaPointWeights {
            SigmaPointWeights::from_column_slice(sigma_point_weights(N_AUG).as_slice())
        }
    }

    /// Constant turn rate and velocity motion model applied to one augmented
    /// sigma point `[px py v yaw yawd nu_a nu_yawdd]`.
    pub fn ctrv_process_model(x_aug: &AugStateVector, delta_t: f64) -> StateVector {
        // extract values for better readability
        let p_x = x_aug[0];
        let p_y = x_aug[1];
        let v = x_aug[2];
        let yaw = x_aug[3];
        let yawd = x_aug[4];
        let nu_a = x_aug[5];
        let nu_yawdd = x_aug[6];

        // avoid division by zero
        let (mut px_p, mut py_p) = if yawd.abs() > YAWD_EPSILON {
            (
                p_x + v / yawd * ((yaw + yawd * delta_t).sin() - yaw.sin()),
                p_y + v / yawd * (yaw.cos() - (yaw + yawd * delta_t).cos()),
            )
        } else {
            (
                p_x + v * delta_t * yaw.cos(),
                p_y + v * delta_t * yaw.sin(),
            )
        };

        let mut v_p = v;
        let mut yaw_p = yaw + yawd * delta_t;
        let mut yawd_p = yawd;

        // add noise
        px_p += 0.5 * nu_a * delta_t * delta_t * yaw.cos();
        py_p += 0.5 * nu_a * delta_t * delta_t * yaw.sin();
        v_p += nu_a * delta_t;

        yaw_p += 0.5 * nu_yawdd * delta_t * delta_t;
        yawd_p += nu_yawdd * delta_t;

        StateVector::new(px_p, py_p, v_p, yaw_p, yawd_p)
    }

    pub trait HasSigmaPointsMeasurementSpace<U> {
        fn measurement_space(&self) -> U;
    }

    impl HasSigmaPointsMeasurementSpace<RadarSigmaPoints> for SigmaPoints {
        fn measurement_space(&self) -> RadarSigmaPoints {
            let X_sig_pred = self;
            let mut Z_sig = RadarSigmaPoints::zeros();
            let mut degenerate = 0;

            for i in 0..Z_sig.ncols() {
                let p_x = X_sig_pred[(0, i)];
                let p_y = X_sig_pred[(1, i)];
                let v = X_sig_pred[(2, i)];
                let yaw = X_sig_pred[(3, i)];
                let v1 = v * yaw.cos();
                let v2 = v * yaw.sin();

                // measurement model
                let rho = (p_x * p_x + p_y * p_y).sqrt();
                Z_sig[(0, i)] = rho;
                Z_sig[(1, i)] = p_y.atan2(p_x);
                if rho > RHO_EPSILON {
                    Z_sig[(2, i)] = (p_x * v1 + p_y * v2) / rho; // r_dot
                } else {
                    Z_sig[(2, i)] = 0.0;
                    degenerate += 1;
                }
            }

            if degenerate > 0 {
                warn!("{} sigma points at the radar origin, range rate set to zero", degenerate);
            }

            Z_sig
        }
    }

    pub trait HasSensorVector<T> {
        fn predicted_measurement(&self, weights: &SigmaPointWeights) -> T;
    }

    impl HasSensorVector<RadarStateVector> for RadarSigmaPoints {
        fn predicted_measurement(&self, weights: &SigmaPointWeights) -> RadarStateVector {
            // mean predicted measurement
            self * weights
        }
    }

    pub trait HasSensorCovar<T, U> {
        fn measurement_covar(&self, z_pred: &U, weights: &SigmaPointWeights) -> T;
    }

    impl HasSensorCovar<RadarCovarMatrix, RadarStateVector> for RadarSigmaPoints {
        fn measurement_covar(
            &self,
            z_pred: &RadarStateVector,
            weights: &SigmaPointWeights,
        ) -> RadarCovarMatrix {
            let mut S = RadarCovarMatrix::zeros();

            // measurement covariance matrix S
            for i in 0..self.ncols() {
                let mut z_diff = self.column(i) - z_pred;
                z_diff[1] = normalize_angle(z_diff[1]);
                S += weights[i] * z_diff * z_diff.transpose();
            }

            S
        }
    }

    pub trait HasCrossCorrelationMatrix<T, U> {
        fn Tc(
            &self,
            z_pred: &U,
            X_sig_pred: &SigmaPoints,
            x: &StateVector,
            weights: &SigmaPointWeights,
        ) -> T;
    }

    impl HasCrossCorrelationMatrix<RadarCrossCorrelationMatrix, RadarStateVector>
        for RadarSigmaPoints
    {
        fn Tc(
            &self,
            z_pred: &RadarStateVector,
            X_sig_pred: &SigmaPoints,
            x: &StateVector,
            weights: &SigmaPointWeights,
        ) -> RadarCrossCorrelationMatrix {
            let mut Tc = RadarCrossCorrelationMatrix::zeros();

            for i in 0..self.ncols() {
                let mut z_diff = self.column(i) - z_pred;
                z_diff[1] = normalize_angle(z_diff[1]);
                let mut x_diff = X_sig_pred.column(i) - x;
                x_diff[3] = normalize_angle(x_diff[3]);
                Tc += weights[i] * x_diff * z_diff.transpose();
            }

            Tc
        }
    }

    pub trait HasInverseCovar<T> {
        /// Inverse of an innovation covariance, `None` when it is singular
        /// or too close to singular to trust.
        fn checked_inverse(&self) -> Option<T>;
    }

    impl HasInverseCovar<LidarCovarMatrix> for LidarCovarMatrix {
        fn checked_inverse(&self) -> Option<LidarCovarMatrix> {
            if !(self.determinant().abs() > SINGULAR_EPSILON) {
                return None;
            }
            self.try_inverse().filter(|inv| inv.iter().all(|v| v.is_finite()))
        }
    }

    impl HasInverseCovar<RadarCovarMatrix> for RadarCovarMatrix {
        fn checked_inverse(&self) -> Option<RadarCovarMatrix> {
            if !(self.determinant().abs() > SINGULAR_EPSILON) {
                return None;
            }
            self.try_inverse().filter(|inv| inv.iter().all(|v| v.is_finite()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use approx::{assert_abs_diff_eq, assert_relative_eq};
        use std::f64::consts::PI;

        #[test]
        fn weights_sum_to_one_for_any_augmented_size() {
            for n_aug in 1..=12 {
                let weights = sigma_point_weights(n_aug);
                assert_eq!(weights.len(), 2 * n_aug + 1);
                assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-12);
            }
        }

        #[test]
        fn first_weight_is_negative_for_seven_dimensions() {
            let weights = SigmaPointWeights::new();
            assert_relative_eq!(weights[0], -4.0 / 3.0, epsilon = 1e-12);
            for i in 1..N_SIGMA {
                assert_relative_eq!(weights[i], 1.0 / 6.0, epsilon = 1e-12);
            }
            assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-12);
        }

        #[test]
        fn straight_line_motion_without_noise() {
            let x_aug = AugStateVector::from_column_slice(&[1.0, 2.0, 3.0, PI / 2.0, 0.0, 0.0, 0.0]);
            let x = ctrv_process_model(&x_aug, 0.5);

            assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[1], 3.5, epsilon = 1e-12);
            assert_abs_diff_eq!(x[2], 3.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[3], PI / 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[4], 0.0, epsilon = 1e-12);
        }

        #[test]
        fn quarter_turn_lands_on_the_circle() {
            // radius v / yawd = 2, a quarter turn from heading 0
            let yawd = PI / 2.0;
            let x_aug = AugStateVector::from_column_slice(&[0.0, 0.0, 2.0 * yawd, 0.0, yawd, 0.0, 0.0]);
            let x = ctrv_process_model(&x_aug, 1.0);

            assert_abs_diff_eq!(x[0], 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[3], PI / 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[4], yawd, epsilon = 1e-12);
        }

        #[test]
        fn noise_terms_enter_every_component() {
            let x_aug = AugStateVector::from_column_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 4.0]);
            let x = ctrv_process_model(&x_aug, 0.1);

            assert_abs_diff_eq!(x[0], 0.5 * 2.0 * 0.01, epsilon = 1e-12);
            assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(x[2], 0.2, epsilon = 1e-12);
            assert_abs_diff_eq!(x[3], 0.5 * 4.0 * 0.01, epsilon = 1e-12);
            assert_abs_diff_eq!(x[4], 0.4, epsilon = 1e-12);
        }

        #[test]
        fn position_is_continuous_across_the_yaw_rate_threshold() {
            let dt = 0.1;
            for &sign in [1.0, -1.0].iter() {
                let turning = AugStateVector::from_column_slice(&[
                    1.0,
                    -2.0,
                    5.0,
                    0.7,
                    sign * YAWD_EPSILON * (1.0 + 1e-9),
                    0.0,
                    0.0,
                ]);
                let straight = AugStateVector::from_column_slice(&[
                    1.0,
                    -2.0,
                    5.0,
                    0.7,
                    sign * YAWD_EPSILON * (1.0 - 1e-9),
                    0.0,
                    0.0,
                ]);

                let a = ctrv_process_model(&turning, dt);
                let b = ctrv_process_model(&straight, dt);

                // gap is bounded by the arc sagitta v * yawd * dt^2 / 2
                let bound = 5.0 * YAWD_EPSILON * dt * dt;
                assert!((a[0] - b[0]).abs() < bound);
                assert!((a[1] - b[1]).abs() < bound);
                assert_abs_diff_eq!(a[3], b[3], epsilon = 1e-9);
            }
        }

        #[test]
        fn turning_branch_converges_to_straight_line() {
            let dt = 0.2;
            let straight = ctrv_process_model(
                &AugStateVector::from_column_slice(&[0.0, 0.0, 4.0, -0.3, 0.0, 0.0, 0.0]),
                dt,
            );

            let mut previous_gap = f64::INFINITY;
            for &yawd in [1e-1, 1e-2, 2e-3].iter() {
                let turning = ctrv_process_model(
                    &AugStateVector::from_column_slice(&[0.0, 0.0, 4.0, -0.3, yawd, 0.0, 0.0]),
                    dt,
                );
                let gap = ((turning[0] - straight[0]).powi(2) + (turning[1] - straight[1]).powi(2)).sqrt();
                assert!(gap < previous_gap);
                previous_gap = gap;
            }
            assert!(previous_gap < 1e-3);
        }

        #[test]
        fn radar_projection_of_a_point_moving_away() {
            let mut X_sig_pred = SigmaPoints::zeros();
            for i in 0..N_SIGMA {
                X_sig_pred.set_column(i, &StateVector::new(3.0, 4.0, 2.0, (4.0f64).atan2(3.0), 0.0));
            }

            let Z_sig: RadarSigmaPoints = X_sig_pred.measurement_space();
            for i in 0..N_SIGMA {
                assert_abs_diff_eq!(Z_sig[(0, i)], 5.0, epsilon = 1e-12);
                assert_abs_diff_eq!(Z_sig[(1, i)], (4.0f64).atan2(3.0), epsilon = 1e-12);
                assert_abs_diff_eq!(Z_sig[(2, i)], 2.0, epsilon = 1e-12);
            }
        }

        #[test]
        fn radar_projection_at_the_origin_has_zero_range_rate() {
            let X_sig_pred = SigmaPoints::from_fn(|r, _| if r == 2 { 3.0 } else { 0.0 });
            let Z_sig: RadarSigmaPoints = X_sig_pred.measurement_space();
            for i in 0..N_SIGMA {
                assert_eq!(Z_sig[(0, i)], 0.0);
                assert_eq!(Z_sig[(2, i)], 0.0);
            }
        }

        #[test]
        fn radar_covariance_wraps_bearing_residuals() {
            // bearings straddle +/- pi, the spread must stay small
            let weights = SigmaPointWeights::new();
            let Z_sig = RadarSigmaPoints::from_fn(|r, c| match r {
                0 => 10.0,
                1 if c == 0 => PI,
                1 if c % 2 == 0 => PI - 0.01,
                1 => -PI + 0.01,
                _ => 0.0,
            });
            let z_pred = RadarStateVector::new(10.0, PI, 0.0);
            let S = Z_sig.measurement_covar(&z_pred, &weights);

            assert!(S[(1, 1)] < 1e-3);
            assert_abs_diff_eq!(S[(0, 0)], 0.0, epsilon = 1e-12);
        }

        #[test]
        fn singular_covariance_has_no_inverse() {
            let S = LidarCovarMatrix::new(1.0, 2.0, 2.0, 4.0);
            assert!(S.checked_inverse().is_none());

            let S = RadarCovarMatrix::from_diagonal_element(0.5);
            let inv = S.checked_inverse().unwrap();
            assert_relative_eq!(inv, RadarCovarMatrix::from_diagonal_element(2.0), epsilon = 1e-12);
        }
    }
}
