#[allow(non_snake_case)]
pub mod kalman_filter {

  extern crate nalgebra as na;
  use na::Cholesky;

  use crate::config::FilterConfig;
  use crate::error::{ConfigError, FilterError};
  use crate::sensor::measurement::{HasSensorNoiseCovar, LidarMeasurement, LidarSensor,
                                   MeasurementPackage, RadarMeasurement, RadarSensor,
                                   SensorReading, SensorType};
  use crate::ukf_type::ukf::*;
  use crate::util::helper::{normalize_angle, symmetrise};

  // timestamps are in microseconds
  const MICROS_PER_SECOND: f64 = 1_000_000.0;

  /// Normalised Innovation Squared of an update.
  #[derive(Debug, Clone, Copy, PartialEq)]
  pub struct Nis {
    pub sensor: SensorType,
    pub value: f64,
  }

  #[derive(Debug, Clone, Copy, PartialEq)]
  pub enum FilterState {
    // waiting for the first measurement
    Uninitialised,

    // state vector, covariance and the timestamp they refer to
    Tracking {
      x: StateVector,
      P: CovarMatrix,
      prev_timestamp: u64,
    },
  }

  #[derive(Debug, Clone)]
  pub struct UnscentedKalmanFilter {
    config: FilterConfig,

    lidar: LidarSensor,

    radar: RadarSensor,

    // sigma point weights, fixed for the lifetime of the filter
    weights: SigmaPointWeights,

    state: FilterState,

    // NIS of the latest update, None if the latest measurement was not used
    last_nis: Option<Nis>,
  }

  pub trait UKFPredict {
    fn prediction(std_a: f64, std_yawdd: f64, weights: &SigmaPointWeights,
                  x: &StateVector, P: &CovarMatrix, delta_t: f64)
                  -> Result<(SigmaPoints, StateVector, CovarMatrix), FilterError> {
      let X_sig_aug = Self::augmented_sigma_points(std_a, std_yawdd, x, P)?;
      let X_sig_pred = Self::predict_sigma_points(delta_t, &X_sig_aug);
      let (x, P) = Self::predict_mean_and_covar(&X_sig_pred, weights);
      Ok((X_sig_pred, x, P))
    }

    fn augmented_sigma_points(std_a: f64, std_yawdd: f64, x: &StateVector, P: &CovarMatrix)
                              -> Result<AugSigmaPoints, FilterError> {
      // create augmented state vector
      let mut x_aug = AugStateVector::zeros();
      x_aug.fixed_rows_mut::<N_X>(0).copy_from(x);

      // create augmented coveriance matrix
      let mut P_aug = AugCovarMatrix::zeros();
      P_aug.fixed_slice_mut::<N_X, N_X>(0, 0).copy_from(P);
      P_aug[(5, 5)] = std_a * std_a;
      P_aug[(6, 6)] = std_yawdd * std_yawdd;

      // square root of P
      let L: CholeskyMatrix = match Cholesky::new(P_aug) {
        Some(cholesky) => cholesky.l(),
        None => {
          warn!("no cholesky! P_aug:{:?}", P_aug.as_slice());
          return Err(FilterError::CovarianceNotPositiveDefinite);
        }
      };
      if !L.iter().all(|v| v.is_finite()) {
        warn!("cholesky factor is not finite");
        return Err(FilterError::CovarianceNotPositiveDefinite);
      }

      let spread = (LAMBDA + N_AUG as f64).sqrt();

      let mut X_sig_aug = AugSigmaPoints::zeros();
      X_sig_aug.set_column(0, &x_aug);

      for i in 0..N_AUG {
        X_sig_aug.set_column(i + 1, &(x_aug + spread * L.column(i)));
        X_sig_aug.set_column(i + 1 + N_AUG, &(x_aug - spread * L.column(i)));
      }

      Ok(X_sig_aug)
    }

    fn predict_sigma_points(delta_t: f64, X_sig_aug: &AugSigmaPoints) -> SigmaPoints {
      let mut X_sig_pred = SigmaPoints::zeros();

      for i in 0..N_SIGMA {
        let x_aug: AugStateVector = X_sig_aug.column(i).into_owned();
        X_sig_pred.set_column(i, &ctrv_process_model(&x_aug, delta_t));
      }

      X_sig_pred
    }

    fn predict_mean_and_covar(X_sig_pred: &SigmaPoints, weights: &SigmaPointWeights)
                              -> (StateVector, CovarMatrix) {
      // predicted state mean
      let x: StateVector = X_sig_pred * weights;

      // predicted state covariance matrix
      let mut P = CovarMatrix::zeros();
      for i in 0..N_SIGMA {
        let mut x_diff = X_sig_pred.column(i) - x;
        // a heading wrapping around pi must not blow up the covariance
        x_diff[3] = normalize_angle(x_diff[3]);
        P += weights[i] * x_diff * x_diff.transpose();
      }

      (x, symmetrise(&P))
    }
  }

  pub trait UKFLidarUpdate {
    /// Linear Kalman update, the lidar measures [px py] directly.
    fn lidar_update(lidar: &LidarSensor, m: &LidarMeasurement, x: &StateVector, P: &CovarMatrix)
                    -> Result<(StateVector, CovarMatrix, f64), FilterError> {
      let H = LidarProjectionMatrix::identity();
      let R = lidar.noise_covar_matrix();

      let y = m.z() - H * x;
      let Ht = H.transpose();
      let S = H * P * Ht + R;
      let Si = S.checked_inverse()
        .ok_or(FilterError::SingularInnovationCovariance { sensor: SensorType::Lidar })?;
      let K: LidarKalmanGain = P * Ht * Si;

      let x = x + K * y;
      let P = (CovarMatrix::identity() - K * H) * P;

      // Normalised Innovation Squared
      let nis = (y.transpose() * Si * y)[(0, 0)];

      Ok((x, symmetrise(&P), nis))
    }
  }

  pub trait UKFRadarUpdate {
    /// Unscented update, reusing the sigma points of the current prediction.
    fn radar_update(radar: &RadarSensor, weights: &SigmaPointWeights, m: &RadarMeasurement,
                    X_sig_pred: &SigmaPoints, x: &StateVector, P: &CovarMatrix)
                    -> Result<(StateVector, CovarMatrix, f64), FilterError> {
      // transform sigma points into measurement space
      let Z_sig: RadarSigmaPoints = X_sig_pred.measurement_space();

      let z_pred: RadarStateVector = Z_sig.predicted_measurement(weights);

      // add measurement noise covariance matrix
      let S: RadarCovarMatrix = Z_sig.measurement_covar(&z_pred, weights) + radar.noise_covar_matrix();

      let Tc: RadarCrossCorrelationMatrix = Z_sig.Tc(&z_pred, X_sig_pred, x, weights);

      let Si = S.checked_inverse()
        .ok_or(FilterError::SingularInnovationCovariance { sensor: SensorType::Radar })?;
      let K: RadarKalmanGain = Tc * Si;

      // residual
      let mut z_diff = m.z() - z_pred;
      z_diff[1] = normalize_angle(z_diff[1]);

      let x = x + K * z_diff;
      let P = P - K * S * K.transpose();

      // Normalised Innovation Squared
      let nis = (z_diff.transpose() * Si * z_diff)[(0, 0)];

      Ok((x, symmetrise(&P), nis))
    }
  }

  pub trait UKF: UKFPredict + UKFLidarUpdate + UKFRadarUpdate {
    fn new() -> Self;
    fn init_state_lidar(m: &LidarMeasurement) -> StateVector;
    fn init_state_radar(m: &RadarMeasurement) -> StateVector;
    fn process_measurement(&mut self, m: &MeasurementPackage) -> Result<StateVector, FilterError>;
  }

  impl UKFPredict for UnscentedKalmanFilter {}
  impl UKFLidarUpdate for UnscentedKalmanFilter {}
  impl UKFRadarUpdate for UnscentedKalmanFilter {}

  impl UKF for UnscentedKalmanFilter {
    fn new() -> UnscentedKalmanFilter {
      UnscentedKalmanFilter::build(FilterConfig::default(), FilterState::Uninitialised)
    }

    fn init_state_lidar(m: &LidarMeasurement) -> StateVector {
      let x = StateVector::new(m.px, m.py, 0.0, 0.0, 0.0);

      trace!("init_state_lidar x:{:?}", x.as_slice());
      x
    }

    /// Range rate stands in for the speed. This only holds for radial motion
    /// and is kept as a rough first guess.
    fn init_state_radar(m: &RadarMeasurement) -> StateVector {
      let rho = m.rho; // Range - radial distance from origin
      let phi = m.theta; // bearing - angle between rho and x
      let rho_dot = m.rho_dot; // Radial Velocity - change of p(range rate)

      let px = rho * phi.cos(); // metres
      let py = rho * phi.sin();
      let v = rho_dot; // metres/sec

      let x = StateVector::new(px, py, v, 0.0, 0.0);

      trace!("init_state_radar x:{:?}", x.as_slice());
      x
    }

    fn process_measurement(&mut self, m: &MeasurementPackage) -> Result<StateVector, FilterError> {
      m.validate()?;

      let (x, P, prev_timestamp) = match self.state {
        FilterState::Uninitialised => return Ok(self.initialise(m)),
        FilterState::Tracking { x, P, prev_timestamp } => (x, P, prev_timestamp),
      };

      if m.timestamp < prev_timestamp {
        warn!("measurement at {} arrived after {}, rejected", m.timestamp, prev_timestamp);
        return Err(FilterError::NonMonotonicTimestamp { previous: prev_timestamp, current: m.timestamp });
      }

      let delta_t = (m.timestamp - prev_timestamp) as f64 / MICROS_PER_SECOND;
      trace!("delta_t:{}", delta_t);

      // predict, ...
      let (X_sig_pred, x, P) = Self::prediction(self.config.std_a, self.config.std_yawdd,
                                                &self.weights, &x, &P, delta_t)?;

      // then update!
      let (x, P, nis) = match m.reading {
        SensorReading::Lidar(ref lidar) if self.config.use_laser => {
          let (x, P, nis) = Self::lidar_update(&self.lidar, lidar, &x, &P)?;
          (x, P, Some(Nis { sensor: SensorType::Lidar, value: nis }))
        }
        SensorReading::Radar(ref radar) if self.config.use_radar => {
          let (x, P, nis) = Self::radar_update(&self.radar, &self.weights, radar, &X_sig_pred, &x, &P)?;
          (x, P, Some(Nis { sensor: SensorType::Radar, value: nis }))
        }
        _ => {
          trace!("{:?} updates disabled, keeping prediction", m.sensor_type());
          (x, P, None)
        }
      };

      if let Some(nis) = nis {
        debug!("{:?} nis:{}", nis.sensor, nis.value);
      }
      debug!("x:{:?}", x.as_slice());
      trace!("P:{:?}", P.as_slice());

      self.state = FilterState::Tracking { x, P, prev_timestamp: m.timestamp };
      self.last_nis = nis;

      Ok(x)
    }
  }

  impl Default for UnscentedKalmanFilter {
    fn default() -> UnscentedKalmanFilter {
      <UnscentedKalmanFilter as UKF>::new()
    }
  }

  impl UnscentedKalmanFilter {
    fn build(config: FilterConfig, state: FilterState) -> UnscentedKalmanFilter {
      UnscentedKalmanFilter {
        config,
        lidar: LidarSensor::from_config(&config),
        radar: RadarSensor::from_config(&config),
        weights: <SigmaPointWeights as NewSigmaPointWeights>::new(),
        state,
        last_nis: None,
      }
    }

    pub fn with_config(config: FilterConfig) -> Result<UnscentedKalmanFilter, ConfigError> {
      config.validate()?;
      Ok(UnscentedKalmanFilter::build(config, FilterState::Uninitialised))
    }

    /// Resumes tracking from a known state and covariance.
    ///
    /// `P` must be strictly positive definite. A covariance with a zero
    /// variance is accepted here but the next measurement fails with
    /// `FilterError::CovarianceNotPositiveDefinite`.
    pub fn from_state(config: FilterConfig, x: StateVector, P: CovarMatrix, timestamp: u64)
                      -> Result<UnscentedKalmanFilter, ConfigError> {
      config.validate()?;
      Ok(UnscentedKalmanFilter::build(config, FilterState::Tracking { x, P, prev_timestamp: timestamp }))
    }

    // the only way out of Uninitialised, the first measurement is never predicted or updated
    fn initialise(&mut self, m: &MeasurementPackage) -> StateVector {
      let x = match m.reading {
        SensorReading::Lidar(ref lidar) => Self::init_state_lidar(lidar),
        SensorReading::Radar(ref radar) => Self::init_state_radar(radar),
      };
      let P = CovarMatrix::identity();

      self.state = FilterState::Tracking { x, P, prev_timestamp: m.timestamp };
      self.last_nis = None;

      debug!("initialised from {:?} at {}", m.sensor_type(), m.timestamp);
      debug!("init x:{:?}", x.as_slice());
      x
    }

    pub fn config(&self) -> &FilterConfig {
      &self.config
    }

    pub fn weights(&self) -> &SigmaPointWeights {
      &self.weights
    }

    pub fn state(&self) -> &FilterState {
      &self.state
    }

    pub fn is_initialised(&self) -> bool {
      match self.state {
        FilterState::Uninitialised => false,
        FilterState::Tracking { .. } => true,
      }
    }

    pub fn x(&self) -> Option<&StateVector> {
      match self.state {
        FilterState::Uninitialised => None,
        FilterState::Tracking { ref x, .. } => Some(x),
      }
    }

    pub fn covariance(&self) -> Option<&CovarMatrix> {
      match self.state {
        FilterState::Uninitialised => None,
        FilterState::Tracking { ref P, .. } => Some(P),
      }
    }

    pub fn last_nis(&self) -> Option<Nis> {
      self.last_nis
    }
  }

}
