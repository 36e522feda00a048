#[allow(non_snake_case)]
pub mod measurement {

    extern crate nalgebra as na;

    use na::Vector4;
    use std::io;

    use crate::config::FilterConfig;
    use crate::error::{FilterError, InputError};
    use crate::ukf_type::ukf::*;

    pub trait HasSensorNoiseCovar<U> {
        fn noise_covar_matrix(&self) -> U;
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct LidarMeasurement {
        pub px: f64,
        pub py: f64,
    }

    impl LidarMeasurement {
        pub fn z(&self) -> LidarStateVector {
            LidarStateVector::new(self.px, self.py)
        }

        pub fn point(&self) -> (f64, f64) {
            (self.px, self.py)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct LidarSensor {
        pub std_laspx: f64, // noise standard deviation px in m
        pub std_laspy: f64, // noise standard deviation py in m
    }

    impl LidarSensor {
        pub fn from_config(config: &FilterConfig) -> LidarSensor {
            LidarSensor {
                std_laspx: config.std_laspx,
                std_laspy: config.std_laspy,
            }
        }
    }

    impl HasSensorNoiseCovar<LidarNoiseCovarMatrix> for LidarSensor {
        fn noise_covar_matrix(&self) -> LidarNoiseCovarMatrix {
            LidarNoiseCovarMatrix::new(
                self.std_laspx * self.std_laspx,
                0.0,
                0.0,
                self.std_laspy * self.std_laspy,
            )
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct RadarMeasurement {
        pub rho: f64,
        pub theta: f64,
        pub rho_dot: f64,
    }

    impl RadarMeasurement {
        pub fn z(&self) -> RadarStateVector {
            RadarStateVector::new(self.rho, self.theta, self.rho_dot)
        }

        pub fn point(&self) -> (f64, f64) {
            (self.rho * self.theta.cos(), self.rho * self.theta.sin())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct RadarSensor {
        pub std_radr: f64,   // noise standard deviation radius in m
        pub std_radphi: f64, // noise standard deviaion angle in rad
        pub std_radrd: f64,  // noise standard deviation radius change in m/s
    }

    impl RadarSensor {
        pub fn from_config(config: &FilterConfig) -> RadarSensor {
            RadarSensor {
                std_radr: config.std_radr,
                std_radphi: config.std_radphi,
                std_radrd: config.std_radrd,
            }
        }
    }

    impl HasSensorNoiseCovar<RadarNoiseCovarMatrix> for RadarSensor {
        fn noise_covar_matrix(&self) -> RadarNoiseCovarMatrix {
            RadarNoiseCovarMatrix::from_diagonal(&RadarStateVector::new(
                self.std_radr * self.std_radr,
                self.std_radphi * self.std_radphi,
                self.std_radrd * self.std_radrd,
            ))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum SensorType {
        Lidar,
        Radar,
    }

    const LIDAR_CHAR: char = 'L';
    const RADAR_CHAR: char = 'R';

    impl SensorType {
        pub fn tag(self) -> char {
            match self {
                SensorType::Lidar => LIDAR_CHAR,
                SensorType::Radar => RADAR_CHAR,
            }
        }

        // size of the raw measurement vector
        pub fn n_z(self) -> usize {
            match self {
                SensorType::Lidar => N_Z_LIDAR,
                SensorType::Radar => N_Z_RADAR,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum SensorReading {
        Lidar(LidarMeasurement),
        Radar(RadarMeasurement),
    }

    /// One timestamped reading. Timestamps are microseconds and must not
    /// decrease across a tracking session.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct MeasurementPackage {
        pub timestamp: u64,
        pub reading: SensorReading,
    }

    impl MeasurementPackage {
        pub fn lidar(timestamp: u64, px: f64, py: f64) -> MeasurementPackage {
            MeasurementPackage {
                timestamp,
                reading: SensorReading::Lidar(LidarMeasurement { px, py }),
            }
        }

        pub fn radar(timestamp: u64, rho: f64, theta: f64, rho_dot: f64) -> MeasurementPackage {
            MeasurementPackage {
                timestamp,
                reading: SensorReading::Radar(RadarMeasurement {
                    rho,
                    theta,
                    rho_dot,
                }),
            }
        }

        /// Builds a package from a raw vector, `[px py]` for lidar and
        /// `[rho phi rho_dot]` for radar.
        pub fn from_raw(
            sensor_type: SensorType,
            timestamp: u64,
            raw_measurements: &[f64],
        ) -> Result<MeasurementPackage, FilterError> {
            if raw_measurements.len() != sensor_type.n_z() {
                return Err(FilterError::InvalidMeasurement(format!(
                    "{:?} measurement needs {} values, got {}",
                    sensor_type,
                    sensor_type.n_z(),
                    raw_measurements.len()
                )));
            }

            let m = match sensor_type {
                SensorType::Lidar => {
                    MeasurementPackage::lidar(timestamp, raw_measurements[0], raw_measurements[1])
                }
                SensorType::Radar => MeasurementPackage::radar(
                    timestamp,
                    raw_measurements[0],
                    raw_measurements[1],
                    raw_measurements[2],
                ),
            };
            m.validate()?;
            Ok(m)
        }

        pub fn sensor_type(&self) -> SensorType {
            match self.reading {
                SensorReading::Lidar(_) => SensorType::Lidar,
                SensorReading::Radar(_) => SensorType::Radar,
            }
        }

        pub fn raw_measurements(&self) -> Vec<f64> {
            match self.reading {
                SensorReading::Lidar(m) => vec![m.px, m.py],
                SensorReading::Radar(m) => vec![m.rho, m.theta, m.rho_dot],
            }
        }

        // measured position in cartesian coordinates
        pub fn point(&self) -> (f64, f64) {
            match self.reading {
                SensorReading::Lidar(m) => m.point(),
                SensorReading::Radar(m) => m.point(),
            }
        }

        pub fn validate(&self) -> Result<(), FilterError> {
            if self.raw_measurements().iter().all(|v| v.is_finite()) {
                Ok(())
            } else {
                Err(FilterError::InvalidMeasurement(format!(
                    "non-finite {:?} measurement at {}",
                    self.sensor_type(),
                    self.timestamp
                )))
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GroundTruthPackage {
        pub x: f64,
        pub y: f64,
        pub vx: f64,
        pub vy: f64,
    }

    impl GroundTruthPackage {
        pub fn to_vector(&self) -> Vector4<f64> {
            Vector4::new(self.x, self.y, self.vx, self.vy)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct EstimationPackage {
        pub x: f64,
        pub y: f64,
        pub vx: f64,
        pub vy: f64,
    }

    impl EstimationPackage {
        pub fn from_state(x: &StateVector) -> EstimationPackage {
            EstimationPackage {
                x: x[0],
                y: x[1],
                vx: x[2] * x[3].cos(),
                vy: x[2] * x[3].sin(),
            }
        }

        pub fn to_vector(&self) -> Vector4<f64> {
            Vector4::new(self.x, self.y, self.vx, self.vy)
        }
    }

    /// A measurement line of the input file, with the ground truth that
    /// follows the timestamp when present.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct InputRecord {
        pub measurement: MeasurementPackage,
        pub ground_truth: Option<GroundTruthPackage>,
    }

    impl InputRecord {
        pub fn from_csv_record(record: &csv::StringRecord, line: u64) -> Result<InputRecord, InputError> {
            // first value will be sensor type
            let tag = field(record, 0, "sensor type", line)?;
            let sensor_type = match tag.chars().next() {
                Some(LIDAR_CHAR) => SensorType::Lidar,
                Some(RADAR_CHAR) => SensorType::Radar,
                _ => {
                    return Err(InputError::UnknownSensor {
                        line,
                        tag: tag.to_string(),
                    })
                }
            };

            let n_z = sensor_type.n_z();
            let mut raw_measurements = Vec::with_capacity(n_z);
            for i in 0..n_z {
                raw_measurements.push(parse_f64(record, i + 1, "measurement", line)?);
            }

            let timestamp_str = field(record, n_z + 1, "timestamp", line)?;
            let timestamp = timestamp_str
                .parse::<u64>()
                .map_err(|_| InputError::InvalidNumber {
                    line,
                    field: "timestamp",
                    value: timestamp_str.to_string(),
                })?;

            let measurement = MeasurementPackage::from_raw(sensor_type, timestamp, &raw_measurements)
                .map_err(|source| InputError::Measurement { line, source })?;

            let gt = n_z + 2;
            let ground_truth = if record.len() > gt {
                Some(GroundTruthPackage {
                    x: parse_f64(record, gt, "ground truth x", line)?,
                    y: parse_f64(record, gt + 1, "ground truth y", line)?,
                    vx: parse_f64(record, gt + 2, "ground truth vx", line)?,
                    vy: parse_f64(record, gt + 3, "ground truth vy", line)?,
                })
            } else {
                None
            };

            Ok(InputRecord {
                measurement,
                ground_truth,
            })
        }
    }

    fn field<'r>(
        record: &'r csv::StringRecord,
        index: usize,
        name: &'static str,
        line: u64,
    ) -> Result<&'r str, InputError> {
        match record.get(index) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(InputError::MissingField { line, field: name }),
        }
    }

    fn parse_f64(
        record: &csv::StringRecord,
        index: usize,
        name: &'static str,
        line: u64,
    ) -> Result<f64, InputError> {
        let value = field(record, index, name, line)?;
        value.parse::<f64>().map_err(|_| InputError::InvalidNumber {
            line,
            field: name,
            value: value.to_string(),
        })
    }

    /// Reads tab separated measurement lines:
    /// `L px py timestamp [gt...]` or `R rho phi rho_dot timestamp [gt...]`.
    pub fn read_measurements<R: io::Read>(reader: R) -> Result<Vec<InputRecord>, InputError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (i, result) in csv_reader.records().enumerate() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 1);
            records.push(InputRecord::from_csv_record(&record, line)?);
        }

        trace!("read {} measurement records", records.len());
        Ok(records)
    }

}
