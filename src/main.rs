extern crate clap;
extern crate nalgebra as na;

#[macro_use(
    o,
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
extern crate slog_async;
#[macro_use]
extern crate slog_scope;
extern crate slog_term;

use clap::Parser;
use na::Vector4;
use serde_derive::Serialize;
use slog::Drain;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;
use thiserror::Error;

use ukf_fusion::sensor::measurement::{read_measurements, InputRecord};
use ukf_fusion::util::helper::{calculate_rmse, nis_exceedance};
use ukf_fusion::{
    ConfigError, EstimationPackage, EvaluationError, FilterConfig, FilterError, InputError,
    SensorType, UnscentedKalmanFilter, UKF,
};

#[derive(Debug, Error)]
enum AppError {
    #[error("input file {0} does not exist or isn't a file")]
    NoInput(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("failed to write output: {0}")]
    Output(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("measurement {index}: {source}")]
    Filter { index: usize, source: FilterError },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

#[derive(Parser, Debug)]
#[clap(
    name = "ukf",
    version,
    author = "Nick Hortovanyi",
    about = "Unscented Kalman Filter fusing lidar and radar measurements"
)]
struct Cli {
    /// Sets the measurement input file to use
    #[clap(parse(from_os_str))]
    input: PathBuf,

    /// Output file to use
    #[clap(parse(from_os_str))]
    output: PathBuf,

    /// verbosity level
    #[clap(short, long, parse(from_occurrences))]
    verbose: u64,

    /// ignore lidar measurements (except for init)
    #[clap(long)]
    no_laser: bool,

    /// ignore radar measurements (except for init)
    #[clap(long)]
    no_radar: bool,

    /// process noise standard deviation longitudinal acceleration in m/s^2
    #[clap(long)]
    std_a: Option<f64>,

    /// process noise standard deviation yaw acceleration in rad/s^2
    #[clap(long)]
    std_yawdd: Option<f64>,

    /// lidar noise standard deviation px in m
    #[clap(long)]
    std_laspx: Option<f64>,

    /// lidar noise standard deviation py in m
    #[clap(long)]
    std_laspy: Option<f64>,

    /// radar noise standard deviation radius in m
    #[clap(long)]
    std_radr: Option<f64>,

    /// radar noise standard deviation angle in rad
    #[clap(long)]
    std_radphi: Option<f64>,

    /// radar noise standard deviation radius change in m/s
    #[clap(long)]
    std_radrd: Option<f64>,
}

impl Cli {
    fn filter_config(&self) -> FilterConfig {
        let defaults = FilterConfig::default();
        FilterConfig {
            use_laser: !self.no_laser,
            use_radar: !self.no_radar,
            std_a: self.std_a.unwrap_or(defaults.std_a),
            std_yawdd: self.std_yawdd.unwrap_or(defaults.std_yawdd),
            std_laspx: self.std_laspx.unwrap_or(defaults.std_laspx),
            std_laspy: self.std_laspy.unwrap_or(defaults.std_laspy),
            std_radr: self.std_radr.unwrap_or(defaults.std_radr),
            std_radphi: self.std_radphi.unwrap_or(defaults.std_radphi),
            std_radrd: self.std_radrd.unwrap_or(defaults.std_radrd),
        }
    }
}

// one line of the output file
#[derive(Debug, Serialize)]
struct OutputRecord {
    px: f64,
    py: f64,
    v: f64,
    yaw: f64,
    yaw_rate: f64,
    sensor: char,
    nis: Option<f64>,
    meas_px: f64,
    meas_py: f64,
    gt_px: Option<f64>,
    gt_py: Option<f64>,
    gt_vx: Option<f64>,
    gt_vy: Option<f64>,
}

// what a run over the input produced, besides the output rows
#[derive(Debug)]
struct RunSummary {
    rows: usize,
    rmse: Option<Vector4<f64>>,
    lidar_nis_exceedance: Option<f64>,
    radar_nis_exceedance: Option<f64>,
}

fn run_ukf<W: std::io::Write>(
    records: &[InputRecord],
    config: FilterConfig,
    output: W,
) -> Result<RunSummary, AppError> {
    trace!("run_ukf start");

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(output);

    let mut ukf = UnscentedKalmanFilter::with_config(config)?;
    // rmse needs ground truth on every line
    let complete_ground_truth =
        !records.is_empty() && records.iter().all(|r| r.ground_truth.is_some());
    let mut estimations = Vec::with_capacity(records.len());
    let mut ground_truths = Vec::with_capacity(records.len());
    let mut lidar_nis = Vec::new();
    let mut radar_nis = Vec::new();

    info!("processing measurement data ....");
    for (index, record) in records.iter().enumerate() {
        let m = &record.measurement;
        let x = ukf
            .process_measurement(m)
            .map_err(|source| AppError::Filter { index, source })?;

        let nis = ukf.last_nis();
        if let Some(nis) = nis {
            match nis.sensor {
                SensorType::Lidar => lidar_nis.push(nis.value),
                SensorType::Radar => radar_nis.push(nis.value),
            }
        }

        if let Some(gt) = record.ground_truth {
            estimations.push(EstimationPackage::from_state(&x).to_vector());
            ground_truths.push(gt.to_vector());
        }

        let (meas_px, meas_py) = m.point();
        writer.serialize(OutputRecord {
            px: x[0],
            py: x[1],
            v: x[2],
            yaw: x[3],
            yaw_rate: x[4],
            sensor: m.sensor_type().tag(),
            nis: nis.map(|nis| nis.value),
            meas_px,
            meas_py,
            gt_px: record.ground_truth.map(|gt| gt.x),
            gt_py: record.ground_truth.map(|gt| gt.y),
            gt_vx: record.ground_truth.map(|gt| gt.vx),
            gt_vy: record.ground_truth.map(|gt| gt.vy),
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;

    let rmse = if complete_ground_truth {
        Some(calculate_rmse(&estimations, &ground_truths)?)
    } else {
        info!(
            "ground truth on {} of {} lines, skipping rmse",
            ground_truths.len(),
            records.len()
        );
        None
    };

    trace!("run_ukf finish");
    Ok(RunSummary {
        rows: records.len(),
        rmse,
        lidar_nis_exceedance: nis_exceedance(&lidar_nis, SensorType::Lidar),
        radar_nis_exceedance: nis_exceedance(&radar_nis, SensorType::Radar),
    })
}

fn run(cli: Cli) -> Result<(), AppError> {
    trace!("app_setup");
    if !cli.input.is_file() {
        error!("input_path: {} does not exist or isn't a file", cli.input.display());
        return Err(AppError::NoInput(cli.input));
    }
    if cli.output.is_file() {
        warn!("output_path: {} will be overwritten", cli.output.display());
    }

    let config = cli.filter_config();
    debug!("{:?}", config);

    debug!("opening input for read: `{}`", cli.input.display());
    let input_file = File::open(&cli.input).map_err(|source| AppError::Io {
        path: cli.input.clone(),
        source,
    })?;

    info!("loading measurement data ....");
    let records = read_measurements(BufReader::new(input_file))?;

    debug!("creating output: `{}`", cli.output.display());
    let output_file = File::create(&cli.output).map_err(|source| AppError::Io {
        path: cli.output.clone(),
        source,
    })?;

    trace!("app_setup_complete");
    // starting processing...
    info!("processing_started");
    let summary = run_ukf(&records, config, output_file)?;
    info!("processing_finished"; "rows" => summary.rows);

    if let Some(rmse) = summary.rmse {
        info!("rmse"; "px" => rmse[0], "py" => rmse[1], "vx" => rmse[2], "vy" => rmse[3]);
    }
    if let Some(exceedance) = summary.lidar_nis_exceedance {
        info!("lidar nis above 95% threshold: {:.1}%", exceedance * 100.0);
    }
    if let Some(exceedance) = summary.radar_nis_exceedance {
        info!("radar nis above 95% threshold: {:.1}%", exceedance * 100.0);
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let min_log_level = match cli.verbose {
        0 => slog::Level::Info,
        1 => slog::Level::Debug,
        _ => slog::Level::Trace,
    };
    let decorator = slog_term::TermDecorator::new().build();
    let out_drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let out_drain = slog::LevelFilter(out_drain, min_log_level).fuse();
    let drain = slog_async::Async::new(out_drain).build().fuse();

    let logger = slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")));

    let exit_code = {
        let _logger_guard = slog_scope::set_global_logger(logger);
        debug!("slog::Level::{}", min_log_level.as_str());

        match run(cli) {
            Ok(()) => 0,
            Err(err) => {
                error!("Application error: {}", err);
                1
            }
        }
    };

    process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_GROUND_TRUTH: &str = "\
R\t3.162278\t0.321751\t4.998817\t1477010443000000\t3.000000\t1.000000\t4.776682\t1.477601
L\t3.238461\t1.075073\t1477010443050000\t3.238461\t1.075073\t4.761668\t1.525293
R\t3.662240\t0.320146\t5.000000\t1477010443100000\t3.476159\t1.152527\t4.746177\t1.572833
L\t3.713071\t1.232354\t1477010443150000\t3.713071\t1.232354\t4.730212\t1.620215
R\t4.162210\t0.321330\t4.999129\t1477010443200000\t3.949172\t1.314546\t4.713773\t1.667435
L\t4.184440\t1.399094\t1477010443250000\t4.184440\t1.399094\t4.696864\t1.714489
";

    const WITHOUT_GROUND_TRUTH: &str = "\
R\t3.162278\t0.321751\t4.998817\t1477010443000000
L\t3.238461\t1.075073\t1477010443050000
R\t3.662240\t0.320146\t5.000000\t1477010443100000
L\t3.713071\t1.232354\t1477010443150000
";

    const PARTIAL_GROUND_TRUTH: &str = "\
R\t3.162278\t0.321751\t4.998817\t1477010443000000\t3.000000\t1.000000\t4.776682\t1.477601
L\t3.238461\t1.075073\t1477010443050000
R\t3.662240\t0.320146\t5.000000\t1477010443100000\t3.476159\t1.152527\t4.746177\t1.572833
";

    const HEADER: &str =
        "px\tpy\tv\tyaw\tyaw_rate\tsensor\tnis\tmeas_px\tmeas_py\tgt_px\tgt_py\tgt_vx\tgt_vy";

    fn run_over(input: &str, config: FilterConfig) -> (Result<RunSummary, AppError>, String) {
        let records = read_measurements(input.as_bytes()).unwrap();
        let mut out = Vec::new();
        let result = run_ukf(&records, config, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn writes_one_row_per_measurement_with_rmse() {
        let (result, output) = run_over(WITH_GROUND_TRUTH, FilterConfig::default());
        let summary = result.unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 7);
        assert_eq!(summary.rows, 6);

        // initialising row has no nis
        let first: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(first.len(), 13);
        assert_eq!(first[5], "R");
        assert_eq!(first[6], "");
        assert_eq!(first[9], "3.0");

        let second: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(second[5], "L");
        assert!(second[6].parse::<f64>().unwrap() >= 0.0);

        let rmse = summary.rmse.unwrap();
        assert!(rmse.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(summary.lidar_nis_exceedance.is_some());
        assert!(summary.radar_nis_exceedance.is_some());
    }

    #[test]
    fn missing_ground_truth_skips_rmse() {
        let (result, output) = run_over(WITHOUT_GROUND_TRUTH, FilterConfig::default());
        let summary = result.unwrap();

        assert!(summary.rmse.is_none());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 5);
        for line in &lines[1..] {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 13);
            assert!(fields[9..].iter().all(|f| f.is_empty()));
        }
    }

    #[test]
    fn partial_ground_truth_skips_rmse_and_keeps_output() {
        let (result, output) = run_over(PARTIAL_GROUND_TRUTH, FilterConfig::default());
        let summary = result.unwrap();

        assert!(summary.rmse.is_none());
        assert_eq!(summary.rows, 3);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("\t\t\t\t"));
    }

    #[test]
    fn nis_summary_only_covers_enabled_sensors() {
        let config = FilterConfig { use_radar: false, ..FilterConfig::default() };
        let (result, _) = run_over(WITH_GROUND_TRUTH, config);
        let summary = result.unwrap();

        let exceedance = summary.lidar_nis_exceedance.unwrap();
        assert!((0.0..=1.0).contains(&exceedance));
        assert!(summary.radar_nis_exceedance.is_none());
    }

    #[test]
    fn filter_error_names_the_measurement() {
        let input = "\
L\t1.0\t1.0\t2000000
L\t1.1\t1.0\t1000000
";
        let (result, _) = run_over(input, FilterConfig::default());
        match result {
            Err(AppError::Filter { index, source }) => {
                assert_eq!(index, 1);
                assert_eq!(
                    source,
                    FilterError::NonMonotonicTimestamp { previous: 2_000_000, current: 1_000_000 }
                );
            }
            other => panic!("expected a filter error, got {:?}", other),
        }
    }

    #[test]
    fn cli_overrides_default_noise() {
        let cli = Cli::parse_from(&["ukf", "in.txt", "out.txt", "--no-radar", "--std-a", "0.5"]);
        let config = cli.filter_config();

        assert!(config.use_laser);
        assert!(!config.use_radar);
        assert_eq!(config.std_a, 0.5);
        assert_eq!(config.std_yawdd, FilterConfig::default().std_yawdd);
    }
}
