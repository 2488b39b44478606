mod fit;
pub use fit::{calibrate_rpc, evaluate, FitLog, FitOptions, FitStats};

use std::fmt::Write as _;
use std::path::Path;

use nalgebra::{SMatrix, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config;
use crate::error::{SimError, SimResult};
use crate::geo::{utm, Aoi};
use crate::voi::VoiMesh;

/// Rational polynomial camera model mapping geodetic (lon, lat, alt) to
/// pixel (column, row).
///
/// Coefficients follow the RPC00B 20-term cubic ordering over normalized
/// coordinates; line and sample each divide by their own stored denominator
/// (identical when fitted here).
#[derive(Debug, Clone, PartialEq)]
pub struct RpcModel {
    pub line_off: f64,
    pub samp_off: f64,
    pub lat_off: f64,
    pub lon_off: f64,
    pub alt_off: f64,
    pub line_scale: f64,
    pub samp_scale: f64,
    pub lat_scale: f64,
    pub lon_scale: f64,
    pub alt_scale: f64,
    pub line_num: [f64; 20],
    pub line_den: [f64; 20],
    pub samp_num: [f64; 20],
    pub samp_den: [f64; 20],
}

/// Cubic basis in the RPC00B coefficient order, on normalized
/// (x, y, z) = (lat, lon, alt).
pub(crate) fn poly_terms(x: f64, y: f64, z: f64) -> [f64; 20] {
    [
        1.0,
        y,
        x,
        z,
        y * x,
        y * z,
        x * z,
        y * y,
        x * x,
        z * z,
        x * y * z,
        y * y * y,
        y * x * x,
        y * z * z,
        y * y * x,
        x * x * x,
        x * z * z,
        y * y * z,
        x * x * z,
        z * z * z,
    ]
}

fn dot20(coeffs: &[f64; 20], terms: &[f64; 20]) -> f64 {
    coeffs.iter().zip(terms).map(|(c, t)| c * t).sum()
}

impl RpcModel {
    /// Pixel (column, row) of a geodetic point.
    pub fn project(&self, lon: f64, lat: f64, alt: f64) -> (f64, f64) {
        let x = (lat - self.lat_off) / self.lat_scale;
        let y = (lon - self.lon_off) / self.lon_scale;
        let z = (alt - self.alt_off) / self.alt_scale;
        let t = poly_terms(x, y, z);
        let row = dot20(&self.line_num, &t) / dot20(&self.line_den, &t) * self.line_scale
            + self.line_off;
        let col = dot20(&self.samp_num, &t) / dot20(&self.samp_den, &t) * self.samp_scale
            + self.samp_off;
        (col, row)
    }

    /// Serializes in the Ikonos-style RPC text format consumed by
    /// photogrammetry tools. Field names and order are fixed by that
    /// convention.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> SimResult<()> {
        let mut out = String::new();
        let mut field = |name: &str, value: f64, unit: &str| {
            let _ = writeln!(out, "{name}: {value:.16e}{unit}");
        };
        field("LINE_OFF", self.line_off, " pixels");
        field("SAMP_OFF", self.samp_off, " pixels");
        field("LAT_OFF", self.lat_off, " degrees");
        field("LONG_OFF", self.lon_off, " degrees");
        field("HEIGHT_OFF", self.alt_off, " meters");
        field("LINE_SCALE", self.line_scale, " pixels");
        field("SAMP_SCALE", self.samp_scale, " pixels");
        field("LAT_SCALE", self.lat_scale, " degrees");
        field("LONG_SCALE", self.lon_scale, " degrees");
        field("HEIGHT_SCALE", self.alt_scale, " meters");
        for (prefix, coeffs) in [
            ("LINE_NUM_COEFF", &self.line_num),
            ("LINE_DEN_COEFF", &self.line_den),
            ("SAMP_NUM_COEFF", &self.samp_num),
            ("SAMP_DEN_COEFF", &self.samp_den),
        ] {
            for (index, value) in coeffs.iter().enumerate() {
                field(&format!("{prefix}_{}", index + 1), *value, "");
            }
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Parses the text format written by [`RpcModel::write_to_file`].
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let text = std::fs::read_to_string(&path)?;
        let get = |key: &str| -> SimResult<f64> {
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix(key) {
                    if let Some(value) = rest.strip_prefix(':') {
                        let value = value.trim().split_whitespace().next().unwrap_or("");
                        return value.parse::<f64>().map_err(|_| {
                            SimError::InvalidInput(format!("bad value for {key}: {value}"))
                        });
                    }
                }
            }
            Err(SimError::InvalidInput(format!("missing rpc field {key}")))
        };

        let coeffs = |prefix: &str| -> SimResult<[f64; 20]> {
            let mut out = [0.0; 20];
            for (index, slot) in out.iter_mut().enumerate() {
                *slot = get(&format!("{prefix}_{}", index + 1))?;
            }
            Ok(out)
        };

        let line_num = coeffs("LINE_NUM_COEFF")?;
        let line_den = coeffs("LINE_DEN_COEFF")?;
        let samp_num = coeffs("SAMP_NUM_COEFF")?;
        let samp_den = coeffs("SAMP_DEN_COEFF")?;
        Ok(Self {
            line_off: get("LINE_OFF")?,
            samp_off: get("SAMP_OFF")?,
            lat_off: get("LAT_OFF")?,
            lon_off: get("LONG_OFF")?,
            alt_off: get("HEIGHT_OFF")?,
            line_scale: get("LINE_SCALE")?,
            samp_scale: get("SAMP_SCALE")?,
            lat_scale: get("LAT_SCALE")?,
            lon_scale: get("LONG_SCALE")?,
            alt_scale: get("HEIGHT_SCALE")?,
            line_num,
            line_den,
            samp_num,
            samp_den,
        })
    }
}

/// Parameters of the affine-to-RPC conversion.
#[derive(Debug, Clone)]
pub struct RpcFitConfig {
    pub horizontal_resolution: f64,
    pub vertical_resolution: f64,
    pub samples_train: usize,
    pub samples_test: usize,
    pub options: FitOptions,
    /// Seed for the train/test draws; OS entropy when absent.
    pub seed: Option<u64>,
    /// Evaluate and log residuals on both sample sets.
    pub verbose: bool,
}

impl Default for RpcFitConfig {
    fn default() -> Self {
        Self {
            horizontal_resolution: config::DEFAULT_HORIZONTAL_RESOLUTION,
            vertical_resolution: config::DEFAULT_VERTICAL_RESOLUTION,
            samples_train: config::DEFAULT_TRAIN_SAMPLES,
            samples_test: config::DEFAULT_TEST_SAMPLES,
            options: FitOptions::default(),
            seed: None,
            verbose: false,
        }
    }
}

/// Fits an RPC that reproduces an affine camera over the volume of interest
/// and writes it to `output_filename`.
///
/// The affine camera projects local (east, north, up) meters relative to
/// `lon_lat_alt_origin`; the fitted RPC takes global geodetic coordinates.
/// When no origin is given the AOI center at altitude zero is used. Train
/// and test indices are drawn independently without replacement and may
/// overlap each other.
pub fn compute_rpc_from_affine_camera<P: AsRef<Path>>(
    p_affine: &SMatrix<f64, 2, 4>,
    aoi: &Aoi,
    altitude_range: [f64; 2],
    output_filename: P,
    lon_lat_alt_origin: Option<[f64; 3]>,
    cfg: &RpcFitConfig,
) -> SimResult<RpcModel> {
    let mesh = VoiMesh::build(
        aoi,
        altitude_range,
        cfg.horizontal_resolution,
        cfg.vertical_resolution,
    )?;
    let n_points = mesh.num_points();
    log::debug!("voi mesh {:?}, {n_points} points", mesh.shape());
    if cfg.samples_train > n_points || cfg.samples_test > n_points {
        return Err(SimError::DegenerateGeometry(format!(
            "mesh holds {n_points} points, cannot draw {} train and {} test samples without replacement",
            cfg.samples_train, cfg.samples_test
        )));
    }

    let origin = match lon_lat_alt_origin {
        Some(origin) => origin,
        None => {
            let (lon, lat) = aoi.lon_lat_center()?;
            [lon, lat, 0.0]
        }
    };
    // project the origin in the mesh zone so local offsets stay consistent
    let (origin_easting, origin_northing) =
        utm::from_latlon_with_zone(origin[1], origin[0], mesh.zone_number);
    let origin_altitude = origin[2];

    // flattened geodetic locations and local offsets, in lockstep order
    let mut locs = Vec::with_capacity(n_points);
    let mut locs_enu = Vec::with_capacity(n_points);
    for ((((&lon, &lat), &alt), &easting), &northing) in mesh
        .longitudes
        .iter()
        .zip(mesh.latitudes.iter())
        .zip(mesh.altitudes.iter())
        .zip(mesh.eastings.iter())
        .zip(mesh.northings.iter())
    {
        locs.push(Vector3::new(lon, lat, alt));
        locs_enu.push(Vector3::new(
            easting - origin_easting,
            northing - origin_northing,
            alt - origin_altitude,
        ));
    }

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let train_indices = rand::seq::index::sample(&mut rng, n_points, cfg.samples_train);
    let test_indices = rand::seq::index::sample(&mut rng, n_points, cfg.samples_test);

    let gather = |indices: &rand::seq::index::IndexVec| {
        let mut sample_locs = Vec::with_capacity(indices.len());
        let mut sample_targets = Vec::with_capacity(indices.len());
        for i in indices.iter() {
            sample_locs.push(locs[i]);
            let target: Vector2<f64> = p_affine * locs_enu[i].to_homogeneous();
            sample_targets.push(target);
        }
        (sample_locs, sample_targets)
    };
    let (locs_train, target_train) = gather(&train_indices);
    let (locs_test, target_test) = gather(&test_indices);

    let (rpc, fit_log) = calibrate_rpc(&target_train, &locs_train, &cfg.options)?;
    log::info!(
        "rpc calibration converged after {} iterations (update {:.3e}, lambda {:.1e})",
        fit_log.iterations,
        fit_log.final_update,
        fit_log.lambda
    );

    if cfg.verbose {
        let train = evaluate(&rpc, &locs_train, &target_train);
        log::info!(
            "training set: x-rmse {:e} y-rmse {:e} x-mae {:e} y-mae {:e} planimetric {:e}",
            train.rmse_x,
            train.rmse_y,
            train.mae_x,
            train.mae_y,
            train.planimetric_rmse
        );
        let test = evaluate(&rpc, &locs_test, &target_test);
        log::info!(
            "test set: x-rmse {:e} y-rmse {:e} x-mae {:e} y-mae {:e} planimetric {:e}",
            test.rmse_x,
            test.rmse_y,
            test.mae_x,
            test.mae_y,
            test.planimetric_rmse
        );
    }

    rpc.write_to_file(output_filename)?;
    Ok(rpc)
}
