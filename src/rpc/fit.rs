//! Rational polynomial calibration on affine-projected correspondences.
//!
//! The model is linear in its coefficients once the rational equation is
//! multiplied through by the denominator, so each refinement step is a
//! weighted linear least-squares solve (weights 1/denominator from the
//! previous step). Regularization strength is picked per step at the corner
//! of the L-curve. The solves themselves are delegated to nalgebra.

use nalgebra::{DMatrix, DVector, Vector2, Vector3};

use super::{poly_terms, RpcModel};
use crate::config;
use crate::error::{SimError, SimResult};

/// Unknowns: 20 line numerator, 20 sample numerator, 19 shared denominator
/// coefficients (the constant denominator term is fixed to 1).
const N_UNKNOWNS: usize = 59;

#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Stop once the largest coefficient update falls below this.
    pub tolerance: f64,
    /// Refinement budget; exceeding it is a calibration failure.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            tolerance: config::FIT_TOLERANCE,
            max_iterations: config::FIT_MAX_ITERATIONS,
        }
    }
}

/// Diagnostics of a finished calibration.
#[derive(Debug, Clone, Copy)]
pub struct FitLog {
    pub iterations: usize,
    pub final_update: f64,
    pub lambda: f64,
}

/// Residual statistics of an RPC against known pixel targets.
#[derive(Debug, Clone, Copy)]
pub struct FitStats {
    pub rmse_x: f64,
    pub rmse_y: f64,
    pub mae_x: f64,
    pub mae_y: f64,
    pub planimetric_rmse: f64,
}

#[derive(Debug, Clone, Copy)]
struct Normalization {
    off: f64,
    scale: f64,
}

impl Normalization {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in values {
            min = min.min(v);
            max = max.max(v);
        }
        let off = (min + max) / 2.0;
        let scale = ((max - min) / 2.0).max(1e-12);
        Self { off, scale }
    }

    fn apply(&self, v: f64) -> f64 {
        (v - self.off) / self.scale
    }
}

/// Fits an RPC to pixel targets and geodetic (lon, lat, alt) locations.
///
/// `targets` carry (column, row) pixel coordinates. Line and sample share
/// one denominator.
pub fn calibrate_rpc(
    targets: &[Vector2<f64>],
    locs: &[Vector3<f64>],
    options: &FitOptions,
) -> SimResult<(RpcModel, FitLog)> {
    if targets.len() != locs.len() {
        return Err(SimError::InvalidInput(format!(
            "{} targets for {} locations",
            targets.len(),
            locs.len()
        )));
    }
    let n = targets.len();
    if 2 * n < N_UNKNOWNS {
        return Err(SimError::InvalidInput(format!(
            "{n} correspondences underdetermine the {N_UNKNOWNS} rpc coefficients"
        )));
    }

    let lon_n = Normalization::of(locs.iter().map(|l| l.x));
    let lat_n = Normalization::of(locs.iter().map(|l| l.y));
    let alt_n = Normalization::of(locs.iter().map(|l| l.z));
    let col_n = Normalization::of(targets.iter().map(|t| t.x));
    let row_n = Normalization::of(targets.iter().map(|t| t.y));

    // per-point basis terms and normalized targets
    let terms: Vec<[f64; 20]> = locs
        .iter()
        .map(|l| poly_terms(lat_n.apply(l.y), lon_n.apply(l.x), alt_n.apply(l.z)))
        .collect();
    let rows_norm: Vec<f64> = targets.iter().map(|t| row_n.apply(t.y)).collect();
    let cols_norm: Vec<f64> = targets.iter().map(|t| col_n.apply(t.x)).collect();

    // design matrix of the linearized rational system, two rows per point
    let mut a = DMatrix::<f64>::zeros(2 * n, N_UNKNOWNS);
    let mut b = DVector::<f64>::zeros(2 * n);
    for i in 0..n {
        let t = &terms[i];
        for j in 0..20 {
            a[(2 * i, j)] = t[j];
            a[(2 * i + 1, 20 + j)] = t[j];
        }
        for j in 1..20 {
            a[(2 * i, 39 + j)] = -rows_norm[i] * t[j];
            a[(2 * i + 1, 39 + j)] = -cols_norm[i] * t[j];
        }
        b[2 * i] = rows_norm[i];
        b[2 * i + 1] = cols_norm[i];
    }

    let mut theta = DVector::<f64>::zeros(N_UNKNOWNS);
    let mut converged = false;
    let mut fit_log = FitLog {
        iterations: 0,
        final_update: f64::INFINITY,
        lambda: 0.0,
    };

    for iteration in 0..options.max_iterations {
        // reweight by the current denominator
        let mut aw = a.clone();
        let mut bw = b.clone();
        for i in 0..n {
            let t = &terms[i];
            let mut den = 1.0;
            for j in 1..20 {
                den += theta[39 + j] * t[j];
            }
            let w = 1.0 / den.abs().max(1e-8);
            for row in [2 * i, 2 * i + 1] {
                for col in 0..N_UNKNOWNS {
                    aw[(row, col)] *= w;
                }
                bw[row] *= w;
            }
        }

        let gram = aw.tr_mul(&aw);
        let moment = aw.tr_mul(&bw);
        let target_norm2 = bw.dot(&bw);

        let (lambda, candidate) = l_curve_solution(&gram, &moment, target_norm2)?;

        let update = (&candidate - &theta).amax();
        theta = candidate;
        fit_log = FitLog {
            iterations: iteration + 1,
            final_update: update,
            lambda,
        };
        if update < options.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(SimError::FitNotConverged(format!(
            "coefficient update {:.3e} above tolerance {:.3e} after {} iterations",
            fit_log.final_update, options.tolerance, fit_log.iterations
        )));
    }

    let mut line_num = [0.0; 20];
    let mut samp_num = [0.0; 20];
    let mut den = [0.0; 20];
    den[0] = 1.0;
    for j in 0..20 {
        line_num[j] = theta[j];
        samp_num[j] = theta[20 + j];
    }
    for j in 1..20 {
        den[j] = theta[39 + j];
    }

    let model = RpcModel {
        line_off: row_n.off,
        samp_off: col_n.off,
        lat_off: lat_n.off,
        lon_off: lon_n.off,
        alt_off: alt_n.off,
        line_scale: row_n.scale,
        samp_scale: col_n.scale,
        lat_scale: lat_n.scale,
        lon_scale: lon_n.scale,
        alt_scale: alt_n.scale,
        line_num,
        line_den: den,
        samp_num,
        samp_den: den,
    };
    Ok((model, fit_log))
}

/// Ridge solution at the corner of the L-curve.
///
/// Solves the normal equations over a log-spaced grid of regularization
/// strengths and keeps the one maximizing the curvature of
/// (log residual norm, log solution norm). Falls back to the weakest
/// regularization when the corner solution gives away too much residual.
fn l_curve_solution(
    gram: &DMatrix<f64>,
    moment: &DVector<f64>,
    target_norm2: f64,
) -> SimResult<(f64, DVector<f64>)> {
    const LAMBDAS: [f64; 15] = [
        1e-12, 1e-11, 1e-10, 1e-9, 1e-8, 1e-7, 1e-6, 1e-5, 1e-4, 1e-3, 1e-2, 1e-1, 1e0, 1e1, 1e2,
    ];

    let mut solutions = Vec::with_capacity(LAMBDAS.len());
    for &lambda in &LAMBDAS {
        let mut regularized = gram.clone();
        for d in 0..regularized.nrows() {
            regularized[(d, d)] += lambda;
        }
        let Some(cholesky) = regularized.cholesky() else {
            continue;
        };
        let theta = cholesky.solve(moment);
        // ||b - A theta||^2 expanded through the normal equations
        let residual2 =
            (target_norm2 - 2.0 * theta.dot(moment) + theta.dot(&(gram * &theta))).max(1e-300);
        let norm2 = theta.dot(&theta).max(1e-300);
        solutions.push((lambda, theta, residual2, norm2));
    }

    if solutions.is_empty() {
        return Err(SimError::FitNotConverged(
            "normal equations are not positive definite for any regularization".to_string(),
        ));
    }

    let mut best = 0;
    if solutions.len() >= 3 {
        let xs: Vec<f64> = solutions.iter().map(|s| 0.5 * s.2.ln()).collect();
        let ys: Vec<f64> = solutions.iter().map(|s| 0.5 * s.3.ln()).collect();
        let mut best_curvature = f64::NEG_INFINITY;
        for i in 1..solutions.len() - 1 {
            let dx = (xs[i + 1] - xs[i - 1]) / 2.0;
            let dy = (ys[i + 1] - ys[i - 1]) / 2.0;
            let ddx = xs[i + 1] - 2.0 * xs[i] + xs[i - 1];
            let ddy = ys[i + 1] - 2.0 * ys[i] + ys[i - 1];
            let denom = (dx * dx + dy * dy).powf(1.5);
            if denom <= 0.0 {
                continue;
            }
            let curvature = (dx * ddy - dy * ddx).abs() / denom;
            if curvature > best_curvature {
                best_curvature = curvature;
                best = i;
            }
        }
    }

    // corner sanity: never trade more than an order of magnitude of residual
    let min_residual2 = solutions
        .iter()
        .map(|s| s.2)
        .fold(f64::INFINITY, f64::min);
    if solutions[best].2 > 100.0 * min_residual2 {
        best = solutions
            .iter()
            .enumerate()
            .min_by(|x, y| x.1 .2.total_cmp(&y.1 .2))
            .map(|(i, _)| i)
            .unwrap_or(0);
    }

    let (lambda, theta, _, _) = solutions.swap_remove(best);
    Ok((lambda, theta))
}

/// Residuals of an RPC against pixel targets at known locations.
pub fn evaluate(rpc: &RpcModel, locs: &[Vector3<f64>], targets: &[Vector2<f64>]) -> FitStats {
    let n = locs.len().max(1);
    let mut sum_dx2 = 0.0;
    let mut sum_dy2 = 0.0;
    let mut sum_adx = 0.0;
    let mut sum_ady = 0.0;
    for (loc, target) in locs.iter().zip(targets) {
        let (col, row) = rpc.project(loc.x, loc.y, loc.z);
        let dx = col - target.x;
        let dy = row - target.y;
        sum_dx2 += dx * dx;
        sum_dy2 += dy * dy;
        sum_adx += dx.abs();
        sum_ady += dy.abs();
    }
    FitStats {
        rmse_x: (sum_dx2 / n as f64).sqrt(),
        rmse_y: (sum_dy2 / n as f64).sqrt(),
        mae_x: sum_adx / n as f64,
        mae_y: sum_ady / n as f64,
        planimetric_rmse: ((sum_dx2 + sum_dy2) / n as f64).sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic correspondences from a plain affine ground-to-image map,
    /// the shape of data the calibration sees in production.
    fn affine_samples() -> (Vec<Vector2<f64>>, Vec<Vector3<f64>>) {
        let (lon0, lat0) = (-58.5883, -34.4899);
        let mut targets = Vec::new();
        let mut locs = Vec::new();
        for i in 0..12 {
            for j in 0..11 {
                for k in 0..5 {
                    let lon = lon0 + i as f64 * 1.5e-4;
                    let lat = lat0 + j as f64 * 1.2e-4;
                    let alt = -20.0 + k as f64 * 10.0;
                    let east = (lon - lon0) * 91_000.0;
                    let north = (lat - lat0) * 111_000.0;
                    let col = 300.0 + 3.0 * east - 0.8 * alt;
                    let row = 300.0 - 3.0 * north + 0.5 * alt;
                    locs.push(Vector3::new(lon, lat, alt));
                    targets.push(Vector2::new(col, row));
                }
            }
        }
        (targets, locs)
    }

    #[test]
    fn affine_targets_are_reproduced() {
        let (targets, locs) = affine_samples();
        let (rpc, fit_log) = calibrate_rpc(&targets, &locs, &FitOptions::default()).unwrap();
        assert!(fit_log.iterations <= config::FIT_MAX_ITERATIONS);
        let stats = evaluate(&rpc, &locs, &targets);
        assert!(
            stats.planimetric_rmse < 0.5,
            "planimetric rmse {}",
            stats.planimetric_rmse
        );
        assert!(stats.mae_x <= stats.rmse_x + 1e-9);
    }

    #[test]
    fn exhausted_budget_is_a_calibration_failure() {
        let (targets, locs) = affine_samples();
        let options = FitOptions {
            tolerance: 1e-10,
            max_iterations: 0,
        };
        assert!(matches!(
            calibrate_rpc(&targets, &locs, &options),
            Err(SimError::FitNotConverged(_))
        ));
    }

    #[test]
    fn too_few_points_are_rejected() {
        let (targets, locs) = affine_samples();
        assert!(calibrate_rpc(&targets[..10], &locs[..10], &FitOptions::default()).is_err());
        assert!(calibrate_rpc(&targets[..40], &locs[..41], &FitOptions::default()).is_err());
    }
}
