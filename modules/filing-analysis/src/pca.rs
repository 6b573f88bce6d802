use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{AnalysisError, AnalysisResult};

const MAX_ITER: usize = 500;
const CONVERGENCE: f64 = 1e-12;
const START_SEED: u64 = 0x5eed;

/// Principal component analysis fit by power iteration.
///
/// Each axis is found by iterating `v ← Xᵀ(Xv)` on the centered sample,
/// orthogonalized against the axes already found (deflation). The
/// covariance matrix is never materialized, so cost stays linear in the
/// vector width. Axes are sign-normalized so the largest-magnitude
/// component is positive, which makes repeated fits identical.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// One axis per row.
    components: Array2<f64>,
    explained_variance: Vec<f64>,
}

impl Pca {
    pub fn fit(data: &Array2<f64>, n_components: usize) -> AnalysisResult<Self> {
        let (rows, dims) = data.dim();
        if rows == 0 {
            return Err(AnalysisError::EmptySample);
        }
        if n_components == 0 || n_components > dims {
            return Err(AnalysisError::TooManyComponents {
                requested: n_components,
                dimensions: dims,
            });
        }

        let mean = data.mean_axis(Axis(0)).ok_or(AnalysisError::EmptySample)?;
        let centered = data - &mean;
        let denom = (rows.saturating_sub(1)).max(1) as f64;

        let mut rng = StdRng::seed_from_u64(START_SEED);
        let mut components = Array2::<f64>::zeros((n_components, dims));
        let mut explained_variance = Vec::with_capacity(n_components);

        for c in 0..n_components {
            let mut v: Array1<f64> = (0..dims).map(|_| rng.random::<f64>() - 0.5).collect();
            deflate(&mut v, &components, c);
            if !normalize(&mut v) {
                explained_variance.push(0.0);
                continue;
            }

            for _ in 0..MAX_ITER {
                let mut next = centered.t().dot(&centered.dot(&v));
                deflate(&mut next, &components, c);
                if !normalize(&mut next) {
                    // No variance left outside the axes found so far.
                    break;
                }
                let drift = 1.0 - next.dot(&v).abs();
                v = next;
                if drift < CONVERGENCE {
                    break;
                }
            }

            let projected = centered.dot(&v);
            let variance = projected.dot(&projected) / denom;
            if variance <= f64::EPSILON {
                explained_variance.push(0.0);
                continue;
            }

            sign_normalize(&mut v);
            components.row_mut(c).assign(&v);
            explained_variance.push(variance);
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
        })
    }

    /// Project rows onto the fitted axes.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.components.t())
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Sample variance along each axis, largest first.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }
}

/// Remove the projection of `v` onto the first `found` rows of `axes`.
fn deflate(v: &mut Array1<f64>, axes: &Array2<f64>, found: usize) {
    for axis in axes.outer_iter().take(found) {
        let proj = axis.dot(&*v);
        v.scaled_add(-proj, &axis);
    }
}

/// Scale to unit length. False when the vector is (numerically) zero.
fn normalize(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(&*v).sqrt();
    if norm < 1e-12 {
        return false;
    }
    v.mapv_inplace(|x| x / norm);
    true
}

fn sign_normalize(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
