use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// Lloyd's k-means with a single seeded k-means++ initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// Stop once the summed squared centroid movement drops below this.
    pub tolerance: f64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: 5,
            seed: 42,
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clustering {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl Clustering {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

impl KMeans {
    pub fn fit(&self, data: &Array2<f64>) -> AnalysisResult<Clustering> {
        let points = data.nrows();
        if points == 0 {
            return Err(AnalysisError::EmptySample);
        }
        if self.k == 0 || self.k > points {
            return Err(AnalysisError::TooFewPoints { k: self.k, points });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = init_plus_plus(data, self.k, &mut rng);
        let mut labels = vec![0; points];
        let mut iterations = 0;

        while iterations < self.max_iter {
            iterations += 1;
            assign(data, &centroids, &mut labels);

            let updated = recompute(data, &labels, &centroids);
            let shift = (&updated - &centroids).mapv(|x| x * x).sum();
            centroids = updated;
            if shift <= self.tolerance {
                break;
            }
        }

        // Labels must match the final centroids.
        let inertia = assign(data, &centroids, &mut labels);
        debug!(k = self.k, iterations, inertia, "k-means converged");

        Ok(Clustering {
            centroids,
            labels,
            inertia,
            iterations,
        })
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// k-means++: first centroid uniform, each next one drawn with probability
/// proportional to its squared distance from the nearest chosen centroid.
fn init_plus_plus(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let points = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));
    let first = rng.random_range(0..points);
    centroids.row_mut(0).assign(&data.row(first));

    let mut nearest: Array1<f64> = data
        .outer_iter()
        .map(|p| squared_distance(p, data.row(first)))
        .collect();

    for c in 1..k {
        let total = nearest.sum();
        let pick = if total <= 0.0 {
            // Every point already coincides with a centroid.
            rng.random_range(0..points)
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = points - 1;
            for (i, d) in nearest.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };

        centroids.row_mut(c).assign(&data.row(pick));
        for (i, p) in data.outer_iter().enumerate() {
            let d = squared_distance(p, data.row(pick));
            if d < nearest[i] {
                nearest[i] = d;
            }
        }
    }
    centroids
}

/// Label each point with its nearest centroid (lowest index on ties) and
/// return the inertia.
fn assign(data: &Array2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (i, p) in data.outer_iter().enumerate() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.outer_iter().enumerate() {
            let d = squared_distance(p, centroid);
            if d < best_dist {
                best = c;
                best_dist = d;
            }
        }
        labels[i] = best;
        inertia += best_dist;
    }
    inertia
}

/// Mean of each cluster's members. A cluster that lost all its members keeps
/// its previous centroid.
fn recompute(data: &Array2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros(previous.dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (p, &label) in data.outer_iter().zip(labels) {
        let mut row = sums.row_mut(label);
        row += &p;
        counts[label] += 1;
    }

    for (c, count) in counts.into_iter().enumerate() {
        if count == 0 {
            sums.row_mut(c).assign(&previous.row(c));
        } else {
            sums.row_mut(c).mapv_inplace(|x| x / count as f64);
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.2],
            [-0.1, 0.1],
            [0.2, -0.1],
            [10.0, 10.0],
            [10.2, 9.9],
            [9.8, 10.1],
            [10.1, 10.2],
        ]
    }

    #[test]
    fn separates_obvious_groups() {
        let model = KMeans {
            k: 2,
            ..KMeans::default()
        };
        let clustering = model.fit(&two_blobs()).unwrap();

        let labels = &clustering.labels;
        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
        assert_eq!(clustering.cluster_sizes(), vec![4, 4]);
        assert!(clustering.inertia < 1.0);
    }

    #[test]
    fn same_seed_same_labels() {
        let data = two_blobs();
        let model = KMeans {
            k: 3,
            seed: 7,
            ..KMeans::default()
        };
        let a = model.fit(&data).unwrap();
        let b = model.fit(&data).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn identical_points_collapse_without_panicking() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let model = KMeans {
            k: 2,
            ..KMeans::default()
        };
        let clustering = model.fit(&data).unwrap();
        assert_eq!(clustering.labels, vec![0, 0, 0]);
        assert_eq!(clustering.inertia, 0.0);
    }

    #[test]
    fn more_clusters_than_points_is_rejected() {
        let data = array![[0.0, 1.0], [1.0, 0.0]];
        let model = KMeans {
            k: 3,
            ..KMeans::default()
        };
        assert_eq!(
            model.fit(&data).unwrap_err(),
            AnalysisError::TooFewPoints { k: 3, points: 2 }
        );
    }
}
