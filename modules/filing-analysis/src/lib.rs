pub mod error;
pub mod kmeans;
pub mod pca;
pub mod plot;

use ndarray::Array2;
use serde::Serialize;
use tracing::info;

use filing_graph::SampledEmbedding;

pub use error::{AnalysisError, AnalysisResult};
pub use kmeans::{Clustering, KMeans};
pub use pca::Pca;
pub use plot::render_scatter_svg;

/// One sampled document placed on the 2-D plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub id: String,
    pub company_name: String,
    pub x: f64,
    pub y: f64,
    pub cluster: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub points: Vec<ProjectedPoint>,
    pub cluster_sizes: Vec<usize>,
    /// Variance captured by each of the two plotted axes.
    pub explained_variance: Vec<f64>,
    pub inertia: f64,
    pub iterations: usize,
}

/// Stack the sample into a matrix, rejecting ragged vectors.
pub fn sample_matrix(sample: &[SampledEmbedding]) -> AnalysisResult<Array2<f64>> {
    let first = sample.first().ok_or(AnalysisError::EmptySample)?;
    let dims = first.embedding.len();

    let mut flat = Vec::with_capacity(sample.len() * dims);
    for s in sample {
        if s.embedding.len() != dims {
            return Err(AnalysisError::DimensionMismatch {
                id: s.id.clone(),
                expected: dims,
                found: s.embedding.len(),
            });
        }
        flat.extend_from_slice(&s.embedding);
    }

    Array2::from_shape_vec((sample.len(), dims), flat).map_err(|_| {
        AnalysisError::DimensionMismatch {
            id: first.id.clone(),
            expected: dims,
            found: 0,
        }
    })
}

/// Project the sample to two dimensions and cluster it. Clustering runs on
/// the full vectors; the projection is only for display. Nothing is
/// written back to the store.
pub fn analyze(sample: &[SampledEmbedding], kmeans: &KMeans) -> AnalysisResult<Analysis> {
    let matrix = sample_matrix(sample)?;

    let pca = Pca::fit(&matrix, 2)?;
    let projected = pca.transform(&matrix);
    let clustering = kmeans.fit(&matrix)?;

    let points = sample
        .iter()
        .zip(projected.outer_iter())
        .zip(&clustering.labels)
        .map(|((s, xy), &cluster)| ProjectedPoint {
            id: s.id.clone(),
            company_name: s.company_name.clone(),
            x: xy[0],
            y: xy[1],
            cluster,
        })
        .collect();

    let cluster_sizes = clustering.cluster_sizes();
    info!(
        points = sample.len(),
        clusters = kmeans.k,
        sizes = ?cluster_sizes,
        iterations = clustering.iterations,
        "Analysis complete"
    );

    Ok(Analysis {
        points,
        cluster_sizes,
        explained_variance: pca.explained_variance().to_vec(),
        inertia: clustering.inertia,
        iterations: clustering.iterations,
    })
}
