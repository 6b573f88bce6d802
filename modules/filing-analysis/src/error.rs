use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("Sample is empty")]
    EmptySample,

    #[error("Vector {id} has {found} components, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot extract {requested} components from {dimensions}-dimensional data")]
    TooManyComponents { requested: usize, dimensions: usize },

    #[error("Cannot form {k} clusters from {points} points")]
    TooFewPoints { k: usize, points: usize },
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
