use thiserror::Error;

/// Errors raised while locating and straightening a document.
#[derive(Error, Debug)]
pub enum TrimError {
    #[error("No document found: no contour longer than {min_length:.1}px")]
    NoDocumentFound { min_length: f64 },

    #[error("Degenerate region: output would be {width}x{height}")]
    DegenerateRegion { width: u32, height: u32 },

    #[error("Transform could not be solved: reference points are collinear")]
    SingularTransform,

    #[error("Cannot split {points} points into {requested} sets")]
    InvalidPartition { requested: usize, points: usize },
}

pub type Result<T> = std::result::Result<T, TrimError>;
