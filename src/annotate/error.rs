use thiserror::Error;

use super::markers::MarkerId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnnotateError {
    #[error("no target mesh is loaded")]
    NoTarget,
    #[error("markers cannot be placed on top of other markers")]
    MarkerStacking,
    #[error("unknown marker {0:?}")]
    UnknownMarker(MarkerId),
    #[error("malformed zone data: {0}")]
    MalformedPersistedData(String),
    #[error("target transform is not invertible")]
    SingularTransform,
    #[error("normal has zero length")]
    DegenerateNormal,
    #[error("zone data could not be serialized: {0}")]
    Serialization(String),
}

pub type AnnotateResult<T> = Result<T, AnnotateError>;
