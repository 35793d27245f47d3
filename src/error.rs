use thiserror::Error;

use crate::domain::utils::id::{DemandId, LinkId, ResourceId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid layer: {0}")]
    InvalidLayer(String),

    #[error("Capacity exceeded in resource {resource}: requested {requested}, available {available}")]
    CapacityExceeded { resource: ResourceId, requested: f64, available: f64 },

    #[error("Cyclic resource dependency through resource {0}")]
    CyclicResourceDependency(ResourceId),

    #[error("Invalid splitting ratio {ratio} for demand {demand} on link {link}: {reason}")]
    InvalidSplittingRatio { demand: DemandId, link: LinkId, ratio: f64, reason: String },

    #[error("Corrupt state: {reason} (element: {element:?})")]
    CorruptState { reason: String, element: Option<u64> },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize network plan: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    pub fn corrupt(reason: impl Into<String>, element: Option<u64>) -> Self {
        Error::CorruptState { reason: reason.into(), element }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
