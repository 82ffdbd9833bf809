//! Asset resolution errors. Every variant ends in the poster fallback; the
//! distinction only matters for logs.

use thiserror::Error;

use crate::manifest::ModelFormat;

#[derive(Debug, Error)]
pub enum AssetError {
    /// Existence check failed; callers treat this as "absent".
    #[error("probe of {location} failed: {reason}")]
    ProbeFailure { location: String, reason: String },

    #[error("no model asset found (tried {})", .tried.join(", "))]
    NoAssetFound { tried: Vec<String> },

    #[error("failed to load {format} asset {location}")]
    Load {
        location: String,
        format: ModelFormat,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load poster {location}")]
    Poster {
        location: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type AssetResult<T> = Result<T, AssetError>;
