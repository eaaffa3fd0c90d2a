//! Error types for the content registry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Manifest rejected: {0}")]
    ManifestRejected(String),
}
