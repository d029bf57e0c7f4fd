//! Group build errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The topology lacks data the build needs.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid app id: {app_id}")]
    Validation { app_id: String },

    #[error("node {node} references requirement {requirement} with no matching relationship")]
    UnresolvedReference { node: String, requirement: String },
}

pub type BuildResult<T> = Result<T, BuildError>;
