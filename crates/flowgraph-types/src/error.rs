use thiserror::Error;

/// Errors from repository/collaborator operations (used by trait definitions in flowgraph-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}
