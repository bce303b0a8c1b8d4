//! Subflow repository trait definition.
//!
//! The subflow runner loads nested graphs through this trait. The
//! infrastructure layer implements it over a directory of definition files.

use std::sync::Arc;

use flowgraph_types::error::RepositoryError;
use flowgraph_types::subflow::SubflowDefinition;

/// Read access to subflow definitions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait SubflowRepository: Send + Sync {
    /// Load a definition by ID. Missing definitions are `RepositoryError::NotFound`.
    fn load_subflow_definition(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<SubflowDefinition, RepositoryError>> + Send;
}

impl<R: SubflowRepository> SubflowRepository for Arc<R> {
    fn load_subflow_definition(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<SubflowDefinition, RepositoryError>> + Send {
        (**self).load_subflow_definition(id)
    }
}
