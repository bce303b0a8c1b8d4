//! Directory-backed subflow repository.
//!
//! A definition with ID `id` lives at `<dir>/<id>.json`, `<dir>/<id>.yaml`
//! or `<dir>/<id>.yml`, checked in that order.

use std::path::{Path, PathBuf};

use flowgraph_core::repository::subflow::SubflowRepository;
use flowgraph_types::error::RepositoryError;
use flowgraph_types::subflow::SubflowDefinition;

use super::DocumentFormat;

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Loads subflow definitions from a directory of JSON/YAML files.
#[derive(Debug, Clone)]
pub struct FileSubflowRepository {
    dir: PathBuf,
}

impl FileSubflowRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// IDs are plain file stems; anything that could escape the directory is rejected.
    fn is_valid_id(id: &str) -> bool {
        !id.is_empty() && !id.contains(['/', '\\']) && id != "." && id != ".."
    }
}

impl SubflowRepository for FileSubflowRepository {
    async fn load_subflow_definition(&self, id: &str) -> Result<SubflowDefinition, RepositoryError> {
        if !Self::is_valid_id(id) {
            return Err(RepositoryError::NotFound(format!("subflow '{id}'")));
        }

        for ext in EXTENSIONS {
            let path = self.dir.join(format!("{id}.{ext}"));
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(RepositoryError::Io(format!("{}: {err}", path.display())));
                }
            };

            let Some(format) = DocumentFormat::from_path(&path) else {
                continue;
            };
            let mut definition: SubflowDefinition = format
                .parse(&content)
                .map_err(|e| RepositoryError::Parse(format!("{}: {e:#}", path.display())))?;
            if definition.id.is_empty() {
                definition.id = id.to_string();
            }
            tracing::debug!(subflow_id = %id, path = %path.display(), "subflow definition loaded");
            return Ok(definition);
        }

        Err(RepositoryError::NotFound(format!("subflow '{id}'")))
    }
}
