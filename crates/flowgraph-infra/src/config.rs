//! Engine configuration loader for flowgraph.
//!
//! Reads `config.toml` from the data directory (`~/.flowgraph/` in production)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use flowgraph_types::config::EngineConfig;

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

/// Directory holding subflow definitions.
///
/// A relative `subflow_dir` is resolved against the data directory.
pub fn resolve_subflow_dir(config: &EngineConfig, data_dir: &Path) -> PathBuf {
    let dir = Path::new(&config.subflow_dir);
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        data_dir.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_types::run::ErrorPolicy;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_engine_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.kind_limits.llm, 8);
        assert_eq!(config.llm_timeout_secs, 300);
        assert_eq!(config.error_policy, ErrorPolicy::FailFast);
    }

    #[tokio::test]
    async fn load_engine_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
max_concurrency = 3
error_policy = "continue_subgraph"
cli_output_limit = 512

[kind_limits]
cli = 1
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrency, Some(3));
        assert_eq!(config.error_policy, ErrorPolicy::ContinueSubgraph);
        assert_eq!(config.cli_output_limit, 512);
        assert_eq!(config.kind_limits.cli, 1);
        assert_eq!(config.kind_limits.llm, 8);
    }

    #[tokio::test]
    async fn load_engine_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_engine_config(tmp.path()).await;
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.cli_output_limit, 100_000);
    }

    #[test]
    fn subflow_dir_relative_and_absolute() {
        let data_dir = Path::new("/data");
        let mut config = EngineConfig::default();
        assert_eq!(resolve_subflow_dir(&config, data_dir), PathBuf::from("/data/subflows"));

        config.subflow_dir = "/srv/flows".into();
        assert_eq!(resolve_subflow_dir(&config, data_dir), PathBuf::from("/srv/flows"));
    }
}
