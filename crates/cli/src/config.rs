//! Configuration file support for curation runs

use anyhow::{Context, Result};
use datacurate_core::{
    BalanceConfig, DedupConfig, FilterConfig, PipelineConfig, SplitConfig, ValidationConfig,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a YAML or TOML config file into any stage config type
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    match extension {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
        _ => Err(anyhow::anyhow!(
            "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
            extension
        )),
    }
}

/// Save a config to a YAML or TOML file
pub fn save<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

    let content = match extension {
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "toml" => toml::to_string_pretty(config)?,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported config file format: {}. Use .yaml, .yml, or .toml",
                extension
            ))
        }
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Load a pipeline config, or defaults when no path is given
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => load(path),
        None => Ok(PipelineConfig::default()),
    }
}

/// Load a single stage config, or its defaults when no path is given
pub fn load_stage_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => load(path),
        None => Ok(T::default()),
    }
}

/// Fully-populated sample pipeline config for `init-config`
pub fn sample_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        dataset_name: Some("my_dataset".to_string()),
        dedup: DedupConfig::default(),
        filter: FilterConfig::default(),
        balance: Some(BalanceConfig::with_targets(&[
            ("category_a", 0.5),
            ("category_b", 0.3),
            ("category_c", 0.2),
        ])),
        validation: ValidationConfig::default(),
        split: Some(SplitConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_sample_config_builds_pipeline() {
        let config = sample_pipeline_config();
        assert!(datacurate_core::CurationPipeline::new(config).is_ok());
    }

    #[test]
    fn test_save_and_load_yaml() {
        let config = sample_pipeline_config();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("yaml");

        save(&config, &path).unwrap();
        let loaded: PipelineConfig = load(&path).unwrap();

        assert_eq!(config.dataset_name, loaded.dataset_name);
        assert!(loaded.balance.is_some());
        assert!(loaded.split.is_some());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_save_and_load_toml() {
        let config = sample_pipeline_config();

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("toml");

        save(&config, &path).unwrap();
        let loaded: PipelineConfig = load(&path).unwrap();

        assert_eq!(
            config.balance.as_ref().unwrap().target_ratios,
            loaded.balance.as_ref().unwrap().target_ratios
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_stage_config_uses_defaults() {
        let config: DedupConfig = load_stage_config(None).unwrap();
        assert!(!config.enable_near_duplicates);
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("ini");
        assert!(save(&sample_pipeline_config(), &path).is_err());
    }
}
