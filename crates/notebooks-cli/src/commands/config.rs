//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use notebooks_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "store_name": config.store_name,
                    "store_path": config.store_path(),
                    "thumbnail_max_dimension": config.thumbnail_max_dimension,
                    "preload_sample_data": config.preload_sample_data
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:                {}", config.data_dir.display());
            println!("  store_name:              {}", config.store_name);
            println!("  thumbnail_max_dimension: {}", config.thumbnail_max_dimension);
            println!("  preload_sample_data:     {}", config.preload_sample_data);
            println!();
            println!("Store file:  {}", config.store_path().display());
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "store_name" => {
            if value.is_empty() {
                bail!("store_name cannot be empty");
            }
            config.store_name = value.clone();
        }
        "thumbnail_max_dimension" => {
            config.thumbnail_max_dimension = value
                .parse()
                .ok()
                .filter(|max: &u32| *max > 0)
                .context("Invalid value for thumbnail_max_dimension. Use a positive number.")?;
        }
        "preload_sample_data" => {
            config.preload_sample_data = value
                .parse()
                .context("Invalid value for preload_sample_data. Use 'true' or 'false'.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, store_name, thumbnail_max_dimension, preload_sample_data",
                key
            );
        }
    }

    config.validate()?;

    let save_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file(temp_dir: &TempDir) -> std::path::PathBuf {
        let path = temp_dir.path().join("config.toml");
        Config::with_data_dir(temp_dir.path().join("data"))
            .save_to_path(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_set_thumbnail_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = config_file(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        set("thumbnail_max_dimension".into(), "64".into(), Some(&path), &output).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.thumbnail_max_dimension, 64);
    }

    #[test]
    fn test_set_rejects_zero_thumbnail_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = config_file(&temp_dir);
        let output = Output::new(OutputFormat::Quiet);

        assert!(set("thumbnail_max_dimension".into(), "0".into(), Some(&path), &output).is_err());
        assert!(set("store_name".into(), "".into(), Some(&path), &output).is_err());

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.thumbnail_max_dimension, 120);
    }
}
