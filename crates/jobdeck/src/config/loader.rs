use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Loads a config file, picking the parser from the extension.
/// Files without an extension are read as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        None | Some("json") => load_config_from_str(&content),
        Some("yaml") | Some("yml") => load_config_from_yaml_str(&content),
        Some(_) => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_yaml_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    // Topology rules live with the topology itself
    config.topology()?;

    let fetch = &config.fetch;
    if fetch.page_size == 0 {
        return Err(ConfigError::Validation {
            message: "fetch.page_size must be greater than 0".to_string(),
        });
    }
    if fetch.max_pages == 0 {
        return Err(ConfigError::Validation {
            message: "fetch.max_pages must be greater than 0".to_string(),
        });
    }
    if fetch.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "fetch.concurrency must be greater than 0".to_string(),
        });
    }
    if fetch.retry.base_delay_ms > fetch.retry.max_delay_ms {
        return Err(ConfigError::Validation {
            message: format!(
                "fetch.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
                fetch.retry.base_delay_ms, fetch.retry.max_delay_ms
            ),
        });
    }
    if let Some(url) = &fetch.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation {
                message: format!("fetch.base_url must be an http(s) URL: {}", url),
            });
        }
    }

    Ok(())
}
