pub mod loader;
pub mod schema;

use std::path::PathBuf;

pub use loader::{load_config, load_config_from_str, load_config_from_yaml_str};
pub use schema::{Config, FetchConfig, LogFormat, LoggingConfig, RetryConfig, TopologyConfig};

/// Default config location: `~/.jobdeck/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".jobdeck").join("config.json"))
}
