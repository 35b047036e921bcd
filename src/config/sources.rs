use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "BOARDPACK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/boardpack.toml";
const ENV_PREFIX: &str = "BOARDPACK";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // BOARDPACK__WORKER__DISK_LIMIT_PERCENT -> worker.disk_limit_percent
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.worker.disk_limit_percent, 80);
        assert_eq!(config.callback.timeout_secs, 5);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[worker]
download_dir = "/srv/boards"
disk_limit_percent = 90
excluded_extensions = ["lock"]

[http]
request_timeout_secs = 15

[store]
path = "/srv/jobs"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.worker.download_dir, PathBuf::from("/srv/boards"));
        assert_eq!(config.worker.disk_limit_percent, 90);
        assert_eq!(config.worker.excluded_extensions, vec!["lock"]);
        assert_eq!(config.worker.notes_file, "README.txt");
        assert_eq!(config.http.request_timeout_secs, 15);
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(config.store.path, PathBuf::from("/srv/jobs"));
    }
}
