//! Configuration parser for loading provider settings.
//!
//! Settings come from a YAML file, then `.env`, then environment variable
//! overrides, with later sources taking precedence.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result, SkyforgeError};

use super::spec::ProviderConfig;

/// Environment variable overriding the default project.
pub const ENV_PROJECT: &str = "SKYFORGE_GOOGLE_PROJECT";

/// Environment variable overriding the default region.
pub const ENV_REGION: &str = "SKYFORGE_GOOGLE_REGION";

/// Environment variable carrying a Google OAuth access token.
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Environment variable overriding the Kubernetes API server.
pub const ENV_KUBE_HOST: &str = "SKYFORGE_KUBE_HOST";

/// Environment variable carrying a Kubernetes bearer token.
pub const ENV_KUBE_TOKEN: &str = "SKYFORGE_KUBE_TOKEN";

/// Configuration parser for loading provider configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ProviderConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ProviderConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(ProviderConfig::default());
        }

        let config: ProviderConfig = serde_yaml::from_str(content).map_err(|e| {
            SkyforgeError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        Ok(config)
    }

    /// Resolves and loads the configuration.
    ///
    /// Uses `explicit` when given, otherwise the first file found by
    /// [`find_config_file`], otherwise defaults. Environment overrides are
    /// applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is found but cannot be parsed, or if an
    /// explicit path does not exist.
    pub fn load(&self, explicit: Option<&Path>) -> Result<ProviderConfig> {
        self.load_dotenv()?;

        let mut config = match explicit {
            Some(path) => self.load_file(path)?,
            None => {
                let start = self
                    .base_path
                    .clone()
                    .map_or_else(std::env::current_dir, Ok)?;
                match find_config_file(&start) {
                    Ok(path) => self.load_file(path)?,
                    Err(_) => {
                        debug!("No configuration file found, using defaults");
                        ProviderConfig::default()
                    }
                }
            }
        };

        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(config: &mut ProviderConfig) {
        if let Ok(project) = std::env::var(ENV_PROJECT) {
            debug!("Overriding google.project from environment");
            config.google.project = Some(project);
        }

        if let Ok(region) = std::env::var(ENV_REGION) {
            debug!("Overriding google.region from environment");
            config.google.region = Some(region);
        }

        if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
            debug!("Using Google access token from environment");
            config.google.access_token = Some(token);
        }

        if let Ok(host) = std::env::var(ENV_KUBE_HOST) {
            debug!("Overriding kubernetes.host from environment");
            config.kubernetes.host = Some(host);
        }

        if let Ok(token) = std::env::var(ENV_KUBE_TOKEN) {
            debug!("Using Kubernetes token from environment");
            config.kubernetes.token = Some(token);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["skyforge.yaml", "skyforge.yml"];

/// Finds the configuration file in the start directory, its parents, or
/// the user configuration directory.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(user_config) = user_config_file().filter(|p| p.exists()) {
        info!("Found configuration file: {}", user_config.display());
        return Ok(user_config);
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

/// Returns `<config dir>/skyforge/config.yaml` for the current user.
#[must_use]
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("skyforge").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
google:
  project: my-project
  region: us-central1
";
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("config should parse");

        assert_eq!(config.google.project.as_deref(), Some("my-project"));
        assert_eq!(config.google.region.as_deref(), Some("us-central1"));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.delete_retry.attempts, 20);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
google:
  project: my-project
  region: europe-west1
  compute_endpoint: http://127.0.0.1:8080
kubernetes:
  host: https://10.0.0.1:6443
  insecure: true
http:
  timeout_secs: 10
  max_retries: 1
waiter:
  initial_interval_ms: 500
  max_interval_ms: 5000
  timeout_secs: 60
delete_retry:
  attempts: 5
  spacing_ms: 100
";
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("config should parse");

        assert_eq!(config.google.compute_endpoint, "http://127.0.0.1:8080");
        assert_eq!(config.kubernetes.host.as_deref(), Some("https://10.0.0.1:6443"));
        assert!(config.kubernetes.insecure);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.waiter.initial_interval_ms, 500);
        assert!((config.waiter.multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.delete_retry.attempts, 5);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = ConfigParser::new()
            .parse_yaml("", None)
            .expect("empty config should parse");
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ConfigParser::new().parse_yaml("google: [unclosed", None);
        assert!(matches!(
            result,
            Err(SkyforgeError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_find_config_file_walks_parents() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create nested dirs");
        let config_path = temp.path().join("skyforge.yaml");
        std::fs::write(&config_path, "google:\n  project: p\n").expect("write config");

        let found = find_config_file(&nested).expect("config should be found");
        assert_eq!(found, config_path);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = ConfigParser::new()
            .with_base_path(temp.path())
            .load(Some(&temp.path().join("missing.yaml")));
        assert!(matches!(
            result,
            Err(SkyforgeError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
