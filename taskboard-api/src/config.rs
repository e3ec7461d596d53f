use config::{Config, ConfigError, Environment, File};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 168,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; the platform data directory is used when unset
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: String,
    pub public_path: String,
    pub max_file_size_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            public_path: "/uploads".to_string(),
            max_file_size_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Load `api.toml`, writing a default one with a fresh JWT secret on first run.
    ///
    /// `TASKBOARD__<SECTION>__<KEY>` environment variables override the file.
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_path = explicit_path
            .map(Path::to_path_buf)
            .unwrap_or_else(get_config_path);

        if !config_path.exists() {
            write_default_config(&config_path)?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .add_source(
                Environment::with_prefix("TASKBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ApiConfig = builder.try_deserialize()?;
        config.validate()?;

        Ok((config, config_path))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.jwt_secret must be set".to_string(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Message(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn write_default_config(config_path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Message(format!("Failed to create config directory: {e}"))
        })?;
    }

    let mut defaults = ApiConfig::default();
    defaults.auth.jwt_secret = generate_secret();

    let contents = toml::to_string_pretty(&defaults)
        .map_err(|e| ConfigError::Message(format!("Failed to render default config: {e}")))?;

    std::fs::write(config_path, contents)
        .map_err(|e| ConfigError::Message(format!("Failed to write default config: {e}")))?;

    tracing::info!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("taskboard").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_writes_defaults_with_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("api.toml");

        let (config, loaded_from) = ApiConfig::load(Some(&path)).unwrap();

        assert_eq!(loaded_from, path);
        assert!(path.exists());
        assert_eq!(config.auth.jwt_secret.len(), 48);
        assert_eq!(config.auth.token_ttl_hours, 168);
        assert_eq!(config.uploads.max_file_size_bytes, 10 * 1024 * 1024);

        let (reloaded, _) = ApiConfig::load(Some(&path)).unwrap();
        assert_eq!(reloaded.auth.jwt_secret, config.auth.jwt_secret);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.toml");
        std::fs::write(
            &path,
            "[auth]\njwt_secret = \"s3cret\"\n\n[server]\nport = 9090\n",
        )
        .unwrap();

        let (config, _) = ApiConfig::load(Some(&path)).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.uploads.public_path, "/uploads");
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.toml");
        std::fs::write(&path, "[auth]\njwt_secret = \"\"\n").unwrap();

        assert!(ApiConfig::load(Some(&path)).is_err());
    }
}
