use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONFIG_PATH: &str = "config/deskpilot.toml";

/// Settings as read from the optional TOML file, before CLI overrides.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub server: Option<String>,
    pub api_base: String,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

/// The fully resolved configuration threaded through the agent's
/// constructors. Environment is read exactly once, here.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub server_path: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    model: Option<String>,
    server: Option<String>,
    api_base: Option<String>,
    api_key_env: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `path` is
    /// `None`. A missing default file falls back to defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            server: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Resolve the final agent configuration. CLI overrides win over file
    /// values; the API key is read from the configured environment
    /// variable at this point and never again afterwards.
    pub fn into_agent_config(
        self,
        server_path: String,
        model_override: Option<String>,
        api_base_override: Option<String>,
    ) -> AgentConfig {
        let api_key = env::var(&self.api_key_env).ok();
        AgentConfig {
            model: model_override.unwrap_or(self.model),
            server_path,
            api_base: api_base_override.unwrap_or(self.api_base),
            api_key,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        model: parsed.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        server: parsed.server,
        api_base: parsed
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        api_key_env: parsed
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        request_timeout_secs: parsed.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_model_and_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deskpilot.toml");
        fs::write(
            &path,
            r#"
model = "gpt-4o"
server = "server.py"
"#,
        )
        .expect("write");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.server.as_deref(), Some("server.py"));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn falls_back_to_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deskpilot.toml");
        fs::write(&path, "api_base = \"http://localhost:11434/v1\"").expect("write");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, "http://localhost:11434/v1");
        assert!(config.server.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.toml");
        let err = AppConfig::load(Some(&path)).expect_err("must fail");
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn cli_overrides_win_when_resolving() {
        let config = AppConfig::default().into_agent_config(
            "server.py".into(),
            Some("gpt-4.1".into()),
            None,
        );
        assert_eq!(config.model, "gpt-4.1");
        assert_eq!(config.server_path, "server.py");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
