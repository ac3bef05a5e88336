//! Configuration
//!
//! Layered configuration for the daemon and core: environment variables
//! override an optional TOML file, which overrides defaults. The history
//! token budget has no default - the context window cannot operate
//! without one, so a missing budget is a startup error rather than a
//! protocol concern.
//!
//! # Example file
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [backend]
//! host = "localhost"
//! port = 11434
//!
//! [chat]
//! model = "llama3"
//! system_prompt = "You are Parley. Format responses as markdown."
//! history_token_budget = 20000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default system prompt prepended to every backend request
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Parley, a helpful assistant. Your response must be formatted as markdown.";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "llama3";

/// Default HTTP port for the daemon
pub const DEFAULT_PORT: u16 = 8080;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The history token budget was not provided anywhere
    #[error(
        "history token budget is not configured; set PARLEY_HISTORY_TOKEN_BUDGET \
         or [chat].history_token_budget"
    )]
    MissingTokenBudget,

    /// A provided value could not be interpreted
    #[error("invalid configuration value for {key}: {value}")]
    InvalidValue {
        /// Which setting was malformed
        key: &'static str,
        /// The offending raw value
        value: String,
    },
}

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// HTTP listen port
    pub port: Option<u16>,
}

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Ollama host address
    pub host: Option<String>,
    /// Ollama port number
    pub port: Option<u16>,
}

/// Chat section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model identifier sent to the backend
    pub model: Option<String>,
    /// System prompt prepended to every request
    pub system_prompt: Option<String>,
    /// Token budget for context window selection
    pub history_token_budget: Option<u64>,
}

/// Root TOML configuration document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigToml {
    /// Server settings
    pub server: ServerToml,
    /// Backend settings
    pub backend: BackendToml,
    /// Chat settings
    pub chat: ChatToml,
}

/// Resolved configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Model identifier sent to the backend
    pub model: String,
    /// System prompt prepended to every request
    pub system_prompt: String,
    /// Token budget for context window selection (required)
    pub history_token_budget: u64,
    /// Ollama host address
    pub ollama_host: String,
    /// Ollama port number
    pub ollama_port: u16,
}

impl Config {
    /// Load configuration with env-over-file-over-default precedence
    ///
    /// The file is taken from `explicit_path` if given, else from
    /// `PARLEY_CONFIG`, else from `<config_dir>/parley/config.toml` when
    /// that file exists. A missing default-location file is not an
    /// error; a missing explicitly-named file is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match resolve_config_path(explicit_path) {
            Some((path, required)) => match std::fs::read_to_string(&path) {
                Ok(text) => toml::from_str::<ConfigToml>(&text)?,
                Err(source) if required => return Err(ConfigError::ReadError { path, source }),
                Err(_) => ConfigToml::default(),
            },
            None => ConfigToml::default(),
        };

        Self::from_sources(&file)
    }

    /// Resolve the configuration from env vars layered over a parsed file
    pub fn from_sources(file: &ConfigToml) -> Result<Self, ConfigError> {
        let port = match env_var("PARLEY_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PARLEY_PORT",
                value: raw,
            })?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        let history_token_budget = match env_var("PARLEY_HISTORY_TOKEN_BUDGET") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PARLEY_HISTORY_TOKEN_BUDGET",
                value: raw,
            })?,
            None => file
                .chat
                .history_token_budget
                .ok_or(ConfigError::MissingTokenBudget)?,
        };

        let ollama_port = match env_var("OLLAMA_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "OLLAMA_PORT",
                value: raw,
            })?,
            None => file.backend.port.unwrap_or(11434),
        };

        Ok(Self {
            port,
            model: env_var("PARLEY_MODEL")
                .or_else(|| file.chat.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: env_var("PARLEY_SYSTEM_PROMPT")
                .or_else(|| file.chat.system_prompt.clone())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            history_token_budget,
            ollama_host: env_var("OLLAMA_HOST")
                .or_else(|| file.backend.host.clone())
                .unwrap_or_else(|| "localhost".to_string()),
            ollama_port,
        })
    }
}

/// Where to look for the config file, and whether absence is an error
fn resolve_config_path(explicit: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Some((path.to_path_buf(), true));
    }
    if let Some(raw) = env_var("PARLEY_CONFIG") {
        return Some((PathBuf::from(raw), true));
    }
    let default = dirs::config_dir()?.join("parley").join("config.toml");
    if default.exists() {
        Some((default, false))
    } else {
        None
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file_with_budget(budget: u64) -> ConfigToml {
        ConfigToml {
            chat: ChatToml {
                history_token_budget: Some(budget),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_budget_is_a_configuration_error() {
        let result = Config::from_sources(&ConfigToml::default());
        assert!(matches!(result, Err(ConfigError::MissingTokenBudget)));
    }

    #[test]
    fn test_file_values_fill_defaults() {
        let mut file = file_with_budget(20_000);
        file.server.port = Some(9000);
        file.chat.model = Some("mistral".to_string());

        let config = Config::from_sources(&file).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.history_token_budget, 20_000);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(config.ollama_host, "localhost");
        assert_eq!(config.ollama_port, 11434);
    }

    #[test]
    fn test_parse_toml_document() {
        let text = r#"
            [server]
            port = 9090

            [backend]
            host = "ollama.local"
            port = 11500

            [chat]
            model = "llama3"
            history_token_budget = 4096
        "#;
        let file: ConfigToml = toml::from_str(text).unwrap();
        let config = Config::from_sources(&file).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.ollama_host, "ollama.local");
        assert_eq!(config.ollama_port, 11500);
        assert_eq!(config.history_token_budget, 4096);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/parley.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[chat]\nmodel = \"phi3\"\nhistory_token_budget = 1234\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model, "phi3");
        assert_eq!(config.history_token_budget, 1234);
    }
}
