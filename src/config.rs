//! Configuration management for keyshell.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::engine::EngineSettings;
use crate::shellspec::{ProjectConfig, ShellEntry};

/// Where session directories live when nothing else is configured.
pub fn default_session_root() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
        .join("keyshell")
        .join("sessions")
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session storage.
    pub sessions: SessionsSection,
    /// Shell binary selection.
    pub shell: ShellSection,
    /// Bound keys.
    pub keys: KeysSection,
    /// Which backend runs sessions.
    pub backend: BackendKind,
    /// Per-project, per-key shell entries.
    pub projects: HashMap<String, HashMap<String, ShellEntry>>,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Session storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Root of the per-project session directories.
    pub root: PathBuf,
    /// History file name inside each session directory.
    pub history_file: String,
    /// Variable through which shells find their history file.
    pub history_env: String,
    /// Shell name used in session names when an entry has none.
    pub default_shell_name: String,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            root: default_session_root(),
            history_file: "history".to_string(),
            history_env: "HISTFILE".to_string(),
            default_shell_name: "shell".to_string(),
        }
    }
}

/// Shell binary section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Explicit shell binary.
    pub binary: Option<String>,
    /// Variable consulted when no binary is set.
    pub binary_env: String,
    /// Extra arguments passed when terminals re-exec into the shell.
    pub args: Vec<String>,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            binary: None,
            binary_env: "KEYSHELL_SHELL".to_string(),
            args: Vec::new(),
        }
    }
}

/// Key binding section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysSection {
    /// Keys bound in both project and global scope.
    pub keys: Vec<String>,
    /// Keys whose sessions default to raw terminals.
    pub term_keys: Vec<String>,
}

impl Default for KeysSection {
    fn default() -> Self {
        Self {
            keys: ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            term_keys: vec!["9".to_string(), "0".to_string()],
        }
    }
}

/// Available session backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Sessions are tmux sessions.
    #[default]
    Tmux,
    /// Sessions are pseudo-terminals owned by this process.
    Pty,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tmux" => Ok(Self::Tmux),
            "pty" => Ok(Self::Pty),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tmux => write!(f, "tmux"),
            Self::Pty => write!(f, "pty"),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keyshell").join("config.json"))
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    ///
    /// An unknown `KEYSHELL_BACKEND` is an error rather than a silent
    /// fallback.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(root) = std::env::var("KEYSHELL_SESSION_ROOT") {
            if !root.is_empty() {
                self.sessions.root = PathBuf::from(root);
            }
        }

        if let Ok(backend) = std::env::var("KEYSHELL_BACKEND") {
            self.backend = backend.parse()?;
        }

        if let Ok(level) = std::env::var("KEYSHELL_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(backend) = args.backend {
            self.backend = backend;
        }

        if let Some(ref root) = args.session_root {
            self.sessions.root = root.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match (&args.config, Self::default_path()) {
            (Some(path), _) => Config::from_file(path)?,
            (None, Some(path)) if path.is_file() => Config::from_file(&path)?,
            _ => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Per-project shell specs from the `projects` section.
    pub fn project_config(&self) -> ProjectConfig {
        ProjectConfig::from_entries(&self.projects)
    }

    /// Settings handed to the activation engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            session_root: shellexpand::tilde(&self.sessions.root.to_string_lossy())
                .into_owned()
                .into(),
            history_file: self.sessions.history_file.clone(),
            history_env: self.sessions.history_env.clone(),
            default_shell_name: self.sessions.default_shell_name.clone(),
            shell_binary: self.shell.binary.clone(),
            shell_binary_env: self.shell.binary_env.clone(),
            shell_args: self.shell.args.clone(),
            term_keys: self.keys.term_keys.clone(),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Unknown backend name.
    InvalidBackend(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidBackend(name) => {
                write!(f, "invalid backend: {} (expected tmux or pty)", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Tmux);
        assert_eq!(config.sessions.history_file, "history");
        assert_eq!(config.sessions.history_env, "HISTFILE");
        assert_eq!(config.keys.keys.len(), 10);
        assert_eq!(config.keys.term_keys, vec!["9", "0"]);
        assert!(config.sessions.root.ends_with("keyshell/sessions"));
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "sessions": { "root": "/var/tmp/ks", "history_env": "HISTFILE_ZSH" },
            "backend": "pty",
            "keys": { "keys": ["a", "b"], "term_keys": ["b"] },
            "projects": {
                "kernel": { "1": { "name": "build", "init": ["make defconfig"] } }
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sessions.root, PathBuf::from("/var/tmp/ks"));
        assert_eq!(config.sessions.history_env, "HISTFILE_ZSH");
        assert_eq!(config.sessions.history_file, "history"); // Default
        assert_eq!(config.backend, BackendKind::Pty);
        assert_eq!(config.keys.keys, vec!["a", "b"]);

        let projects = config.project_config();
        assert_eq!(projects.len(), 1);
        assert_eq!(
            projects.get("kernel", "1").and_then(|s| s.name.as_deref()),
            Some("build")
        );
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ \"backend\": ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/keyshell.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("tmux".parse::<BackendKind>().unwrap(), BackendKind::Tmux);
        assert_eq!("PTY".parse::<BackendKind>().unwrap(), BackendKind::Pty);
        let err = "screen".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.to_string(), "invalid backend: screen (expected tmux or pty)");
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            backend: Some(BackendKind::Pty),
            session_root: Some(PathBuf::from("/tmp/sessions")),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.backend, BackendKind::Pty);
        assert_eq!(config.sessions.root, PathBuf::from("/tmp/sessions"));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_apply_args_keeps_unset_values() {
        let mut config = Config::default();
        config.backend = BackendKind::Pty;

        config.apply_args(&Args::default());
        assert_eq!(config.backend, BackendKind::Pty);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_engine_settings() {
        let mut config = Config::default();
        config.sessions.root = PathBuf::from("/srv/ks");
        config.shell.binary = Some("/bin/zsh".to_string());
        config.keys.term_keys = vec!["0".to_string()];

        let settings = config.engine_settings();
        assert_eq!(settings.session_root, PathBuf::from("/srv/ks"));
        assert_eq!(settings.shell_binary.as_deref(), Some("/bin/zsh"));
        assert_eq!(settings.shell_binary_env, "KEYSHELL_SHELL");
        assert_eq!(settings.term_keys, vec!["0"]);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"sessions\""));
        assert!(json.contains("\"backend\": \"tmux\""));
    }

    #[test]
    fn test_invalid_backend_env_is_rejected() {
        std::env::set_var("KEYSHELL_BACKEND", "screen");
        let mut config = Config::default();
        let result = config.apply_env();
        std::env::set_var("KEYSHELL_BACKEND", "PTY");
        let mut accepted = Config::default();
        let ok = accepted.apply_env();
        std::env::remove_var("KEYSHELL_BACKEND");

        assert!(matches!(result, Err(ConfigError::InvalidBackend(ref name)) if name == "screen"));
        assert!(ok.is_ok());
        assert_eq!(accepted.backend, BackendKind::Pty);
    }
}
