//! Configuration for the telpane console server.
//!
//! Loaded from TOML. The first file found wins:
//!
//! 1. `--config <path>` on the command line
//! 2. the `TELPANE_CONFIG` environment variable
//! 3. `~/.telpane/config.toml`
//!
//! Every field is optional:
//!
//! ```toml
//! listen = "0.0.0.0:2323"
//! log_level = "info"
//!
//! [terminal]
//! ask_timeout_ms = 3000
//! negotiate_settle_ms = 250
//! flush_timeout_ms = 1000
//! default_rows = 24
//! default_cols = 80
//!
//! [editor]
//! reposition_threshold = 5
//! prompt = "> "
//!
//! [backscroll]
//! max_lines = 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::terminal_io::TerminalSettings;
use crate::ui::backscroller::MAX_LINES;
use crate::ui::line_editor::EditorSettings;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TELPANE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the server listens on
    pub listen: String,
    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,
    pub terminal: TerminalConfig,
    pub editor: EditorConfig,
    pub backscroll: BackscrollConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:2323".to_string(),
            log_level: "info".to_string(),
            terminal: TerminalConfig::default(),
            editor: EditorConfig::default(),
            backscroll: BackscrollConfig::default(),
        }
    }
}

/// Remote terminal timing and fallback size
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub ask_timeout_ms: u64,
    pub negotiate_settle_ms: u64,
    pub flush_timeout_ms: u64,
    pub default_rows: u16,
    pub default_cols: u16,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            ask_timeout_ms: 3000,
            negotiate_settle_ms: 250,
            flush_timeout_ms: 1000,
            default_rows: 24,
            default_cols: 80,
        }
    }
}

/// Input line settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub reposition_threshold: u16,
    pub prompt: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            reposition_threshold: 5,
            prompt: "> ".to_string(),
        }
    }
}

/// Scrollback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackscrollConfig {
    pub max_lines: usize,
}

impl Default for BackscrollConfig {
    fn default() -> Self {
        Self {
            max_lines: MAX_LINES,
        }
    }
}

impl Config {
    /// Load from the first config file found, or defaults when there is none.
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::locate(explicit) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Config file path by search order; only existing files are returned
    /// for the implicit locations
    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        home_dir()
            .map(|home| home.join(".telpane").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn terminal_settings(&self) -> TerminalSettings {
        let terminal = &self.terminal;
        TerminalSettings {
            ask_timeout: Duration::from_millis(terminal.ask_timeout_ms),
            negotiate_settle: Duration::from_millis(terminal.negotiate_settle_ms),
            flush_timeout: Duration::from_millis(terminal.flush_timeout_ms),
            default_rows: terminal.default_rows,
            default_cols: terminal.default_cols,
        }
    }

    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            reposition_threshold: self.editor.reposition_threshold,
            prompt: self.editor.prompt.clone(),
        }
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
