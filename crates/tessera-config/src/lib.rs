use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value in config file at {config_path}: {message}")]
    ConfigValueError {
        config_path: PathBuf,
        message: String,
    },
}

/// Which subset of node and mark types an editing surface accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceName {
    Chat,
    Note,
    #[default]
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Deepest container nesting the markdown tokenizer accepts.
    pub max_nesting: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_nesting: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Grammar names to load. Empty loads every built-in grammar.
    pub languages: Vec<String>,
    pub defer_initial: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            defer_initial: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Upper bound on the diff table used when mapping a remote snapshot.
    pub max_diff_cells: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_diff_cells: 4_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub surface: SurfaceName,
    pub soft_breaks_as_hard: bool,
    pub parser: ParserConfig,
    pub highlight: HighlightConfig,
    pub reconcile: ReconcileConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            surface: SurfaceName::default(),
            soft_breaks_as_hard: true,
            parser: ParserConfig::default(),
            highlight: HighlightConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config
            .validate()
            .map_err(|message| ConfigError::ConfigValueError {
                config_path: config_path.to_path_buf(),
                message,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/tessera");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn validate(&self) -> Result<(), String> {
        if self.parser.max_nesting == 0 {
            return Err("parser.max_nesting must be at least 1".to_string());
        }
        if self.reconcile.max_diff_cells == 0 {
            return Err("reconcile.max_diff_cells must be at least 1".to_string());
        }
        if let Some(blank) = self.highlight.languages.iter().find(|l| l.trim().is_empty()) {
            return Err(format!("highlight.languages contains a blank name {blank:?}"));
        }
        Ok(())
    }
}
