//! Startup configuration.
//!
//! ```toml
//! renderers = ["text-table", "delimited"]
//! macros-file = "macros.toml"
//! privileges = ["Run Reports"]
//!
//! [macro-syntax]
//! prefix = "$"
//! suffix = ""
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::PRIV_RUN_REPORTS;
use crate::macros::MacroSyntax;
use crate::render::{DelimitedRenderer, TextTableRenderer};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReportkitConfig {
    /// Renderer factory names registered at startup, in order.
    pub renderers: Vec<String>,

    /// Where the macro table lives. Relative paths resolve against the
    /// config file's directory.
    pub macros_file: Option<PathBuf>,

    /// Syntax for macro tables that do not declare their own.
    pub macro_syntax: MacroSyntax,

    /// Privileges granted to the local user.
    pub privileges: Vec<String>,
}

impl Default for ReportkitConfig {
    fn default() -> Self {
        Self {
            renderers: vec![
                TextTableRenderer::ID.to_string(),
                DelimitedRenderer::ID.to_string(),
            ],
            macros_file: None,
            macro_syntax: MacroSyntax::default(),
            privileges: vec![PRIV_RUN_REPORTS.to_string()],
        }
    }
}

impl ReportkitConfig {
    /// Load from `path`. The file must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        // Joining an absolute path yields it unchanged.
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        config.macros_file = config.macros_file.map(|file| dir.join(file));
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.macro_syntax.prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "macro-syntax.prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
