//! Link configuration.
//!
//! A [`LinkConfig`] describes how to open one named database link. A
//! [`RegistryConfig`] groups several of them and can be read from YAML or
//! JSON; the first entry becomes the registry's default link.
//!
//! # Example YAML
//!
//! ```yaml
//! links:
//!   main:
//!     driver: sqlite
//!     database: /var/lib/app/app.db
//!     debug_log: /var/log/app/queries.log
//!     attach:
//!       archive: /var/lib/app/archive.db
//!   scratch:
//!     driver: memory
//!     silent_errors: true
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

/// Database engine behind a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// SQLite database file at [`LinkConfig::database`].
    #[default]
    Sqlite,
    /// Private in-memory SQLite database.
    Memory,
}

/// One named link configuration.
///
/// # Examples
///
/// ```
/// use tablerow_link::LinkConfig;
///
/// let cfg = LinkConfig::sqlite("app.db").with_debug_log("queries.log");
/// assert!(cfg.validate().is_ok());
///
/// let mut partial = LinkConfig::memory();
/// partial.password = Some("secret".into());
/// assert!(partial.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LinkConfig {
    pub driver: DriverKind,
    /// Database file path for [`DriverKind::Sqlite`]; empty for memory links.
    pub database: String,
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Suppress statement failures (logged, empty result) instead of
    /// returning them.
    pub silent_errors: bool,
    /// Append every executed statement to this file.
    pub debug_log: Option<PathBuf>,
    /// Extra database files attached on open, keyed by alias.
    pub attach: IndexMap<String, PathBuf>,
}

impl LinkConfig {
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: DriverKind::Sqlite,
            database: path.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self {
            driver: DriverKind::Memory,
            ..Self::default()
        }
    }

    pub fn with_silent_errors(mut self, silent: bool) -> Self {
        self.silent_errors = silent;
        self
    }

    pub fn with_debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    pub fn with_attached(mut self, alias: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attach.insert(alias.into(), path.into());
        self
    }

    /// Checks that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ConfigurationError`] when a file link has no path, a
    /// memory link names a path, a password is given without a username, or
    /// an attach alias is not a plain identifier.
    pub fn validate(&self) -> Result<()> {
        match self.driver {
            DriverKind::Sqlite if self.database.trim().is_empty() => {
                return Err(LinkError::ConfigurationError(
                    "sqlite link requires a database path".into(),
                ));
            }
            DriverKind::Memory if !self.database.is_empty() => {
                return Err(LinkError::ConfigurationError(format!(
                    "memory link must not name a database (got '{}')",
                    self.database
                )));
            }
            _ => {}
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(LinkError::ConfigurationError(
                "password given without username".into(),
            ));
        }
        for alias in self.attach.keys() {
            validate_alias(alias)?;
        }
        Ok(())
    }
}

/// Attach aliases are spliced into SQL, so only identifier characters pass.
pub(crate) fn validate_alias(alias: &str) -> Result<()> {
    let valid = !alias.is_empty()
        && !alias.eq_ignore_ascii_case("main")
        && !alias.eq_ignore_ascii_case("temp")
        && alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LinkError::ConfigurationError(format!(
            "invalid attach alias '{alias}': must contain only alphanumeric characters and underscores"
        )))
    }
}

/// A set of named links, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub links: IndexMap<String, LinkConfig>,
}

impl RegistryConfig {
    /// Loads a configuration file. `.yml`/`.yaml` files are parsed as YAML,
    /// `.json` files as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::IoError`] if the file cannot be read,
    /// [`LinkError::YamlError`]/[`LinkError::JsonError`] if parsing fails, and
    /// [`LinkError::ConfigurationError`] for other extensions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let reader = BufReader::new(std::fs::File::open(path)?);
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_reader(reader)?,
            ConfigFormat::Json => serde_json::from_reader(reader)?,
        };
        Ok(config)
    }

    /// Writes the configuration in the format implied by the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let writer = BufWriter::new(std::fs::File::create(path)?);
        match format {
            ConfigFormat::Yaml => serde_yaml::to_writer(writer, self)?,
            ConfigFormat::Json => serde_json::to_writer_pretty(writer, self)?,
        }
        Ok(())
    }
}

enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(LinkError::ConfigurationError(format!(
                "unsupported configuration file '{}': expected .yml, .yaml or .json",
                path.display()
            ))),
        }
    }
}
