//! The named link registry.
//!
//! Holds link configurations in registration order and the handles opened
//! from them. Handles are opened lazily through [`LinkRegistry::link`] and
//! live until [`LinkRegistry::close`] drops them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use indexmap::IndexMap;
use tablerow_core::Value;
use tracing::debug;

use crate::config::{LinkConfig, RegistryConfig};
use crate::error::{LinkError, Result};
use crate::link::Link;
use crate::session::Session;

/// Registry of named link configurations and their open handles.
///
/// The registry is `Send + Sync`; share it behind an [`Arc`]. Opening a
/// handle happens with the handle table locked, so concurrent callers asking
/// for the same link receive the same [`Arc<Link>`] and only one open is ever
/// in flight.
///
/// # Examples
///
/// ```
/// use tablerow_core::ResultMode;
/// use tablerow_link::{LinkConfig, LinkRegistry};
///
/// let registry = LinkRegistry::new();
/// registry.add_link("main", LinkConfig::memory()).unwrap();
///
/// // Opened on first use, cached afterwards.
/// let a = registry.link(None).unwrap();
/// let b = registry.link(Some("main")).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
///
/// let mut session = registry.session();
/// let one = session.query("SELECT 1", ResultMode::SingleCell, None).unwrap();
/// assert_eq!(one.into_cell().and_then(|v| v.as_i64()), Some(1));
/// ```
#[derive(Default)]
pub struct LinkRegistry {
    configs: RwLock<IndexMap<String, LinkConfig>>,
    handles: Mutex<HashMap<String, Arc<Link>>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry with every link from `config` registered, in order.
    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        let registry = Self::new();
        for (name, link) in config.links {
            registry.add_link(name, link)?;
        }
        Ok(registry)
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, Arc<Link>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers or replaces the configuration for `name`. Does not open
    /// anything; a handle that is already open keeps its old configuration
    /// until it is closed or reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ConfigurationError`] for a blank name or an
    /// inconsistent configuration.
    pub fn add_link(&self, name: impl Into<String>, config: LinkConfig) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LinkError::ConfigurationError("link name must not be empty".into()));
        }
        config.validate()?;
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, config);
        Ok(())
    }

    /// Opens a fresh handle for `name`, replacing any cached one.
    ///
    /// When `config` is given it is registered first; otherwise the
    /// previously registered configuration is used.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ConfigurationError`] if no configuration is known for
    /// `name`, and [`LinkError::ConnectionError`] if the driver cannot open it.
    pub fn connect(&self, name: &str, config: Option<LinkConfig>) -> Result<Arc<Link>> {
        if let Some(config) = config {
            self.add_link(name, config)?;
        }
        let mut handles = self.handles();
        let link = Arc::new(Link::open(name, self.resolve_config(name)?)?);
        handles.insert(name.to_string(), Arc::clone(&link));
        Ok(link)
    }

    /// Returns the cached handle for `name` (default: the first registered
    /// link), opening it if needed.
    pub fn link(&self, name: Option<&str>) -> Result<Arc<Link>> {
        let name = self.resolve_name(name)?;
        let mut handles = self.handles();
        if let Some(link) = handles.get(&name) {
            return Ok(Arc::clone(link));
        }
        let link = Arc::new(Link::open(&name, self.resolve_config(&name)?)?);
        handles.insert(name, Arc::clone(&link));
        Ok(link)
    }

    /// Drops the cached handle for `name` (default: the first registered
    /// link). Returns `false` if nothing was open. Outstanding `Arc<Link>`
    /// clones stay usable; the next [`link`](Self::link) call reopens.
    pub fn close(&self, name: Option<&str>) -> Result<bool> {
        let name = self.resolve_name(name)?;
        let closed = self.handles().remove(&name).is_some();
        if closed {
            debug!(link = %name, "closed link");
        }
        Ok(closed)
    }

    /// Quotes `value` using the driver of link `name`.
    pub fn escape(&self, value: &Value, name: Option<&str>) -> Result<String> {
        Ok(self.link(name)?.escape(value))
    }

    /// Returns a copy of the configuration registered under `name`.
    pub fn config(&self, name: &str) -> Option<LinkConfig> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered link names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.handles().contains_key(name)
    }

    /// Starts a request-scoped session for diagnostic tracking.
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    fn resolve_name(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(name) => Ok(name.to_string()),
            None => self
                .configs
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| LinkError::ConfigurationError("no links registered".into())),
        }
    }

    fn resolve_config(&self, name: &str) -> Result<LinkConfig> {
        self.config(name)
            .ok_or_else(|| LinkError::ConfigurationError(format!("no configuration for link '{name}'")))
    }
}
