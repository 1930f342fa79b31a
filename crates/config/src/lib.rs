//! Configuration loading, validation, and management for factctx.
//!
//! Loads configuration from `~/.factctx/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use factctx_core::fact::{CategorySet, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.factctx/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fact store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Contextual selection configuration
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `~/` is expanded; unset means
    /// `~/.factctx/facts.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Upper bound on a single store round-trip.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Categories a fact may carry.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// What the prompt pipeline does when the store is unreachable.
    #[serde(default)]
    pub on_unavailable: UnavailablePolicy,
}

fn default_timeout_ms() -> u64 {
    5000
}
fn default_categories() -> Vec<String> {
    CategorySet::default()
        .names()
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_ms: default_timeout_ms(),
            categories: default_categories(),
            on_unavailable: UnavailablePolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Resolved database path.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => expand_home(p),
            None => AppConfig::config_dir().join("facts.sqlite"),
        }
    }

    pub fn category_set(&self) -> CategorySet {
        CategorySet::new(self.categories.iter().cloned())
    }
}

/// Behaviour of the prompt pipeline when the store cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Fail the whole pipeline with the storage error.
    #[default]
    Fail,
    /// Build the prompt without facts, log a warning, and flag the output.
    Degrade,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    #[serde(default = "default_true")]
    pub allow_conflicts: bool,

    /// Scope names, highest authority first.
    #[serde(default = "default_scope_priority_order")]
    pub scope_priority_order: Vec<String>,

    /// Categories admitted for request types missing from `relevance_map`.
    #[serde(default)]
    pub default_categories: Vec<String>,

    /// Request type → admissible categories.
    #[serde(default = "default_relevance_map")]
    pub relevance_map: BTreeMap<String, Vec<String>>,
}

fn default_min_confidence() -> f64 {
    0.7
}
fn default_max_facts() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_scope_priority_order() -> Vec<String> {
    Scope::ALL.iter().map(|s| s.as_str().to_string()).collect()
}
fn default_relevance_map() -> BTreeMap<String, Vec<String>> {
    let entry = |kind: &str, cats: &[&str]| {
        (
            kind.to_string(),
            cats.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        )
    };
    BTreeMap::from([
        entry("coding", &["fact", "decision", "constraint"]),
        entry("chat", &["fact", "preference"]),
        entry("planning", &["decision", "constraint", "preference"]),
    ])
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_facts: default_max_facts(),
            allow_conflicts: true,
            scope_priority_order: default_scope_priority_order(),
            default_categories: vec![],
            relevance_map: default_relevance_map(),
        }
    }
}

impl SelectionConfig {
    /// Parse `scope_priority_order` into scopes, requiring each scope
    /// exactly once.
    pub fn scope_order(&self) -> Result<Vec<Scope>, ConfigError> {
        let mut seen = HashSet::new();
        let mut order = Vec::with_capacity(Scope::ALL.len());
        for name in &self.scope_priority_order {
            let scope: Scope = name
                .parse()
                .map_err(|e: factctx_core::fact::ParseScopeError| {
                    ConfigError::ValidationError(format!("scope_priority_order: {e}"))
                })?;
            if !seen.insert(scope) {
                return Err(ConfigError::ValidationError(format!(
                    "scope_priority_order lists '{scope}' more than once"
                )));
            }
            order.push(scope);
        }
        if order.len() != Scope::ALL.len() {
            return Err(ConfigError::ValidationError(
                "scope_priority_order must name session, project, user and org".into(),
            ));
        }
        Ok(order)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.factctx/config.toml).
    ///
    /// Environment overrides:
    /// - `FACTCTX_STORE_PATH`: database file
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(path) = std::env::var("FACTCTX_STORE_PATH") {
            config.store.path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".factctx")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sel = &self.selection;
        if !(0.0..=1.0).contains(&sel.min_confidence) {
            return Err(ConfigError::ValidationError(
                "selection.min_confidence must be between 0.0 and 1.0".into(),
            ));
        }
        if sel.max_facts == 0 {
            return Err(ConfigError::ValidationError(
                "selection.max_facts must be > 0".into(),
            ));
        }
        sel.scope_order()?;

        if self.store.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "store.timeout_ms must be > 0".into(),
            ));
        }
        let categories = self.store.category_set();
        if categories.is_empty() {
            return Err(ConfigError::ValidationError(
                "store.categories must not be empty".into(),
            ));
        }

        let mapped = sel
            .relevance_map
            .iter()
            .flat_map(|(kind, cats)| cats.iter().map(move |c| (kind.as_str(), c)))
            .chain(sel.default_categories.iter().map(|c| ("<default>", c)));
        for (kind, category) in mapped {
            if !categories.contains(category) {
                return Err(ConfigError::ValidationError(format!(
                    "selection.relevance_map[{kind}] uses unknown category '{category}'"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for factctx_core::Error {
    fn from(err: ConfigError) -> Self {
        factctx_core::Error::config(err.to_string())
    }
}
