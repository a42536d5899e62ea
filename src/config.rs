//! # Engine Configuration
//! TOML-backed settings with environment-variable overrides.
//!
//! Everything has a workable default: a missing or unreadable config file
//! yields a fully functional in-memory engine (no persistence, no remote
//! services). Environment variables win over the file so deployments can
//! tweak paths and caps without editing it.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::matcher::FuzzyContextConfig;
use crate::session::{PruneConfig, DEFAULT_HISTORY_CAP};

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;
pub const DEFAULT_MAX_BACKUPS: usize = 5;
pub const DEFAULT_FALLBACK_RESPONSE: &str =
    "I'm not sure how to answer that yet, but I'm listening.";

pub const ENV_CONFIG_PATH: &str = "ENGINE_CONFIG_PATH";
pub const ENV_STORAGE_PATH: &str = "ENGINE_STORAGE_PATH";
pub const ENV_SERVICES_PATH: &str = "ENGINE_SERVICES_PATH";
pub const ENV_HISTORY_CAP: &str = "ENGINE_HISTORY_CAP";
pub const ENV_RECURSION_LIMIT: &str = "ENGINE_RECURSION_LIMIT";
pub const ENV_DEFAULT_RESPONSE: &str = "ENGINE_DEFAULT_RESPONSE";

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Cap for each of the request/response/that histories.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    /// Reduction-chain depth at which evaluation fails closed.
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
    /// Reply used when nothing matches; the bot property
    /// `default_response` takes precedence when set.
    #[serde(default)]
    pub default_response: Option<String>,
    /// JSON file for durably learned categories; none disables persistence.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// JSON registry of external services.
    #[serde(default)]
    pub services_path: Option<PathBuf>,
    #[serde(default)]
    pub fuzzy: FuzzyContextConfig,
    #[serde(default)]
    pub pruning: PruneConfig,
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_recursion_limit() -> u32 {
    DEFAULT_RECURSION_LIMIT
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_cap: default_history_cap(),
            recursion_limit: default_recursion_limit(),
            default_response: None,
            storage_path: None,
            max_backups: default_max_backups(),
            services_path: None,
            fuzzy: FuzzyContextConfig::default(),
            pruning: PruneConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from `ENGINE_CONFIG_PATH` (or the default path), then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from_file(path);
        config.apply_env();
        config
    }

    /// Parse a TOML file, falling back to defaults when missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.as_ref().display(), error = %e, "bad engine config; using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var(ENV_STORAGE_PATH) {
            if !v.trim().is_empty() {
                self.storage_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = env::var(ENV_SERVICES_PATH) {
            if !v.trim().is_empty() {
                self.services_path = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = env::var(ENV_HISTORY_CAP) {
            if let Ok(cap) = v.trim().parse() {
                self.history_cap = cap;
            }
        }
        if let Ok(v) = env::var(ENV_RECURSION_LIMIT) {
            if let Ok(limit) = v.trim().parse() {
                self.recursion_limit = limit;
            }
        }
        if let Ok(v) = env::var(ENV_DEFAULT_RESPONSE) {
            if !v.trim().is_empty() {
                self.default_response = Some(v);
            }
        }
    }
}
