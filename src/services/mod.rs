//! # External Services
//! Configuration and registry for the remote-reply (`sraix`) tag.
//!
//! Services are declared in a JSON file (`config/services.json` by default)
//! and can be reloaded at runtime through the admin route. Each entry maps a
//! service name to an HTTP endpoint plus response-handling rules.

pub mod cache;
pub mod client;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use cache::ServiceCache;
pub use client::{call, fallback_reply, ServiceRequest};

pub const DEFAULT_SERVICES_PATH: &str = "config/services.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
    Xml,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Dotted path into a JSON response, e.g. `output.text`.
    #[serde(default)]
    pub response_path: Option<String>,
    #[serde(default)]
    pub fallback_response: Option<String>,
    #[serde(default)]
    pub include_wildcards: bool,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    /// Reuse identical replies for this long; 0 disables caching.
    #[serde(default)]
    pub cache_ttl_secs: u64,
    /// Outbound calls allowed per UTC day; absent means unlimited.
    #[serde(default)]
    pub daily_limit: Option<u32>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// On-disk shape: `{"services": [ ... ]}`.
#[derive(Debug, Default, Deserialize)]
struct ServicesFile {
    #[serde(default)]
    services: Vec<ServiceConfig>,
}

#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceConfig>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. A missing or unreadable file yields an empty
    /// registry; the engine still answers, minus remote services.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let parsed: ServicesFile = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => ServicesFile::default(),
        };
        let mut registry = Self::new();
        for service in parsed.services {
            registry.insert(service);
        }
        info!(count = registry.len(), "service registry loaded");
        registry
    }

    pub fn insert(&mut self, service: ServiceConfig) {
        self.services.insert(service.name.to_lowercase(), service);
    }

    pub fn get(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
