// Copyright 2025 Rainmap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Handles persistent configuration storage in TOML format: the listen
//! port, the artifact data directory, provider settings, and the default
//! sampling parameters.

use std::path::PathBuf;
use std::time::Duration;

use rainmap_core::provider::{ProviderConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory the storm pipeline writes artifacts into.
    /// Defaults to the platform data dir when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Weather provider endpoint URL
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// Per-request provider timeout in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Default lattice side length for /rainmap/realtime
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Default output mesh side length for /rainmap/realtime
    #[serde(default = "default_density")]
    pub density: u32,

    /// Worker pool size for provider fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Artifact directory cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_port() -> u16 {
    8000
}

fn default_provider_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_grid_size() -> u32 {
    15
}

fn default_density() -> u32 {
    50
}

fn default_max_concurrency() -> usize {
    4
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            port: default_port(),
            data_dir: None,
            provider_url: default_provider_url(),
            provider_timeout_secs: default_provider_timeout_secs(),
            grid_size: default_grid_size(),
            density: default_density(),
            max_concurrency: default_max_concurrency(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("rainmap-server", "config")
    }

    /// Save configuration to disk
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("rainmap-server", "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("rainmap-server", "config")
    }

    /// Artifact data directory, falling back to the platform data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rainmap")
                .join("artifacts")
        })
    }

    /// Provider configuration derived from this config
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.provider_url.clone(),
            timeout: Duration::from_secs(self.provider_timeout_secs),
            ..ProviderConfig::default()
        }
    }
}
