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

//! Shared application state for the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use rainmap_core::interp::IdwConfig;
use rainmap_core::provider::{FetchError, WeatherClient};
use rainmap_core::store::ArtifactStore;

use crate::config::AppConfig;

/// State shared across all request handlers.
#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub client: WeatherClient,
    pub store: ArtifactStore,
    pub idw: IdwConfig,
}

impl AppState {
    /// Build the shared state from loaded configuration.
    pub fn from_config(config: AppConfig) -> Result<Arc<Self>, FetchError> {
        let client = WeatherClient::new(config.provider_config())?;
        let store = ArtifactStore::with_clock(
            config.resolved_data_dir(),
            Duration::from_secs(config.cache_ttl_secs),
            Arc::new(rainmap_core::store::SystemClock),
        );
        Ok(Arc::new(Self {
            config,
            client,
            store,
            idw: IdwConfig::default(),
        }))
    }
}
