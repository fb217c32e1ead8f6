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

//! Rainmap result envelope.
//!
//! The externally visible artifact: a timestamped payload carrying the
//! interpolated grid together with the point counts consumers use to sanity
//! check it.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::interp::{interpolate, IdwConfig};
use crate::provider::WeatherClient;
use crate::sampler::{sample_all, SamplePoint};

/// Timestamped interpolated precipitation grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RainmapSnapshot {
    /// Local time, `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: String,
    /// Number of raw samples the grid was interpolated from.
    pub original_points: usize,
    /// Number of grid nodes, `density^2`.
    pub interpolated_points: usize,
    pub data: Vec<SamplePoint>,
}

impl RainmapSnapshot {
    /// Interpolate raw samples into a stamped envelope.
    ///
    /// An empty sample set produces a valid envelope with zero counts and
    /// an empty grid rather than an error, so consumers always receive
    /// well-formed JSON.
    #[must_use]
    pub fn from_samples(samples: &[SamplePoint], density: u32, idw: &IdwConfig) -> Self {
        let data = interpolate(samples, density, idw);
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            original_points: samples.len(),
            interpolated_points: data.len(),
            data,
        }
    }
}

/// Sample the region and interpolate it in one step.
pub async fn generate(
    client: &WeatherClient,
    grid_size: u32,
    density: u32,
    max_concurrency: usize,
    idw: &IdwConfig,
) -> RainmapSnapshot {
    let samples = sample_all(client, grid_size, max_concurrency).await;
    RainmapSnapshot::from_samples(&samples, density, idw)
}
