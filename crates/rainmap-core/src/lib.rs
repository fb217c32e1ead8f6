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

//! Precipitation sampling and interpolation library.
//!
//! This library backs the rainmap service with several layers that can be
//! used independently or composed together:
//!
//! - **Provider layer**: weather API client with timeouts, bounded retry,
//!   and exponential backoff
//! - **Sampler layer**: query-point lattice generation and fan-out fetching
//!   with bounded concurrency and degrade-to-zero failure handling
//! - **Interpolation layer**: haversine distance and inverse-distance
//!   weighting onto a dense regular grid
//! - **Store layer**: TTL-cached lookups over the storm artifact
//!   directories written by the external analysis pipeline
//!
//! # Quick Start
//!
//! Generate a complete interpolated snapshot in one call:
//!
//! ```no_run
//! use rainmap_core::interp::IdwConfig;
//! use rainmap_core::provider::{ProviderConfig, WeatherClient};
//! use rainmap_core::snapshot;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = WeatherClient::new(ProviderConfig::default()).unwrap();
//!     let result = snapshot::generate(&client, 15, 50, 4, &IdwConfig::default()).await;
//!     println!(
//!         "{} samples -> {} grid nodes at {}",
//!         result.original_points, result.interpolated_points, result.timestamp
//!     );
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! The interpolator is a pure function of its inputs:
//!
//! ```
//! use rainmap_core::interp::{interpolate, IdwConfig};
//! use rainmap_core::sampler::SamplePoint;
//!
//! let samples = vec![
//!     SamplePoint { lat: 19.0, lon: -99.0, precipitation: 0.0 },
//!     SamplePoint { lat: 20.0, lon: -99.0, precipitation: 10.0 },
//! ];
//! let grid = interpolate(&samples, 10, &IdwConfig::default());
//! assert_eq!(grid.len(), 100);
//! ```

pub mod interp;
pub mod locations;
pub mod provider;
pub mod sampler;
pub mod snapshot;
pub mod store;

pub use interp::{haversine_km, idw_estimate, interpolate, IdwConfig};
pub use locations::NamedLocation;
pub use provider::{FetchError, ProviderConfig, WeatherClient};
pub use sampler::{generate_query_points, sample_all, QueryPoint, SamplePoint};
pub use snapshot::RainmapSnapshot;
pub use store::{ArtifactStore, Clock, StoreError, SystemClock};
