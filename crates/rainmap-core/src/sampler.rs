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

//! Precipitation grid sampling.
//!
//! Builds the fixed set of query points (a regular lattice over the target
//! region plus the named-location table) and resolves each to a measurement
//! through the weather provider, fanning out over a small bounded worker
//! pool. A failed point degrades to a zero-valued sample; one bad point
//! never fails the batch.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::locations;
use crate::provider::WeatherClient;

/// Geographic bounding box, degrees.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Target region covered by the sampling lattice (Mexico).
pub const REGION: BoundingBox = BoundingBox {
    min_lat: 14.5,
    max_lat: 32.75,
    min_lon: -118.0,
    max_lon: -86.5,
};

/// A coordinate whose measurement has not been fetched yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub lat: f64,
    pub lon: f64,
}

/// A geolocated precipitation measurement in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
    pub precipitation: f64,
}

/// Build the query lattice plus the named-location coordinates.
///
/// The lattice is `grid_size x grid_size`, evenly spaced over [`REGION`]
/// with inclusive endpoints; the named locations are appended afterwards so
/// the cities are always sampled exactly, whatever the lattice resolution.
/// Result length is `grid_size^2 + N_named`.
#[must_use]
pub fn generate_query_points(grid_size: u32) -> Vec<QueryPoint> {
    let lats = crate::interp::linspace(REGION.min_lat, REGION.max_lat, grid_size);
    let lons = crate::interp::linspace(REGION.min_lon, REGION.max_lon, grid_size);

    let mut points = Vec::with_capacity((grid_size as usize).pow(2) + locations::all().len());
    for &lat in &lats {
        for &lon in &lons {
            points.push(QueryPoint { lat, lon });
        }
    }

    for city in locations::all() {
        points.push(QueryPoint {
            lat: city.lat,
            lon: city.lon,
        });
    }

    points
}

/// Fetch measurements for every query point with bounded concurrency.
///
/// At most `max_concurrency` requests are in flight at once, to respect the
/// provider's rate limits. Results arrive in no particular order, which is
/// fine: the interpolator only needs the unordered sample set. Per-point
/// failures are logged and become zero-valued samples, so this always
/// returns exactly one sample per query point.
pub async fn sample_all(
    client: &WeatherClient,
    grid_size: u32,
    max_concurrency: usize,
) -> Vec<SamplePoint> {
    let points = generate_query_points(grid_size);
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for point in points {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            // Closed only if the semaphore is dropped, which it is not
            let Ok(_permit) = semaphore.acquire().await else {
                return zero_sample(point);
            };
            match client.fetch_precipitation(point.lat, point.lon).await {
                Ok(precipitation) => SamplePoint {
                    lat: point.lat,
                    lon: point.lon,
                    precipitation,
                },
                Err(e) => {
                    warn!(
                        "Fetch failed for ({}, {}), using 0.0: {}",
                        point.lat, point.lon, e
                    );
                    zero_sample(point)
                }
            }
        });
    }

    let mut samples = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!("Sampling task panicked: {}", e),
        }
    }

    samples
}

fn zero_sample(point: QueryPoint) -> SamplePoint {
    SamplePoint {
        lat: point.lat,
        lon: point.lon,
        precipitation: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;
    use std::time::Duration;

    #[test]
    fn test_query_point_count() {
        for grid_size in [1u32, 2, 15] {
            let points = generate_query_points(grid_size);
            assert_eq!(
                points.len(),
                (grid_size as usize).pow(2) + locations::all().len()
            );
        }
    }

    #[test]
    fn test_lattice_points_within_region() {
        let points = generate_query_points(15);
        let lattice = &points[..225];
        for point in lattice {
            assert!(point.lat >= REGION.min_lat && point.lat <= REGION.max_lat);
            assert!(point.lon >= REGION.min_lon && point.lon <= REGION.max_lon);
        }
    }

    #[test]
    fn test_named_locations_appended_exactly() {
        let points = generate_query_points(2);
        let tail = &points[4..];
        let cities = locations::all();
        assert_eq!(tail.len(), cities.len());
        for (point, city) in tail.iter().zip(cities) {
            assert_eq!(point.lat, city.lat);
            assert_eq!(point.lon, city.lon);
        }
    }

    #[test]
    fn test_lattice_spans_region_corners() {
        let points = generate_query_points(2);
        assert_eq!(
            points[0],
            QueryPoint {
                lat: REGION.min_lat,
                lon: REGION.min_lon
            }
        );
        assert_eq!(
            points[3],
            QueryPoint {
                lat: REGION.max_lat,
                lon: REGION.max_lon
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_to_zero() {
        // Nothing listens on this port; every fetch fails with a connect
        // error and the sampler falls back to zero-valued samples.
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9/v1/forecast".to_string(),
            timeout: Duration::from_millis(500),
            max_attempts: 2,
            backoff_base: Duration::from_millis(1),
        };
        let client = WeatherClient::new(config).unwrap();

        let samples = sample_all(&client, 1, 4).await;
        assert_eq!(samples.len(), 1 + locations::all().len());
        assert!(samples.iter().all(|s| s.precipitation == 0.0));
    }
}
