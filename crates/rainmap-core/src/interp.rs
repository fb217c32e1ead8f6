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

//! Spatial interpolation over sparse precipitation samples.
//!
//! Turns the sampler's scattered point measurements into a dense regular
//! grid using inverse-distance weighting over great-circle distance, so the
//! frontend can render a continuous precipitation field.

use crate::sampler::SamplePoint;

/// Mean Earth radius in kilometers, used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Tuning parameters for inverse-distance weighting.
#[derive(Debug, Clone)]
pub struct IdwConfig {
    /// Distance exponent. Higher values make interpolation more local.
    pub power: f64,
    /// Floor substituted for a zero distance before exponentiation.
    ///
    /// A query point that coincides with a known sample would otherwise
    /// divide by zero; clamping to this floor gives the coincident sample a
    /// very large but finite weight, so the estimate converges to that
    /// sample's own value.
    pub min_distance_km: f64,
}

impl Default for IdwConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            min_distance_km: 1e-6,
        }
    }
}

/// Great-circle distance between two points in kilometers.
///
/// Haversine formula on a sphere of radius [`EARTH_RADIUS_KM`]. Inputs are
/// in degrees. Symmetric, and exactly zero for identical points.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );

    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Estimate the precipitation at `(lat, lon)` from the known samples.
///
/// Each sample contributes `1 / d^power`; the result is the weighted
/// average of sample values. Returns 0.0 when `samples` is empty so the
/// caller never divides by a zero weight sum.
#[must_use]
pub fn idw_estimate(lat: f64, lon: f64, samples: &[SamplePoint], config: &IdwConfig) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;

    for sample in samples {
        let distance = haversine_km(lat, lon, sample.lat, sample.lon).max(config.min_distance_km);
        let weight = 1.0 / distance.powf(config.power);
        weight_sum += weight;
        value_sum += weight * sample.precipitation;
    }

    value_sum / weight_sum
}

/// Interpolate the samples onto a `density x density` regular mesh.
///
/// The mesh spans the bounding box of the input samples with inclusive
/// endpoints. Every node is estimated against the full sample set, so the
/// cost is `O(density^2 * samples)`; acceptable because both stay small.
/// An empty sample set yields an empty grid.
#[must_use]
pub fn interpolate(samples: &[SamplePoint], density: u32, config: &IdwConfig) -> Vec<SamplePoint> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;
    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;

    for sample in samples {
        min_lat = min_lat.min(sample.lat);
        max_lat = max_lat.max(sample.lat);
        min_lon = min_lon.min(sample.lon);
        max_lon = max_lon.max(sample.lon);
    }

    let lats = linspace(min_lat, max_lat, density);
    let lons = linspace(min_lon, max_lon, density);

    let mut grid = Vec::with_capacity((density as usize).pow(2));
    for &lat in &lats {
        for &lon in &lons {
            grid.push(SamplePoint {
                lat,
                lon,
                precipitation: idw_estimate(lat, lon, samples, config),
            });
        }
    }

    grid
}

/// `count` evenly spaced values from `start` to `end`, endpoints inclusive.
pub(crate) fn linspace(start: f64, end: f64, count: u32) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / f64::from(count - 1);
            (0..count).map(|i| start + step * f64::from(i)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(lat: f64, lon: f64, precipitation: f64) -> SamplePoint {
        SamplePoint {
            lat,
            lon,
            precipitation,
        }
    }

    #[test]
    fn test_haversine_identity() {
        assert_eq!(haversine_km(19.4326, -99.1332, 19.4326, -99.1332), 0.0);
        assert_eq!(haversine_km(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(haversine_km(-90.0, 180.0, -90.0, 180.0), 0.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let d1 = haversine_km(19.4326, -99.1332, 25.6866, -100.3161);
        let d2 = haversine_km(25.6866, -100.3161, 19.4326, -99.1332);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Mexico City to Guadalajara is roughly 460 km
        let d = haversine_km(19.4326, -99.1332, 20.6597, -103.3496);
        assert!(d > 440.0 && d < 480.0, "got {d}");
    }

    #[test]
    fn test_idw_at_known_point_returns_its_value() {
        let samples = vec![
            sample(19.0, -99.0, 0.0),
            sample(20.0, -99.0, 10.0),
            sample(21.0, -100.0, 4.0),
        ];
        let config = IdwConfig::default();
        let estimate = idw_estimate(20.0, -99.0, &samples, &config);
        assert!((estimate - 10.0).abs() < 1e-3, "got {estimate}");
    }

    #[test]
    fn test_idw_empty_samples_is_zero() {
        let config = IdwConfig::default();
        assert_eq!(idw_estimate(19.0, -99.0, &[], &config), 0.0);
    }

    #[test]
    fn test_idw_between_two_equal_samples_is_average() {
        let samples = vec![sample(19.0, -99.0, 2.0), sample(21.0, -99.0, 6.0)];
        let config = IdwConfig::default();
        let estimate = idw_estimate(20.0, -99.0, &samples, &config);
        assert!((estimate - 4.0).abs() < 1e-6, "got {estimate}");
    }

    #[test]
    fn test_interpolate_grid_size_and_extents() {
        let samples = vec![
            sample(14.5, -118.0, 1.0),
            sample(32.75, -86.5, 3.0),
            sample(20.0, -100.0, 5.0),
        ];
        let grid = interpolate(&samples, 10, &IdwConfig::default());
        assert_eq!(grid.len(), 100);

        let min_lat = grid.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
        let max_lat = grid.iter().map(|p| p.lat).fold(f64::NEG_INFINITY, f64::max);
        let min_lon = grid.iter().map(|p| p.lon).fold(f64::INFINITY, f64::min);
        let max_lon = grid.iter().map(|p| p.lon).fold(f64::NEG_INFINITY, f64::max);

        assert!((min_lat - 14.5).abs() < 1e-9);
        assert!((max_lat - 32.75).abs() < 1e-9);
        assert!((min_lon - -118.0).abs() < 1e-9);
        assert!((max_lon - -86.5).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_empty_samples() {
        let grid = interpolate(&[], 50, &IdwConfig::default());
        assert!(grid.is_empty());
    }

    #[test]
    fn test_interpolate_two_sample_gradient() {
        let samples = vec![sample(19.0, -99.0, 0.0), sample(20.0, -99.0, 10.0)];
        let grid = interpolate(&samples, 2, &IdwConfig::default());
        assert_eq!(grid.len(), 4);

        let near_wet = grid
            .iter()
            .min_by(|a, b| {
                haversine_km(a.lat, a.lon, 20.0, -99.0)
                    .total_cmp(&haversine_km(b.lat, b.lon, 20.0, -99.0))
            })
            .unwrap();
        let near_dry = grid
            .iter()
            .min_by(|a, b| {
                haversine_km(a.lat, a.lon, 19.0, -99.0)
                    .total_cmp(&haversine_km(b.lat, b.lon, 19.0, -99.0))
            })
            .unwrap();

        assert!(
            (near_wet.precipitation - 10.0).abs() < (near_dry.precipitation - 10.0).abs(),
            "wet node {} should be closer to 10.0 than dry node {}",
            near_wet.precipitation,
            near_dry.precipitation
        );
    }

    #[test]
    fn test_linspace_endpoints() {
        let values = linspace(14.5, 32.75, 15);
        assert_eq!(values.len(), 15);
        assert!((values[0] - 14.5).abs() < 1e-9);
        assert!((values[14] - 32.75).abs() < 1e-9);
    }

    #[test]
    fn test_linspace_single_point() {
        assert_eq!(linspace(5.0, 10.0, 1), vec![5.0]);
        assert!(linspace(5.0, 10.0, 0).is_empty());
    }
}
