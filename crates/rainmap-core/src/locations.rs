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

//! Named reference locations.
//!
//! A read-only table of Mexican cities bundled with the crate as CSV and
//! parsed once at first use. These coordinates are always sampled in
//! addition to the lattice, and are the lookup targets for per-city
//! queries.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// A named reference location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// State or administrative region the location belongs to.
    pub region: String,
}

const CITIES_CSV: &str = include_str!("data/mexican_cities.csv");

lazy_static! {
    static ref NAMED_LOCATIONS: Vec<NamedLocation> = load_bundled_cities();
}

fn load_bundled_cities() -> Vec<NamedLocation> {
    let mut reader = csv::Reader::from_reader(CITIES_CSV.as_bytes());
    let mut cities = Vec::new();
    for result in reader.deserialize() {
        match result {
            Ok(city) => cities.push(city),
            // The table is compiled in; a bad row is a packaging bug
            Err(e) => log::error!("Skipping malformed city row: {}", e),
        }
    }
    cities
}

/// All named locations, in table order.
#[must_use]
pub fn all() -> &'static [NamedLocation] {
    &NAMED_LOCATIONS
}

/// Look up a location by exact name match.
#[must_use]
pub fn find(name: &str) -> Option<&'static NamedLocation> {
    NAMED_LOCATIONS.iter().find(|city| city.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_loads_completely() {
        assert_eq!(all().len(), 32);
    }

    #[test]
    fn test_find_exact_name() {
        let city = find("Ciudad de Mexico").expect("capital should exist");
        assert!((city.lat - 19.4326).abs() < 1e-9);
        assert!((city.lon - -99.1332).abs() < 1e-9);
        assert_eq!(city.region, "CDMX");
    }

    #[test]
    fn test_find_accented_name() {
        let city = find("Mérida").expect("accented names must match exactly");
        assert_eq!(city.region, "Yucatán");
    }

    #[test]
    fn test_find_unknown_or_partial_name() {
        assert!(find("Atlantis").is_none());
        // Exact match only; no prefix or case-insensitive matching
        assert!(find("ciudad de mexico").is_none());
        assert!(find("Ciudad").is_none());
    }
}
