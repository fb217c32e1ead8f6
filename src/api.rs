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

//! HTTP request handlers.
//!
//! Thin layer over the core library: the rainmap endpoints sample and
//! interpolate on demand, the storm endpoints serve artifacts produced by
//! the external analysis pipeline. Every error path answers with a
//! well-formed JSON body so downstream renderers never see a malformed
//! payload.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use rainmap_core::locations;
use rainmap_core::snapshot::{self, RainmapSnapshot};
use rainmap_core::store::StoreError;

use crate::state::AppState;

/// Upper bound on the lattice side length (`grid_size^2 + cities` provider
/// calls per request).
const MAX_GRID_SIZE: u32 = 50;
/// Upper bound on the output mesh side length (`density^2 * samples` IDW
/// evaluations per request).
const MAX_DENSITY: u32 = 200;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_)
            | ApiError::Store(StoreError::NoData | StoreError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::Io(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `GET /` — liveness check.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Rainmap backend running" }))
}

#[derive(Debug, Deserialize)]
pub struct RainmapParams {
    pub grid_size: Option<u32>,
    pub density: Option<u32>,
}

fn validate_bounded(name: &str, value: u32, max: u32) -> Result<u32, ApiError> {
    if value < 1 || value > max {
        return Err(ApiError::BadRequest(format!(
            "{name} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(value)
}

/// `GET /rainmap/realtime?grid_size=15&density=50`
///
/// Samples the region live and returns the interpolated grid envelope.
/// Provider outages degrade to zero-valued samples, so the response is
/// always a valid envelope.
pub async fn realtime(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RainmapParams>,
) -> Result<Json<RainmapSnapshot>, ApiError> {
    let grid_size = validate_bounded(
        "grid_size",
        params.grid_size.unwrap_or(state.config.grid_size),
        MAX_GRID_SIZE,
    )?;
    let density = validate_bounded(
        "density",
        params.density.unwrap_or(state.config.density),
        MAX_DENSITY,
    )?;

    info!(
        "Generating rainmap: grid_size={}, density={}",
        grid_size, density
    );
    let result = snapshot::generate(
        &state.client,
        grid_size,
        density,
        state.config.max_concurrency,
        &state.idw,
    )
    .await;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct CityParams {
    pub name: Option<String>,
}

/// Fresh measurement for one named location.
#[derive(Debug, Serialize)]
pub struct CitySample {
    pub name: String,
    pub region: String,
    pub lat: f64,
    pub lon: f64,
    pub precipitation: f64,
}

/// `GET /rainmap/city?name=Guadalajara`
///
/// Unknown names are a 404 naming the offender; a provider failure for a
/// known city degrades to zero like any other sample.
pub async fn city(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityParams>,
) -> Result<Json<CitySample>, ApiError> {
    let name = params.name.as_deref().unwrap_or("Ciudad de Mexico");
    let city = locations::find(name)
        .ok_or_else(|| ApiError::NotFound(format!("city '{name}' not found")))?;

    let precipitation = match state.client.fetch_precipitation(city.lat, city.lon).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Fetch failed for city '{}', using 0.0: {}", city.name, e);
            0.0
        }
    };

    Ok(Json(CitySample {
        name: city.name.clone(),
        region: city.region.clone(),
        lat: city.lat,
        lon: city.lon,
        precipitation,
    }))
}

async fn read_json_file(path: &std::path::Path) -> Result<Value, ApiError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ApiError::Internal(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| ApiError::Internal(format!("parsing {}: {e}", path.display())))
}

/// `GET /api/storms` — latest storm summary JSON.
pub async fn latest_storms(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let path = state.store.latest_summary_json()?;
    Ok(Json(read_json_file(&path).await?))
}

/// `GET /api/storms/{storm_id}` — one storm from the latest artifacts.
pub async fn storm_by_id(
    State(state): State<Arc<AppState>>,
    Path(storm_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let path = state.store.storm_json(&storm_id)?;
    Ok(Json(read_json_file(&path).await?))
}

/// `GET /api/date/{date}/storms` — every storm JSON for a date, keyed by
/// file stem. Unreadable files are reported inline instead of failing the
/// whole response.
pub async fn storms_by_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let (dir, files) = state.store.date_jsons(&date)?;

    let mut data = BTreeMap::new();
    for file in &files {
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let content = match read_json_file(file).await {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        };
        data.insert(stem, content);
    }

    let directory = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(Json(json!({
        "date": date,
        "directory": directory,
        "total_files": files.len(),
        "data": data,
    })))
}

/// `GET /api/date/{date}/storms/{storm_id}` — one storm from the newest
/// artifacts of a specific date.
pub async fn storm_by_date_and_id(
    State(state): State<Arc<AppState>>,
    Path((date, storm_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let path = state.store.date_storm_json(&date, &storm_id)?;
    let data = read_json_file(&path).await?;

    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(Json(json!({
        "date": date,
        "storm_id": storm_id,
        "file": file,
        "data": data,
    })))
}

async fn png_response(path: &std::path::Path) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Internal(format!("reading {}: {e}", path.display())))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// `GET /api/maps` — latest rendered overview map as PNG.
pub async fn latest_map(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let path = state.store.latest_map_png()?;
    png_response(&path).await
}

/// `GET /api/maps/{storm_id}` — latest rendered map for one storm.
pub async fn storm_map(
    State(state): State<Arc<AppState>>,
    Path(storm_id): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.store.storm_map_png(&storm_id)?;
    png_response(&path).await
}

/// Index listing over a map frame sequence.
fn map_index_json(date: &str, storm_id: Option<&str>, files: &[std::path::PathBuf]) -> Value {
    let images: Vec<Value> = files
        .iter()
        .enumerate()
        .map(|(index, path)| {
            json!({
                "index": index,
                "filename": path.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
            })
        })
        .collect();

    let mut body = json!({
        "date": date,
        "total_images": files.len(),
        "images": images,
    });
    if let Some(id) = storm_id {
        body["storm_id"] = json!(id);
    }
    body
}

fn select_frame(files: &[std::path::PathBuf], index: usize) -> Result<&std::path::Path, ApiError> {
    files.get(index).map(PathBuf::as_path).ok_or_else(|| {
        ApiError::NotFound(format!(
            "index {index} out of range, total images: {}",
            files.len()
        ))
    })
}

/// `GET /api/date/{date}/maps/general/list` — index of every overview map
/// frame generated on a date, across all runs.
pub async fn general_maps_by_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let files = state.store.date_map_pngs(&date, None)?;
    Ok(Json(map_index_json(&date, None, &files)))
}

/// `GET /api/date/{date}/maps/general/{index}` — one overview frame.
pub async fn general_map_by_index(
    State(state): State<Arc<AppState>>,
    Path((date, index)): Path<(String, usize)>,
) -> Result<Response, ApiError> {
    let files = state.store.date_map_pngs(&date, None)?;
    png_response(select_frame(&files, index)?).await
}

/// `GET /api/date/{date}/maps/{storm_id}/list` — index of one storm's map
/// frames for a date.
pub async fn storm_maps_by_date(
    State(state): State<Arc<AppState>>,
    Path((date, storm_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let files = state.store.date_map_pngs(&date, Some(&storm_id))?;
    Ok(Json(map_index_json(&date, Some(&storm_id), &files)))
}

/// `GET /api/date/{date}/maps/{storm_id}/{index}` — one storm frame.
pub async fn storm_map_by_index(
    State(state): State<Arc<AppState>>,
    Path((date, storm_id, index)): Path<(String, String, usize)>,
) -> Result<Response, ApiError> {
    let files = state.store.date_map_pngs(&date, Some(&storm_id))?;
    png_response(select_frame(&files, index)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rainmap_core::sampler;

    #[test]
    fn test_validate_bounds() {
        assert_eq!(validate_bounded("grid_size", 15, MAX_GRID_SIZE).unwrap(), 15);
        assert_eq!(validate_bounded("grid_size", 1, MAX_GRID_SIZE).unwrap(), 1);
        assert!(validate_bounded("grid_size", 0, MAX_GRID_SIZE).is_err());
        assert!(validate_bounded("grid_size", 51, MAX_GRID_SIZE).is_err());
        assert!(validate_bounded("density", 200, MAX_DENSITY).is_ok());
        assert!(validate_bounded("density", 201, MAX_DENSITY).is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::NoData).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_is_json() {
        let response = ApiError::NotFound("city 'Atlantis' not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("application/json"));
    }

    #[test]
    fn test_default_city_exists() {
        // The handler's fallback name must always resolve
        assert!(locations::find("Ciudad de Mexico").is_some());
    }

    #[test]
    fn test_max_grid_size_covers_default() {
        assert!(sampler::generate_query_points(MAX_GRID_SIZE).len() >= 2500);
        assert!(MAX_GRID_SIZE >= 15 && MAX_DENSITY >= 100);
    }

    #[test]
    fn test_map_index_listing() {
        let files = vec![
            PathBuf::from("/data/20251103_080000/maps/map_20251103_080000.png"),
            PathBuf::from("/data/20251103_180000/maps/map_20251103_180000.png"),
        ];

        let body = map_index_json("20251103", None, &files);
        assert_eq!(body["total_images"], 2);
        assert_eq!(body["images"][0]["index"], 0);
        assert_eq!(body["images"][1]["filename"], "map_20251103_180000.png");
        assert!(body.get("storm_id").is_none());

        let body = map_index_json("20251103", Some("AL052025"), &files);
        assert_eq!(body["storm_id"], "AL052025");
    }

    #[test]
    fn test_select_frame_bounds() {
        let files = vec![PathBuf::from("/data/maps/map_a.png")];
        assert!(select_frame(&files, 0).is_ok());

        let err = select_frame(&files, 1).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("out of range"));

        assert!(select_frame(&[], 0).is_err());
    }
}
