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

//! Rainmap backend server.
//!
//! Serves live interpolated precipitation grids and the storm artifacts
//! generated by the external analysis pipeline.

mod api;
mod config;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use log::info;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use config::AppConfig;
use state::AppState;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "rainmap-server", about = "Precipitation map and storm artifact backend")]
struct Args {
    /// Listen port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Storm artifact directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn router(state: std::sync::Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(api::root))
        .route("/rainmap/realtime", get(api::realtime))
        .route("/rainmap/city", get(api::city))
        .route("/api/storms", get(api::latest_storms))
        .route("/api/storms/{storm_id}", get(api::storm_by_id))
        .route("/api/date/{date}/storms", get(api::storms_by_date))
        .route(
            "/api/date/{date}/storms/{storm_id}",
            get(api::storm_by_date_and_id),
        )
        .route("/api/maps", get(api::latest_map))
        .route("/api/maps/{storm_id}", get(api::storm_map))
        .route(
            "/api/date/{date}/maps/general/list",
            get(api::general_maps_by_date),
        )
        .route(
            "/api/date/{date}/maps/general/{index}",
            get(api::general_map_by_index),
        )
        .route(
            "/api/date/{date}/maps/{storm_id}/list",
            get(api::storm_maps_by_date),
        )
        .route(
            "/api/date/{date}/maps/{storm_id}/{index}",
            get(api::storm_map_by_index),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    if let Ok(path) = AppConfig::get_config_path() {
        info!("Config file: {}", path.display());
    }
    info!("Artifact directory: {}", config.resolved_data_dir().display());

    let port = config.port;
    let state = AppState::from_config(config)?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}
