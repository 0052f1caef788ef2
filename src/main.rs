//! Kata · Training Progression Backend
//!
//! - Axum HTTP API over the progression engine (plans, sessions, XP, cycles)
//! - In-memory store; catalog and game rules from TOML or built-in seeds
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   KATA_CONFIG_PATH  : path to TOML config (game rules + optional catalog)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use kata_backend::routes::build_router;
use kata_backend::state::AppState;
use kata_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (store, catalog, game rules).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "kata_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
