//! Rusgram · Russian spelling exercise backend
//!
//! - Axum HTTP + WebSocket API
//! - Exercises generated by Gemini and extracted from its markdown reply
//! - In-memory sessions: current exercise set + in-progress answers, scored on demand
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : server-side key; clients may also send their own
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-2.0-flash"
//!   GEMINI_TEMPERATURE  : default 0
//!   GEMINI_TOP_P        : default 1
//!   GEMINI_SEED         : default 42, "none" to disable
//!   GEMINI_TIMEOUT_SECS : default 60
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts + model settings)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod config;
mod domain;
mod gemini;
mod logic;
mod parser;
mod protocol;
mod routes;
mod scoring;
mod state;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (session store, prompts, Gemini client).
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "rusgram_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "rusgram_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "rusgram_backend", "Shutdown signal received");
}
