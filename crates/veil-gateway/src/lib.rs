//! # Veil Gateway
//!
//! HTTP surface of the Veil metadata service.
//!
//! This crate provides:
//! - **Crypt metadata**: `GET`/`POST /api/fs/crypt_meta`, everything a client
//!   needs to fetch and decrypt one file itself
//! - **Health check**: `GET /ping`
//! - **Rate Limiting**: Per-client request throttling
//! - **Configuration**: file and environment layered settings, mount definitions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                    Veil Gateway                     │
//! ├─────────────────────────────────────────────────────┤
//! │  Client IP │ Rate Limiter │ Request ID │ Timeout    │
//! ├─────────────────────────────────────────────────────┤
//! │                     Handlers                        │
//! ├─────────────────────────────────────────────────────┤
//! │                    veil-core                        │
//! │     (chain resolution, proxy policy, assembly)      │
//! ├─────────────────────────────────────────────────────┤
//! │                   veil-storage                      │
//! │          (mount table, drivers, overlays)           │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResponse};
pub use server::{run_server, run_server_with_shutdown};
pub use state::AppState;
