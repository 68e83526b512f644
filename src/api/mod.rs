//! HTTP Surface
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    API                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  dto.rs     - Request / response bodies                      │
//! │  error.rs   - ErrorKind -> status + {"message","code"}       │
//! │  state.rs   - Shared handler state                           │
//! │  server.rs  - Router, middleware, serve loop                 │
//! │  routes/    - health, proof, chain, kv handlers              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::{create_app, run_server, start_background_server};
pub use state::AppState;
