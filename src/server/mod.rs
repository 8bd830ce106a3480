//! HTTP server: handlers, session identity and router assembly.

pub mod handlers;
pub mod routes;

pub use handlers::{
    extract_session_id, AppState, Envelope, HealthResponse, SessionId, SESSION_COOKIE,
    SESSION_HEADER,
};
pub use routes::{create_router, RouterConfig};
