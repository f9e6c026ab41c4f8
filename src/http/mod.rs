//! HTTP control surface.
//!
//! A thin command layer over the recorder; it parses user input and turns
//! pipeline outcomes into human-readable replies. No recording invariants
//! live here.
//!
//! - POST /sessions/start - admit and start a recording
//! - POST /sessions/stop - stop the recording bound to a channel
//! - GET /sessions/:group_id - status of the group's active session
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
