//! HTTP Ingress: the axum surface wrapping the orchestrator and its
//! collaborators behind the routes documented in [`router::build`].

mod handlers;
pub mod router;
pub mod state;

pub use state::AppState;
