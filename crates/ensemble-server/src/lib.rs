//! Ensemble gateway HTTP surface: REST routes plus the `/ws` observer channel.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
