pub mod dirs;
pub mod handlers;
pub mod server;
pub mod store;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    /// Base URL for issued links. When unset, handlers derive it from the
    /// request's x-forwarded-proto / Host headers.
    pub public_url: Option<String>,
}

pub use server::{resolve_data_dir, router, run, ServerConfig};
