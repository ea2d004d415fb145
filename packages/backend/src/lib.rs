pub mod config;
pub mod factory;
pub mod library;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod workers;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::library::Library;
use crate::state::AppState;

/// Loads the library named by the environment. A broken data dir is logged
/// and served as an empty library.
pub fn load_library(config: &Config) -> Library {
    match Library::load_dir(&config.data_dir) {
        Ok(library) => library,
        Err(err) => {
            tracing::error!(error = %err, dir = %config.data_dir.display(), "failed to load library");
            Library::default()
        }
    }
}

pub async fn create_app() -> axum::Router {
    let config = Config::from_env();
    let library = load_library(&config);
    build_app(AppState::from_env(config, library))
}

pub fn build_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
