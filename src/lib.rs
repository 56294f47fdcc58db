pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod models;
pub mod provision;
pub mod registry;
pub mod resolver;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<resolver::ResolutionEngine>,
    pub cache: Arc<cache::TtlCache>,
    pub directory: Arc<directory::ServerDirectory>,
}
