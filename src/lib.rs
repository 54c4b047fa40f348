pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod docs;
pub mod errors;
pub mod github;
pub mod models;
pub mod routes;
pub mod store;
pub mod webhook;

// Re-export commonly used items for tests
pub use app::{create_app, router, AppState};
