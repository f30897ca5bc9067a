pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod forms;
pub mod graph;
pub mod models;
pub mod pagination;
pub mod publish;
pub mod repo;
pub mod routes;
pub mod security;
pub mod storage; // FS or S3 image blobs
pub mod views;

// Re-export commonly used items for tests / the binary
pub use auth::{RequestContext, SessionKeys};
pub use cache::FragmentCache;
pub use config::Settings;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
