//! HTTP server module
//!
//! This module handles HTTP request routing and handling:
//! - Axum router with the download, health, version and metrics endpoints
//! - The streaming download handler
//! - Content-Disposition construction for downloaded files
//! - CORS middleware

pub mod disposition;
pub mod download;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
