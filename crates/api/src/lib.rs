//! HTTP API layer for the Iftar photo competition.
//!
//! This crate provides the JSON API:
//!
//! - **Endpoints**: auth, posts and votes, winners, stats, health
//! - **Extractors**: Session-authenticated users
//! - **Middleware**: Session resolution from cookie or bearer token
//! - **Response**: The `{ "data": ... }` envelope
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
