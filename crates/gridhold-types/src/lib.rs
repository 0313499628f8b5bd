//! Shared wire types and grid math for the gridhold server.
//!
//! Kept free of axum and rusqlite so both the database layer and the HTTP
//! layer can depend on it.

pub mod api;
pub mod events;
pub mod grid;
pub mod models;
