//! services/api/src/lib.rs
//!
//! The FAQ generation API service: adapters for the core ports, configuration,
//! and the HTTP/WebSocket surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
