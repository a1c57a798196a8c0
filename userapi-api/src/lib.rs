//! # user-api Server Library
//!
//! Hosts the `user-api` service: declares its resources, provisions them at
//! startup and serves the runtime's health and discovery endpoints.
//!
//! ## Modules
//!
//! - `app`: Application state, registry and router builders
//! - `bootstrap`: Resource declarations for user-api
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
