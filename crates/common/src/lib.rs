//! Common utilities and types shared across the conference focus crates.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for common data types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for tracing initialisation
pub mod observability;
