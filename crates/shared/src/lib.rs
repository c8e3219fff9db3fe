//! Shared types, errors, and configuration for Tallyflow.
//!
//! This crate provides common types used across all other crates:
//! - Currency codes and typed IDs
//! - List limits for "last N" endpoints
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
