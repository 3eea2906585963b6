//! Shared error and domain types for the mirai-api-http gateway crates.

pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{Destination, Destinations, MessageCategory, OutputFormat};
