//! # SGC Common Library
//!
//! Shared code for the SGC client crates:
//! - Error type
//! - Bootstrap configuration and data folder resolution
//! - Local store initialization
//! - Telemetry event bus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
