//! sgc-client library
//!
//! Client core for the style-recommendation app: capture slots and image
//! preparation, the analysis pipeline, status resolution, the preview cache,
//! phone verification and the smaller backend-backed services. The binary in
//! `main.rs` is a thin command-line driver over [`AppSession`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod types;
pub mod utils;

pub use crate::config::{CliOverrides, ClientConfig};
pub use crate::error::AnalysisError;
pub use crate::session::AppSession;
pub use crate::types::BackendError;
