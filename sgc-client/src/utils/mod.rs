//! Utility modules for the SGC client

pub mod phone;

pub use phone::{clean_phone, with_plus};
