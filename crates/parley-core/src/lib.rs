//! # parley-core
//!
//! Core types, traits, configuration, and error handling for Parley.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod model;
pub mod traits;

pub use config::shellexpand;
