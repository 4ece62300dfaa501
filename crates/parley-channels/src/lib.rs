//! # parley-channels
//!
//! Messaging network connectors for Parley.

pub mod telegram;
pub mod utils;

pub use telegram::TelegramConnector;
