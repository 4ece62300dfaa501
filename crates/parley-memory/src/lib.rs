//! # parley-memory
//!
//! SQLite persistence for bots, contacts, AI contexts and model configs.

pub mod store;

pub use store::Store;
