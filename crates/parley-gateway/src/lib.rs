//! # parley-gateway
//!
//! The orchestration engine: per-chat queues and history, slash commands,
//! response generation and single-flight image generation.

pub mod commands;
pub mod diffusion;
pub mod generator;
pub mod history;
pub mod router;

pub use commands::{Command, CommandDispatcher};
pub use diffusion::DiffusionQueue;
pub use generator::ResponseGenerator;
pub use history::HistoryBuffer;
pub use router::{Router, RouterDeps};
