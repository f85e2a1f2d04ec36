//! Anonymization run orchestration: per-item round loop and batch fan-out.

pub mod batch;
pub mod config;
mod error;
pub mod orchestrator;

pub use batch::{BatchCoordinator, BatchReport};
pub use config::RunConfig;
pub use error::EngineError;
pub use orchestrator::{ItemReport, ItemStatus, RoundOrchestrator};

#[cfg(feature = "openai")]
pub use batch::run_all;

#[cfg(test)]
pub(crate) mod testing;
