use anonplay_ai::AiError;
use anonplay_core::ItemId;
use thiserror::Error;

/// Run preconditions. Per-item failures never surface here; they are
/// reported as an item status instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("item {index} ({id}) has empty text")]
    EmptyText { index: usize, id: ItemId },

    #[error("failed to build completion client: {0}")]
    Client(#[from] AiError),
}
