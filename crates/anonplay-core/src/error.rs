use thiserror::Error;

use crate::attribute::UnknownAttributeError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialisation error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttributeError),
}
