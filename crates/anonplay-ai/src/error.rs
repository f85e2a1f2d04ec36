use std::time::Duration;

use anonplay_core::UnknownAttributeError;
use thiserror::Error;

/// Failures of a completion call or of decoding its output.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API credential configured")]
    Auth,

    #[error("{0} is empty")]
    Input(&'static str),

    #[error("provider returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("rewrite response has no '#' delimiter")]
    Format,

    #[error("rewrite is empty after parsing")]
    EmptyResult,

    #[error("call exceeded {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    UnknownAttribute(#[from] UnknownAttributeError),
}

impl AiError {
    pub(crate) fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: err.to_string(),
        }
    }

    /// Programming or data defects that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownAttribute(_))
    }

    /// Failures likely to succeed on an identical retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::EmptyResponse => true,
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_attribute_is_fatal() {
        assert!(AiError::UnknownAttribute(UnknownAttributeError("x".into())).is_fatal());
        assert!(!AiError::Format.is_fatal());
        assert!(!AiError::Auth.is_fatal());
        assert!(!AiError::decode("privacy", "bad").is_fatal());
    }

    #[test]
    fn transient_classification() {
        assert!(AiError::Timeout(Duration::from_secs(10)).is_transient());
        assert!(AiError::Remote { status: 503, body: String::new() }.is_transient());
        assert!(AiError::Remote { status: 429, body: String::new() }.is_transient());
        assert!(!AiError::Remote { status: 400, body: String::new() }.is_transient());
        assert!(!AiError::Auth.is_transient());
    }
}
