//! Codec error type.

use thiserror::Error;

/// Failure to turn a text frame into an [`Envelope`](crate::Envelope) or back.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not JSON, not an object, or is missing required fields.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = CodecError::Malformed(json_err);
        assert!(err.to_string().starts_with("malformed envelope"));
    }

    #[test]
    fn source_is_preserved() {
        let json_err = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let err = CodecError::Malformed(json_err);
        assert!(std::error::Error::source(&err).is_some());
    }
}
