//! Codec errors for frame and message processing
//!
//! Two layers fail independently: [`FrameError`] covers the length-prefixed
//! framing of the byte stream and is fatal for the connection, while
//! [`MessageCodecError`] covers the JSON body of a single frame and only
//! affects that message.

use thiserror::Error;

/// Framing errors; the byte stream cannot be resynchronised after one
#[derive(Debug, Error)]
pub enum FrameError {
    /// Declared body length is negative
    #[error("Negative frame length {length} (kind code {code})")]
    NegativeLength { code: i32, length: i32 },

    /// Declared body length exceeds the configured frame limit
    #[error("Frame too large: {length} bytes exceeds maximum {max} (kind code {code})")]
    FrameTooLarge { code: i32, length: usize, max: usize },

    /// Body too large to express in the 32-bit length field
    #[error("Frame body of {size} bytes does not fit the length field")]
    BodyOverflow { size: usize },

    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn negative_length(code: i32, length: i32) -> Self {
        Self::NegativeLength { code, length }
    }

    pub fn frame_too_large(code: i32, length: usize, max: usize) -> Self {
        Self::FrameTooLarge { code, length, max }
    }
}

/// Per-message body errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MessageCodecError {
    /// Body is not valid JSON, the envelope is malformed, the payload does not
    /// fit its type, or the counts are inconsistent
    #[error("Broken message body: {reason}")]
    BrokenBody { reason: String },

    /// Envelope is well formed but names no known message type
    #[error("Strange message type '{type_name}'")]
    StrangeMessage { type_name: String },

    /// Outbound message could not be serialised
    #[error("Failed to encode {message_type}: {reason}")]
    Encode {
        message_type: String,
        reason: String,
    },
}

impl MessageCodecError {
    pub fn broken_body(reason: impl Into<String>) -> Self {
        Self::BrokenBody {
            reason: reason.into(),
        }
    }

    pub fn strange_message(type_name: impl Into<String>) -> Self {
        Self::StrangeMessage {
            type_name: type_name.into(),
        }
    }

    pub fn encode(message_type: impl ToString, reason: impl ToString) -> Self {
        Self::Encode {
            message_type: message_type.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the body was structurally unusable (as opposed to naming an
    /// unknown type)
    pub fn is_broken_body(&self) -> bool {
        matches!(self, Self::BrokenBody { .. })
    }
}

pub type FrameResult<T> = Result<T, FrameError>;
pub type MessageResult<T> = Result<T, MessageCodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = FrameError::frame_too_large(0, 2048, 1024);
        assert_eq!(
            err.to_string(),
            "Frame too large: 2048 bytes exceeds maximum 1024 (kind code 0)"
        );

        let err = MessageCodecError::strange_message("REQ_TELEPORT");
        assert_eq!(err.to_string(), "Strange message type 'REQ_TELEPORT'");
        assert!(!err.is_broken_body());
        assert!(MessageCodecError::broken_body("eof").is_broken_body());
    }
}
