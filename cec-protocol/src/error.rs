//! Error types for the protocol layer.

/// Errors raised while compiling patterns or parsing protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An operator-supplied pattern failed to compile
    #[error("Invalid {name} pattern: {source}")]
    InvalidPattern {
        /// Configuration key of the offending pattern
        name: &'static str,
        #[source]
        source: regex::Error,
    },

    /// Not a single hex digit
    #[error("Invalid logical address: {0:?}")]
    InvalidLogicalAddress(String),

    /// Not four dotted hex nibbles
    #[error("Invalid physical address: {0:?}")]
    InvalidPhysicalAddress(String),

    #[error("Unknown remote button: {0:?}")]
    UnknownRemoteButton(String),
}

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtocolError::InvalidLogicalAddress("G".to_string()).to_string(),
            "Invalid logical address: \"G\""
        );
        assert_eq!(
            ProtocolError::InvalidPhysicalAddress("1.0".to_string()).to_string(),
            "Invalid physical address: \"1.0\""
        );
        assert_eq!(
            ProtocolError::UnknownRemoteButton("jump".to_string()).to_string(),
            "Unknown remote button: \"jump\""
        );
    }

    #[test]
    fn test_invalid_pattern_keeps_source() {
        let source = regex::Regex::new("(unclosed").unwrap_err();
        let error = ProtocolError::InvalidPattern {
            name: "powerOnRegex",
            source,
        };
        assert!(error.to_string().starts_with("Invalid powerOnRegex pattern:"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
