//! Error types for topic resolution and metric materialization.

/// Errors that can occur while building registries or resolving metrics.
///
/// Unmatched or under-length topics are not errors; they are ordinary traffic
/// and surface as `None` from the parser and the registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A descriptor violates one of its invariants
    #[error("Invalid descriptor for {topic}: {reason}")]
    InvalidDescriptor { topic: String, reason: String },

    /// Two descriptors resolve to the same registry key
    #[error("Duplicate topic descriptor: {0}")]
    DuplicateTopic(String),

    /// No enumerated type is known under this name
    #[error("Unknown enum type: {0}")]
    UnknownEnum(String),

    /// Code is not part of the enumerated type's declared set
    #[error("Unknown code {code} for enum {enum_name}")]
    UnknownEnumCode { enum_name: &'static str, code: i64 },

    /// Token is not one of the three AC phases
    #[error("Invalid phase: {0}. Expected L1, L2, or L3.")]
    InvalidPhase(String),

    /// A template uses a phase placeholder but the topic carries no phase
    #[error("Template '{template}' requires a phase but the topic has none")]
    MissingPhase { template: String },

    /// Payload could not be decoded
    #[error("Payload error: {0}")]
    Payload(String),

    /// Value rejected by a writable metric
    #[error("Invalid value for {metric}: {reason}")]
    InvalidValue { metric: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownEnumCode {
            enum_name: "EssMode",
            code: 9,
        };
        assert_eq!(err.to_string(), "Unknown code 9 for enum EssMode");

        let err = Error::InvalidPhase("L4".to_string());
        assert!(err.to_string().contains("L4"));
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
