//! Error taxonomy. Everything construction-related fails fast, so a
//! successfully built composite never re-checks its own consistency.

use crate::unit::RuleKind;

/// All errors raised by the conversion engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single rule specification is malformed: bad token or namespace
    /// syntax, or a missing conversion with no default to fall back on.
    #[error("failed to create {kind} converter: {reason}")]
    InvalidRule { kind: RuleKind, reason: String },

    /// The composite's own configuration is malformed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The rule set has colliding identities: duplicate path, duplicate
    /// class or duplicate proto.
    #[error("inconsistent converters: {0}")]
    InconsistentRules(String),

    /// A rule's restore rejected its payload.
    #[error("cannot restore {token}: {reason}")]
    Restore { token: String, reason: String },

    /// Text-boundary failure: malformed input text, or a value that is not
    /// representable as JSON surviving all the way to serialization.
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Codec(err.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_rule(kind: RuleKind, reason: impl Into<String>) -> Error {
        Error::InvalidRule {
            kind,
            reason: reason.into(),
        }
    }

    /// Helper for rule authors writing restore closures.
    pub fn restore(token: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::Restore {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
