//! Error types

use crate::binary::read::ReadEof;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    MissingValue,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Error returned from glyph substitution functions
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SubstError {
    /// A table or subtable could not be read
    MalformedTable(ParseError),
    /// A lookup type or subtable format that this engine does not know
    UnsupportedSubtableType(u16),
    /// Contextual lookups nested deeper than `SUBST_RECURSION_LIMIT`
    RecursionLimitExceeded,
}

impl From<ParseError> for SubstError {
    fn from(error: ParseError) -> Self {
        SubstError::MalformedTable(error)
    }
}

impl From<ReadEof> for SubstError {
    fn from(_error: ReadEof) -> Self {
        SubstError::MalformedTable(ParseError::BadEof)
    }
}

impl From<std::num::TryFromIntError> for SubstError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        SubstError::MalformedTable(ParseError::BadValue)
    }
}

impl fmt::Display for SubstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstError::MalformedTable(err) => write!(f, "malformed table: {}", err),
            SubstError::UnsupportedSubtableType(kind) => {
                write!(f, "unsupported subtable type {}", kind)
            }
            SubstError::RecursionLimitExceeded => write!(f, "lookup recursion limit exceeded"),
        }
    }
}

impl std::error::Error for SubstError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubstError::MalformedTable(err) => Some(err),
            _ => None,
        }
    }
}
