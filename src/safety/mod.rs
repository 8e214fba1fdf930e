//! Read-only query classification.
//!
//! A conservative, syntactic filter: comments are stripped, the body must
//! open with `SELECT` or `WITH`, and no write/DDL/DCL keyword may appear as a
//! whole word anywhere in the text. String literals are not special-cased, so
//! `SELECT 'drop'` is rejected too.

mod filter;

pub use filter::{classify, is_read_only, normalize, FORBIDDEN_KEYWORDS};

use std::fmt;

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing left after stripping comments and whitespace.
    Empty,
    /// The statement does not open with SELECT or WITH.
    LeadingKeyword(String),
    /// A forbidden keyword occurs as a whole word.
    ForbiddenKeyword(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty statement"),
            Self::LeadingKeyword(word) => {
                write!(f, "statement starts with '{word}', expected SELECT or WITH")
            }
            Self::ForbiddenKeyword(keyword) => write!(f, "contains forbidden keyword {keyword}"),
        }
    }
}

/// Result of classifying a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    ReadOnly,
    Rejected(Rejection),
}

impl Classification {
    /// Returns true if the query may be sent to a backend.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    /// Returns the rejection reason, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::ReadOnly => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}
