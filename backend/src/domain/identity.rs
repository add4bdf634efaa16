//! Acting user identity.
//!
//! Every record operation is scoped to the identity passed in by the caller;
//! nothing in the domain reads it from ambient session state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum accepted identity length in characters.
pub const IDENTITY_MAX: usize = 320;

/// Validation errors returned by [`Identity::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    Empty,
    SurroundingWhitespace,
    TooLong { max: usize },
}

impl fmt::Display for IdentityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identity must not be empty"),
            Self::SurroundingWhitespace => {
                write!(f, "identity must not have leading or trailing whitespace")
            }
            Self::TooLong { max } => write!(f, "identity must be at most {max} characters"),
        }
    }
}

impl std::error::Error for IdentityValidationError {}

/// Identity of the user acting on records, usually an e-mail address.
///
/// ## Invariants
/// - Non-empty with no surrounding whitespace.
/// - At most [`IDENTITY_MAX`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Validate and construct an [`Identity`].
    ///
    /// # Examples
    /// ```
    /// use records_backend::domain::Identity;
    ///
    /// let identity = Identity::new("ada@example.com").expect("valid identity");
    /// assert_eq!(identity.as_ref(), "ada@example.com");
    /// assert!(Identity::new("  ").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityValidationError> {
        Self::from_owned(value.into())
    }

    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn from_owned(value: String) -> Result<Self, IdentityValidationError> {
        if value.trim().is_empty() {
            return Err(IdentityValidationError::Empty);
        }
        if value.trim() != value {
            return Err(IdentityValidationError::SurroundingWhitespace);
        }
        if value.chars().count() > IDENTITY_MAX {
            return Err(IdentityValidationError::TooLong { max: IDENTITY_MAX });
        }
        Ok(Self(value))
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}
