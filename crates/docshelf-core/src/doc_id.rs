use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted from a link. Minted identifiers are 21 characters.
pub const MAX_DOC_URL_LEN: usize = 128;

/// Globally unique identifier of a replicated document.
///
/// Format: 1 to 128 characters from the URL-safe alphabet `[A-Za-z0-9_-]`,
/// which is also the alphabet `nanoid` mints new identifiers from.
/// Example: "V1StGXR8_Z5jdHi6B-myT"
///
/// Identifiers appear bare in legacy links (`#<id>`), so anything that could
/// be mistaken for a key/value fragment (`=`, `&`) is rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocUrl(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocIdError {
    #[error("document identifier is empty")]
    Empty,
    #[error("document identifier is longer than {MAX_DOC_URL_LEN} characters")]
    TooLong,
    #[error("document identifier contains invalid character {0:?}")]
    InvalidChar(char),
}

impl DocUrl {
    pub fn new(value: impl Into<String>) -> Result<Self, DocIdError> {
        let value = value.into();
        validate_doc_url(&value)?;
        Ok(Self(value))
    }

    /// Mint a fresh identifier.
    pub fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Check `value` against the document identifier syntax.
pub fn validate_doc_url(value: &str) -> Result<(), DocIdError> {
    if value.is_empty() {
        return Err(DocIdError::Empty);
    }
    if value.len() > MAX_DOC_URL_LEN {
        return Err(DocIdError::TooLong);
    }
    match value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        Some(c) => Err(DocIdError::InvalidChar(c)),
        None => Ok(()),
    }
}

pub fn is_valid_doc_url(value: &str) -> bool {
    validate_doc_url(value).is_ok()
}

impl fmt::Display for DocUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for DocUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for DocUrl {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for DocUrl {
    type Err = DocIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DocUrl {
    type Error = DocIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocUrl> for String {
    fn from(value: DocUrl) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_alphanumeric_id() {
        let url = DocUrl::new("abc123xyz").expect("should be valid");
        assert_eq!(url.as_str(), "abc123xyz");
    }

    #[test]
    fn accepts_nanoid_alphabet() {
        assert!(is_valid_doc_url("V1StGXR8_Z5jdHi6B-myT"));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(DocUrl::new(""), Err(DocIdError::Empty));
    }

    #[test]
    fn rejects_key_value_fragment() {
        assert_eq!(
            DocUrl::new("docUrl=abc&docType=essay"),
            Err(DocIdError::InvalidChar('='))
        );
    }

    #[test]
    fn rejects_overlong_id() {
        let long = "a".repeat(MAX_DOC_URL_LEN + 1);
        assert_eq!(DocUrl::new(long), Err(DocIdError::TooLong));
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = DocUrl::generate();
        let b = DocUrl::generate();
        assert!(is_valid_doc_url(a.as_str()), "minted id {} is invalid", a);
        assert_ne!(a, b);
    }
}
