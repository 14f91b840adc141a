//! # Domain Value Objects
//!
//! Immutable identifier types for catalog products. Both are opaque strings;
//! the newtypes keep the public identifier (DIN) and the source site's
//! internal code from being swapped by accident.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Public product identifier (Drug Identification Number, usually 8 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductIdentifier(String);

impl ProductIdentifier {
    /// Creates an identifier, trimming surrounding whitespace
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self(value.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductIdentifier {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Internal product code expected by the source site (DPD `DRUG_CODE`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCode(String);

impl SourceCode {
    /// Creates a source code; blank input yields `None`
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_trimmed() {
        let id = ProductIdentifier::new("  02242963 ");
        assert_eq!(id.as_str(), "02242963");
        assert!(!id.is_blank());
        assert!(ProductIdentifier::new("   ").is_blank());
    }

    #[test]
    fn blank_source_code_is_absent() {
        assert!(SourceCode::parse("").is_none());
        assert!(SourceCode::parse("  ").is_none());
        assert_eq!(SourceCode::parse(" 12345 ").map(|c| c.to_string()), Some("12345".to_string()));
    }

    #[test]
    fn identifier_serializes_as_plain_string() {
        let id = ProductIdentifier::new("00012345");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"00012345\"");
    }
}
