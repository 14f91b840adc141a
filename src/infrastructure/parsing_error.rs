//! Parsing error types for markup heuristics and extract tables
//!
//! Markup extraction itself never fails (a miss is an empty result); these
//! errors cover broken configuration and unreadable extract tables.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid pattern for {field}: {pattern} - {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String, field: String },

    #[error("No .txt/.csv member inside archive: {source_name}")]
    ArchiveMemberMissing { source_name: String },

    #[error("Archive read failed for {source_name}: {message}")]
    ArchiveReadFailed { source_name: String, message: String },

    #[error("Extract source for '{table}' unavailable: {message}")]
    SourceUnavailable { table: String, message: String },

    #[error("Malformed record in table '{table}' at line {line}: {message}")]
    MalformedRecord {
        table: String,
        line: u64,
        message: String,
    },

    #[error("Required field '{field}' missing from table '{table}'")]
    RequiredFieldMissing { field: String, table: String },
}

impl ParsingError {
    pub fn invalid_pattern(field: &str, pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            field: field.to_string(),
        }
    }

    pub fn source_unavailable(table: &str, message: impl ToString) -> Self {
        Self::SourceUnavailable {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_table() {
        let err = ParsingError::RequiredFieldMissing {
            field: "DRUG_CODE".into(),
            table: "drug".into(),
        };
        assert_eq!(err.to_string(), "Required field 'DRUG_CODE' missing from table 'drug'");
    }
}
