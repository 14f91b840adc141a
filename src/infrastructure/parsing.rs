//! Markup heuristics for monograph index pages
//!
//! Pure text extraction, no network access and no document tree.

pub mod config;
pub mod monograph_page_parser;
pub mod revision_date;

// Re-export public types
pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use config::{CandidateScoring, MonographParsingConfig};
pub use monograph_page_parser::{MonographPageParser, ScoredCandidate};
pub use revision_date::parse_revision_date;
