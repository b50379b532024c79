//! Parsers producing command and document trees

use crate::{Error, Result};
use super::ast::LanguageObject;

/// Turns source text into a tree. Parse failures never reach the generator.
pub trait CommandParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<LanguageObject>;
}

/// Reads trees serialized as JSON, tagged by a `node` field
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTreeParser;

impl CommandParser for JsonTreeParser {
    fn parse(&self, text: &str) -> Result<LanguageObject> {
        if text.trim().is_empty() {
            return Err(Error::Parse("empty input".into()));
        }
        serde_json::from_str(text).map_err(|e| {
            Error::Parse(format!("line {}, column {}: {}", e.line(), e.column(), e))
        })
    }
}
