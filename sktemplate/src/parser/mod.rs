mod code;
pub mod error;
mod template;
pub mod validate;

pub use code::{CodeTokens, tokenize_code};
pub use error::ParseError;
pub use template::tokenize;

use crate::ParsedTemplate;
use crate::block::Block;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            source: source.into(),
            file_id,
        }
    }

    /// Split the source into blocks without checking their syntax.
    pub fn tokenize(&self) -> Vec<Block> {
        tokenize(&self.source)
    }

    /// Tokenize and validate the source. Fails with every syntax error found.
    pub fn parse(&self) -> Result<ParsedTemplate, Vec<ParseError>> {
        let blocks = self.tokenize();
        let report = validate::validate_blocks(&blocks, self.file_id);
        if !report.errors.is_empty() {
            return Err(report.errors);
        }
        Ok(ParsedTemplate {
            blocks,
            warnings: report.warnings,
            source_id: self.file_id,
        })
    }
}
