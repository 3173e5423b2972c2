pub mod block;
pub mod parser;
pub mod symbols;

pub use block::{Block, BlockError, BlockType};

use crate::parser::ParseError;

/// A tokenized and validated prompt template.
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    /// Top-level blocks in source order (Text, Variable or Code).
    pub blocks: Vec<Block>,
    /// Non-fatal diagnostics found while validating.
    pub warnings: Vec<ParseError>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl ParsedTemplate {
    /// Names of every variable the template reads, in first-seen order.
    ///
    /// Covers top-level `{{$name}}` blocks as well as variables passed to
    /// functions, positionally or as named argument values.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Variable(var) => add_unique(&mut names, &var.name),
                Block::Code(code) => {
                    for token in &code.tokens {
                        if let Some(var) = token.variable() {
                            add_unique(&mut names, &var.name);
                        }
                    }
                }
                _ => {}
            }
        }
        names
    }
}

fn add_unique<'a>(names: &mut Vec<&'a str>, name: &'a str) {
    if name.is_empty() {
        return;
    }
    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name);
    }
}
