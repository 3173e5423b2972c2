use tracing::{debug, warn};

use crate::block::{Block, BlockError, BlockType, VarBlock};
use crate::parser::error::ParseError;

/// Errors and warnings collected while validating a block list.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ParseError>,
    pub warnings: Vec<ParseError>,
}

/// Check one block, returning the first rule it breaks.
pub fn validate_block(block: &Block) -> Result<(), BlockError> {
    block.validate()
}

/// Validate every block of a template, collecting all errors rather than
/// stopping at the first.
pub fn validate_blocks(blocks: &[Block], file_id: usize) -> ValidationReport {
    let mut report = ValidationReport::default();

    for block in blocks {
        if let Err(err) = validate_block(block) {
            debug!(content = block.content(), error = %err, "invalid template block");
            let mut diagnostic = ParseError::from_block_error(&err, file_id);
            if let Some(hint) = hint(err.block_type) {
                diagnostic = diagnostic.with_note(hint);
            }
            report.errors.push(diagnostic);
            continue;
        }

        for var in variables(block) {
            if var.name.is_empty() {
                warn!(span = ?var.span, "variable without a name");
                report.warnings.push(
                    ParseError::warning("variable has no name and renders as an empty string", var.span.clone(), file_id)
                        .with_note("a variable is '$' followed by letters, numbers or underscores"),
                );
            }
        }
    }

    report
}

fn variables(block: &Block) -> Vec<&VarBlock> {
    match block {
        Block::Code(code) => code.tokens.iter().filter_map(Block::variable).collect(),
        other => other.variable().into_iter().collect(),
    }
}

fn hint(block_type: BlockType) -> Option<&'static str> {
    match block_type {
        BlockType::Text => None,
        BlockType::Variable => Some("a variable is '$' followed by letters, numbers or underscores"),
        BlockType::Value => Some("a value is text wrapped in matching single or double quotes"),
        BlockType::FunctionId => Some(
            "a function is written 'plugin.function' or 'function', using letters, numbers and underscores",
        ),
        BlockType::NamedArg => {
            Some("a named argument is name=value, where value is a $variable or a quoted value")
        }
        BlockType::Code => Some(
            "a function takes at most one positional argument, right after its name; the rest must be named",
        ),
    }
}
