pub mod code;
pub mod function_id;
pub mod named_arg;

use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::symbols::{self, VAR_PREFIX};

pub use code::CodeBlock;
pub use function_id::FunctionIdBlock;
pub use named_arg::{NamedArgBlock, NamedArgValue};

/// Kind tag for a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Text,
    Variable,
    Value,
    FunctionId,
    NamedArg,
    Code,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Text => "text",
            BlockType::Variable => "variable",
            BlockType::Value => "value",
            BlockType::FunctionId => "function id",
            BlockType::NamedArg => "named argument",
            BlockType::Code => "code",
        };
        f.write_str(name)
    }
}

/// A syntax problem found in a single block.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct BlockError {
    pub message: String,
    pub span: Range<usize>,
    /// The kind of block that failed.
    pub block_type: BlockType,
}

impl BlockError {
    pub fn new(block_type: BlockType, message: impl Into<String>, span: Range<usize>) -> Self {
        BlockError {
            message: message.into(),
            span,
            block_type,
        }
    }
}

/// A parsed unit of a template.
///
/// Top-level blocks are Text, Variable or Code. Value, FunctionId and
/// NamedArg blocks only appear as tokens inside a [`CodeBlock`].
#[derive(Debug, Clone)]
pub enum Block {
    Text(TextBlock),
    Variable(VarBlock),
    Value(ValBlock),
    FunctionId(FunctionIdBlock),
    NamedArg(NamedArgBlock),
    Code(CodeBlock),
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Text(_) => BlockType::Text,
            Block::Variable(_) => BlockType::Variable,
            Block::Value(_) => BlockType::Value,
            Block::FunctionId(_) => BlockType::FunctionId,
            Block::NamedArg(_) => BlockType::NamedArg,
            Block::Code(_) => BlockType::Code,
        }
    }

    /// The trimmed source text that produced this block.
    pub fn content(&self) -> &str {
        match self {
            Block::Text(b) => &b.content,
            Block::Variable(b) => &b.content,
            Block::Value(b) => &b.content,
            Block::FunctionId(b) => &b.content,
            Block::NamedArg(b) => &b.content,
            Block::Code(b) => &b.content,
        }
    }

    /// Byte span of the block in the template source.
    pub fn span(&self) -> &Range<usize> {
        match self {
            Block::Text(b) => &b.span,
            Block::Variable(b) => &b.span,
            Block::Value(b) => &b.span,
            Block::FunctionId(b) => &b.span,
            Block::NamedArg(b) => &b.span,
            Block::Code(b) => &b.span,
        }
    }

    /// Check the block against the syntax rules of its type.
    pub fn validate(&self) -> Result<(), BlockError> {
        match self {
            Block::Text(_) => Ok(()),
            Block::Variable(b) => b.validate(),
            Block::Value(b) => b.validate(),
            Block::FunctionId(b) => b.validate(),
            Block::NamedArg(b) => b.validate(),
            Block::Code(b) => b.validate(),
        }
    }

    /// The variable this token reads, if any: a variable token itself or
    /// the `$var` value of a named argument.
    pub fn variable(&self) -> Option<&VarBlock> {
        match self {
            Block::Variable(var) => Some(var),
            Block::NamedArg(arg) => match &arg.value {
                Some(NamedArgValue::Variable(var)) => Some(var),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Literal template text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub content: String,
    pub span: Range<usize>,
}

impl TextBlock {
    pub fn new(content: impl Into<String>, span: Range<usize>) -> Self {
        TextBlock {
            content: content.into(),
            span,
        }
    }
}

/// A `$name` variable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBlock {
    pub content: String,
    /// The variable name without the `$` prefix.
    pub name: String,
    pub span: Range<usize>,
}

impl VarBlock {
    pub fn new(content: impl Into<String>, span: Range<usize>) -> Self {
        let content = content.into();
        let name = content
            .strip_prefix(VAR_PREFIX)
            .unwrap_or(&content)
            .to_string();
        VarBlock {
            content,
            name,
            span,
        }
    }

    /// An empty name (`$` alone) is tolerated and renders to an empty string.
    pub fn validate(&self) -> Result<(), BlockError> {
        if !self.content.starts_with(VAR_PREFIX) {
            return Err(self.error(format!(
                "A variable must start with the symbol {} and have a name",
                VAR_PREFIX
            )));
        }
        if !self.name.chars().all(symbols::is_name_char) {
            return Err(self.error(format!(
                "The variable name '{}' contains invalid characters. \
                 Only alphanumeric chars and underscore are allowed.",
                self.name
            )));
        }
        Ok(())
    }

    fn error(&self, message: String) -> BlockError {
        BlockError::new(BlockType::Variable, message, self.span.clone())
    }
}

/// A quoted literal such as `'hello'` or `"world"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValBlock {
    /// Raw quoted text as written in the source.
    pub content: String,
    /// The unquoted value with `\'`, `\"` and `\\` escapes resolved.
    pub value: String,
    /// The opening quote, if the content starts with one.
    pub quote: Option<char>,
    /// Whether the closing quote matching the opening one was found.
    pub terminated: bool,
    pub span: Range<usize>,
}

impl ValBlock {
    pub fn parse(content: impl Into<String>, span: Range<usize>) -> Self {
        let content = content.into();
        let mut chars = content.chars().peekable();
        let quote = chars.next().filter(|c| symbols::is_quote(*c));
        let mut value = String::new();
        let mut terminated = false;

        if let Some(quote) = quote {
            while let Some(c) = chars.next() {
                if c == symbols::ESCAPE_CHAR {
                    if let Some(&next) = chars.peek() {
                        if symbols::can_be_escaped(next) {
                            value.push(next);
                            chars.next();
                            continue;
                        }
                    }
                }
                if c == quote && chars.peek().is_none() {
                    terminated = true;
                    break;
                }
                value.push(c);
            }
        }

        ValBlock {
            content,
            value,
            quote,
            terminated,
            span,
        }
    }

    pub fn validate(&self) -> Result<(), BlockError> {
        let Some(quote) = self.quote else {
            return Err(self.error("A value must be wrapped in either single quotes or double quotes"));
        };
        if self.terminated {
            return Ok(());
        }
        match self.content.chars().last() {
            Some(last) if self.content.chars().count() > 1 && symbols::is_quote(last) && last != quote => Err(
                self.error("A value must be defined using either single quotes or double quotes, not both"),
            ),
            _ => Err(self.error("A value must have single quotes or double quotes on both sides")),
        }
    }

    fn error(&self, message: &str) -> BlockError {
        BlockError::new(BlockType::Value, message, self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_block_name_strips_prefix() {
        let var = VarBlock::new("$city_1", 0..7);
        assert_eq!(var.name, "city_1");
        assert!(var.validate().is_ok());
    }

    #[test]
    fn var_block_rejects_invalid_chars() {
        let err = VarBlock::new("$a-b", 0..4).validate().unwrap_err();
        assert!(err.message.contains("invalid characters"));
        assert_eq!(err.block_type, BlockType::Variable);
    }

    #[test]
    fn var_block_tolerates_empty_name() {
        let var = VarBlock::new("$", 0..1);
        assert_eq!(var.name, "");
        assert!(var.validate().is_ok());
    }

    #[test]
    fn val_block_resolves_escapes() {
        let val = ValBlock::parse(r#"'it\'s a \\ test'"#, 0..16);
        assert!(val.terminated);
        assert_eq!(val.value, r"it's a \ test");
    }

    #[test]
    fn val_block_keeps_other_quote_kind() {
        let val = ValBlock::parse(r#""say 'hi'""#, 0..10);
        assert!(val.validate().is_ok());
        assert_eq!(val.value, "say 'hi'");
    }

    #[test]
    fn val_block_unterminated_is_invalid() {
        let val = ValBlock::parse("'abc", 0..4);
        assert!(!val.terminated);
        let err = val.validate().unwrap_err();
        assert!(err.message.contains("both sides"));
    }

    #[test]
    fn val_block_mixed_quotes_is_invalid() {
        let err = ValBlock::parse(r#"'abc""#, 0..5).validate().unwrap_err();
        assert!(err.message.contains("not both"));
    }

    #[test]
    fn val_block_single_quote_char_is_invalid() {
        assert!(ValBlock::parse("'", 0..1).validate().is_err());
    }
}
