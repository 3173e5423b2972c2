use std::ops::Range;
use std::sync::OnceLock;

use crate::block::{Block, BlockError, BlockType, FunctionIdBlock};

/// The contents of a `{{ ... }}` segment: either a single value/variable to
/// substitute, or a function call followed by its arguments.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub content: String,
    pub tokens: Vec<Block>,
    pub span: Range<usize>,
    /// First structural problem met by the code tokenizer, reported on validation.
    tokenizer_error: Option<BlockError>,
    /// Validation result, computed on first use.
    validated: OnceLock<Result<(), BlockError>>,
}

impl CodeBlock {
    pub fn new(content: impl Into<String>, tokens: Vec<Block>, span: Range<usize>) -> Self {
        CodeBlock {
            content: content.into(),
            tokens,
            span,
            tokenizer_error: None,
            validated: OnceLock::new(),
        }
    }

    pub fn with_tokenizer_error(mut self, error: Option<BlockError>) -> Self {
        self.tokenizer_error = error;
        self
    }

    /// The function to call, when the first token is a function id.
    pub fn function_id(&self) -> Option<&FunctionIdBlock> {
        match self.tokens.first() {
            Some(Block::FunctionId(id)) => Some(id),
            _ => None,
        }
    }

    /// Tokens after the function id.
    pub fn arguments(&self) -> &[Block] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), BlockError> {
        self.validated.get_or_init(|| self.check()).clone()
    }

    fn check(&self) -> Result<(), BlockError> {
        if let Some(err) = &self.tokenizer_error {
            return Err(err.clone());
        }

        let Some(first) = self.tokens.first() else {
            return Err(self.error("No tokens to render".to_string(), self.span.clone()));
        };

        for token in &self.tokens {
            token.validate()?;
        }

        if first.block_type() == BlockType::NamedArg {
            return Err(self.error(
                "Unexpected named argument found. Expected function name first.".to_string(),
                first.span().clone(),
            ));
        }

        if self.tokens.len() > 1 {
            if first.block_type() != BlockType::FunctionId {
                let second = &self.tokens[1];
                return Err(self.error(
                    format!(
                        "Unexpected second token found: '{}'. Only functions accept arguments",
                        second.content()
                    ),
                    second.span().clone(),
                ));
            }

            let first_arg = &self.tokens[1];
            if !matches!(
                first_arg.block_type(),
                BlockType::Value | BlockType::Variable | BlockType::NamedArg
            ) {
                return Err(self.error(
                    "The first arg of a function must be a quoted string, variable or named argument"
                        .to_string(),
                    first_arg.span().clone(),
                ));
            }

            for (index, token) in self.tokens.iter().enumerate().skip(2) {
                if token.block_type() != BlockType::NamedArg {
                    return Err(self.error(
                        format!(
                            "Functions only support named arguments after the first argument. \
                             Argument {} is not named.",
                            index
                        ),
                        token.span().clone(),
                    ));
                }
            }
        }

        Ok(())
    }

    fn error(&self, message: String, span: Range<usize>) -> BlockError {
        BlockError::new(BlockType::Code, message, span)
    }
}
