use std::ops::Range;

use crate::block::{BlockError, BlockType, ValBlock, VarBlock};
use crate::symbols::{self, NAMED_ARG_SEPARATOR, VAR_PREFIX};

/// The value side of a named argument.
#[derive(Debug, Clone, PartialEq)]
pub enum NamedArgValue {
    Variable(VarBlock),
    Value(ValBlock),
}

/// A `name=value` function argument, where value is a `$variable` or a
/// quoted literal.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgBlock {
    pub content: String,
    pub name: String,
    /// `None` when the separator is missing or the value has no `$`/quote prefix.
    pub value: Option<NamedArgValue>,
    pub span: Range<usize>,
}

impl NamedArgBlock {
    pub fn new(content: impl Into<String>, span: Range<usize>) -> Self {
        let content = content.into();
        let (name, value) = match content.split_once(NAMED_ARG_SEPARATOR) {
            Some((name, raw_value)) => {
                let value_start = span.start + name.len() + NAMED_ARG_SEPARATOR.len_utf8();
                let value_span = value_start..value_start + raw_value.len();
                let value = match raw_value.chars().next() {
                    Some(VAR_PREFIX) => Some(NamedArgValue::Variable(VarBlock::new(raw_value, value_span))),
                    Some(c) if symbols::is_quote(c) => {
                        Some(NamedArgValue::Value(ValBlock::parse(raw_value, value_span)))
                    }
                    _ => None,
                };
                (name.to_string(), value)
            }
            None => (content.clone(), None),
        };
        NamedArgBlock {
            content,
            name,
            value,
            span,
        }
    }

    pub fn validate(&self) -> Result<(), BlockError> {
        let Some((_, raw_value)) = self.content.split_once(NAMED_ARG_SEPARATOR) else {
            return Err(self.error(format!(
                "A function named argument must contain a name and value separated by a '{}' character.",
                NAMED_ARG_SEPARATOR
            )));
        };
        if self.name.is_empty() {
            return Err(self.error("A named argument must have a name".to_string()));
        }
        if !self.name.chars().all(symbols::is_name_char) {
            return Err(self.error(format!(
                "The argument name '{}' contains invalid characters. \
                 Only alphanumeric chars and underscore are allowed.",
                self.name
            )));
        }
        let inner = match &self.value {
            Some(NamedArgValue::Variable(var)) => var.validate(),
            Some(NamedArgValue::Value(val)) => val.validate(),
            None if raw_value.is_empty() => {
                return Err(self.error(format!("A named argument must have a value: '{}'", self.content)));
            }
            None => {
                return Err(self.error(format!(
                    "Named argument values need to be prefixed with a quote or {}.",
                    VAR_PREFIX
                )));
            }
        };
        inner.map_err(|err| {
            BlockError::new(
                BlockType::NamedArg,
                format!(
                    "There was an issue with the named argument value for '{}': {}",
                    self.name, err.message
                ),
                err.span,
            )
        })
    }

    fn error(&self, message: String) -> BlockError {
        BlockError::new(BlockType::NamedArg, message, self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_value() {
        let arg = NamedArgBlock::new("city='Seattle'", 10..24);
        assert_eq!(arg.name, "city");
        match &arg.value {
            Some(NamedArgValue::Value(val)) => {
                assert_eq!(val.value, "Seattle");
                assert_eq!(val.span, 15..24);
            }
            other => panic!("expected value, got {:?}", other),
        }
        assert!(arg.validate().is_ok());
    }

    #[test]
    fn parses_variable_value() {
        let arg = NamedArgBlock::new("input=$city", 0..11);
        match &arg.value {
            Some(NamedArgValue::Variable(var)) => assert_eq!(var.name, "city"),
            other => panic!("expected variable, got {:?}", other),
        }
        assert!(arg.validate().is_ok());
    }

    #[test]
    fn value_may_contain_separator() {
        let arg = NamedArgBlock::new("eq='a=b'", 0..8);
        assert_eq!(arg.name, "eq");
        assert!(matches!(&arg.value, Some(NamedArgValue::Value(v)) if v.value == "a=b"));
    }

    #[test]
    fn rejects_unprefixed_value() {
        let err = NamedArgBlock::new("city=Seattle", 0..12).validate().unwrap_err();
        assert!(err.message.contains("prefixed with a quote"));
    }

    #[test]
    fn rejects_missing_parts() {
        assert!(NamedArgBlock::new("=''", 0..3).validate().is_err());
        assert!(NamedArgBlock::new("city=", 0..5).validate().is_err());
        assert!(NamedArgBlock::new("a-b='x'", 0..7).validate().is_err());
    }

    #[test]
    fn reports_inner_value_errors() {
        let err = NamedArgBlock::new("city='Seattle", 0..13).validate().unwrap_err();
        assert!(err.message.contains("named argument value for 'city'"));
    }
}
