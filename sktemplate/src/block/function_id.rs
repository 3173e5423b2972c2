use std::ops::Range;

use crate::block::{BlockError, BlockType};
use crate::symbols::{self, FUNCTION_SEPARATOR};

/// Identifies a function as `plugin.function` or just `function`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionIdBlock {
    pub content: String,
    /// Empty when the identifier has no dot: the function is looked up
    /// across all plugins.
    pub plugin_name: String,
    pub function_name: String,
    pub span: Range<usize>,
}

impl FunctionIdBlock {
    pub fn new(content: impl Into<String>, span: Range<usize>) -> Self {
        let content = content.into();
        let (plugin_name, function_name) = match content.split_once(FUNCTION_SEPARATOR) {
            Some((plugin, function)) => (plugin.to_string(), function.to_string()),
            None => (String::new(), content.clone()),
        };
        FunctionIdBlock {
            content,
            plugin_name,
            function_name,
            span,
        }
    }

    pub fn validate(&self) -> Result<(), BlockError> {
        if self.content.is_empty() {
            return Err(self.error("The function identifier is empty".to_string()));
        }
        if !self
            .content
            .chars()
            .all(|c| symbols::is_name_char(c) || c == FUNCTION_SEPARATOR)
        {
            return Err(self.error(format!(
                "The function identifier '{}' contains invalid characters. \
                 Only alphanumeric chars, underscore and a single '.' are allowed.",
                self.content
            )));
        }
        if self.content.matches(FUNCTION_SEPARATOR).count() > 1 {
            return Err(self.error(format!(
                "The function identifier '{}' can contain max one '.' char separating \
                 plugin name from function name",
                self.content
            )));
        }
        if self.function_name.is_empty() {
            return Err(self.error(format!(
                "The function identifier '{}' is missing the function name",
                self.content
            )));
        }
        if self.content.starts_with(FUNCTION_SEPARATOR) {
            return Err(self.error(format!(
                "The function identifier '{}' is missing the plugin name before '.'",
                self.content
            )));
        }
        Ok(())
    }

    /// `plugin.function`, or the bare function name for global lookups.
    pub fn qualified_name(&self) -> &str {
        &self.content
    }

    fn error(&self, message: String) -> BlockError {
        BlockError::new(BlockType::FunctionId, message, self.span.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plugin_and_function() {
        let id = FunctionIdBlock::new("menu.getSpecial", 0..15);
        assert_eq!(id.plugin_name, "menu");
        assert_eq!(id.function_name, "getSpecial");
        assert!(id.validate().is_ok());
    }

    #[test]
    fn bare_function_has_empty_plugin() {
        let id = FunctionIdBlock::new("time", 0..4);
        assert_eq!(id.plugin_name, "");
        assert_eq!(id.function_name, "time");
        assert!(id.validate().is_ok());
    }

    #[test]
    fn rejects_more_than_one_dot() {
        let err = FunctionIdBlock::new("a.b.c", 0..5).validate().unwrap_err();
        assert!(err.message.contains("max one '.'"));
    }

    #[test]
    fn rejects_invalid_chars() {
        assert!(FunctionIdBlock::new("menu-get", 0..8).validate().is_err());
        assert!(FunctionIdBlock::new("f(x)", 0..4).validate().is_err());
    }

    #[test]
    fn rejects_missing_names() {
        assert!(FunctionIdBlock::new("menu.", 0..5).validate().is_err());
        assert!(FunctionIdBlock::new(".get", 0..4).validate().is_err());
    }
}
