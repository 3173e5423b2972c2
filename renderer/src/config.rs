use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::factory::SEMANTIC_KERNEL_TEMPLATE_FORMAT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TOML prompt config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON prompt config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt config is empty")]
    Empty,

    #[error("input variable '{0}' is declared more than once")]
    DuplicateInputVariable(String),

    #[error("unsupported prompt config extension for {0} (expected .toml or .json)")]
    UnsupportedExtension(PathBuf),
}

/// A variable a template expects as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputVariable {
    pub name: String,
    pub description: String,
    /// Used when the caller does not supply the argument.
    pub default: Option<String>,
    pub is_required: bool,
    /// Render this variable without HTML encoding.
    pub allow_unsafe_content: bool,
}

impl Default for InputVariable {
    fn default() -> Self {
        InputVariable {
            name: String::new(),
            description: String::new(),
            default: None,
            is_required: true,
            allow_unsafe_content: false,
        }
    }
}

impl InputVariable {
    pub fn new(name: impl Into<String>) -> Self {
        InputVariable {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_allow_unsafe_content(mut self, allow: bool) -> Self {
        self.allow_unsafe_content = allow;
        self
    }
}

/// Everything needed to build a prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplateConfig {
    pub name: String,
    pub description: String,
    pub template: String,
    pub template_format: String,
    pub input_variables: Vec<InputVariable>,
    /// Render every variable and function result without HTML encoding.
    pub allow_unsafe_content: bool,
}

impl Default for PromptTemplateConfig {
    fn default() -> Self {
        PromptTemplateConfig {
            name: String::new(),
            description: String::new(),
            template: String::new(),
            template_format: SEMANTIC_KERNEL_TEMPLATE_FORMAT.to_string(),
            input_variables: Vec::new(),
            allow_unsafe_content: false,
        }
    }
}

impl PromptTemplateConfig {
    pub fn new(template: impl Into<String>) -> Self {
        PromptTemplateConfig {
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let config: PromptTemplateConfig = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let config: PromptTemplateConfig = serde_json::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    /// Load a `.toml` or `.json` prompt config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parse: fn(&str) -> Result<Self, ConfigError> = match extension.as_deref() {
            Some("toml") => Self::from_toml_str,
            Some("json") => Self::from_json_str,
            _ => return Err(ConfigError::UnsupportedExtension(path.to_path_buf())),
        };
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse(&source)
    }

    /// Declare an input variable. Names are unique, ignoring case.
    pub fn add_input_variable(&mut self, variable: InputVariable) -> Result<(), ConfigError> {
        if self.input_variable(&variable.name).is_some() {
            return Err(ConfigError::DuplicateInputVariable(variable.name));
        }
        self.input_variables.push(variable);
        Ok(())
    }

    pub fn with_input_variable(mut self, variable: InputVariable) -> Result<Self, ConfigError> {
        self.add_input_variable(variable)?;
        Ok(self)
    }

    pub fn input_variable(&self, name: &str) -> Option<&InputVariable> {
        self.input_variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    fn check(&self) -> Result<(), ConfigError> {
        for (i, variable) in self.input_variables.iter().enumerate() {
            let duplicate = self.input_variables[..i]
                .iter()
                .any(|v| v.name.eq_ignore_ascii_case(&variable.name));
            if duplicate {
                return Err(ConfigError::DuplicateInputVariable(variable.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn toml_config_with_defaults() {
        let config = PromptTemplateConfig::from_toml_str(
            r#"
            name = "greet"
            template = "Hello {{$name}}"

            [[input_variables]]
            name = "name"
            default = "World"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.template_format, "semantic-kernel");
        assert!(!config.allow_unsafe_content);
        let variable = config.input_variable("NAME").expect("declared");
        assert_eq!(variable.default.as_deref(), Some("World"));
        assert!(variable.is_required);
    }

    #[test]
    fn json_config() {
        let config = PromptTemplateConfig::from_json_str(
            r#"{"template": "{{$x}}", "allow_unsafe_content": true,
                "input_variables": [{"name": "x", "allow_unsafe_content": true}]}"#,
        )
        .expect("valid config");
        assert!(config.allow_unsafe_content);
        assert!(config.input_variables[0].allow_unsafe_content);
    }

    #[test]
    fn rejects_duplicate_input_variables() {
        let err = PromptTemplateConfig::from_toml_str(
            r#"
            template = ""
            [[input_variables]]
            name = "a"
            [[input_variables]]
            name = "A"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateInputVariable(name) if name == "A"));

        let mut config = PromptTemplateConfig::new("x");
        config.add_input_variable(InputVariable::new("v")).expect("first");
        assert!(config.add_input_variable(InputVariable::new("V")).is_err());
    }

    #[test]
    fn rejects_empty_documents() {
        assert!(matches!(PromptTemplateConfig::from_toml_str("  \n"), Err(ConfigError::Empty)));
        assert!(matches!(PromptTemplateConfig::from_json_str(""), Err(ConfigError::Empty)));
    }

    #[test]
    fn loads_by_extension() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        write!(file, r#"{{"template": "hi"}}"#).expect("write");

        let config = PromptTemplateConfig::from_file(file.path()).expect("loads");
        assert_eq!(config.template, "hi");

        let err = PromptTemplateConfig::from_file("prompt.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedExtension(_)));
    }
}
