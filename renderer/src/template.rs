use std::sync::OnceLock;

use async_trait::async_trait;
use sktemplate::Block;
use sktemplate::parser::{ParseError, Parser};
use tracing::debug;

use crate::arguments::KernelArguments;
use crate::config::{InputVariable, PromptTemplateConfig};
use crate::error::RenderError;
use crate::factory::PromptTemplate;
use crate::renderer::{ContentSafety, RenderContext, render_blocks};

#[derive(Debug)]
struct ParsedState {
    blocks: Vec<Block>,
    /// Declared variables followed by those discovered in the template.
    input_variables: Vec<InputVariable>,
    warnings: Vec<ParseError>,
}

/// A prompt template in the `semantic-kernel` format.
///
/// The template text is parsed once, on first use. Syntax errors are
/// remembered and returned by every later render.
#[derive(Debug)]
pub struct KernelPromptTemplate {
    config: PromptTemplateConfig,
    allow_unsafe_content: bool,
    source_id: usize,
    parsed: OnceLock<Result<ParsedState, Vec<ParseError>>>,
}

impl KernelPromptTemplate {
    pub fn new(config: PromptTemplateConfig) -> Self {
        KernelPromptTemplate {
            config,
            allow_unsafe_content: false,
            source_id: 0,
            parsed: OnceLock::new(),
        }
    }

    /// Trust every variable and function result, in addition to whatever
    /// the config allows.
    pub fn with_allow_unsafe_content(mut self, allow: bool) -> Self {
        self.allow_unsafe_content = allow;
        self
    }

    /// File id attached to diagnostics.
    pub fn with_source_id(mut self, source_id: usize) -> Self {
        self.source_id = source_id;
        self.parsed = OnceLock::new();
        self
    }

    pub fn config(&self) -> &PromptTemplateConfig {
        &self.config
    }

    pub fn blocks(&self) -> Result<&[Block], &[ParseError]> {
        self.state().map(|s| s.blocks.as_slice())
    }

    pub fn input_variables(&self) -> Result<&[InputVariable], &[ParseError]> {
        self.state().map(|s| s.input_variables.as_slice())
    }

    /// Non-fatal diagnostics, such as empty variable names.
    pub fn warnings(&self) -> &[ParseError] {
        match self.state() {
            Ok(state) => state.warnings.as_slice(),
            Err(_) => &[],
        }
    }

    pub async fn render(
        &self,
        ctx: &RenderContext<'_>,
        args: &KernelArguments,
    ) -> Result<String, RenderError> {
        let state = self
            .state()
            .map_err(|errors| RenderError::Syntax(errors.to_vec()))?;

        let args = self.with_defaults(args);
        let safety = ContentSafety {
            allow_unsafe_content: self.allow_unsafe_content || self.config.allow_unsafe_content,
            trusted_variables: self
                .config
                .input_variables
                .iter()
                .filter(|v| v.allow_unsafe_content)
                .map(|v| v.name.clone())
                .collect(),
        };
        render_blocks(&state.blocks, ctx, &args, &safety).await
    }

    fn state(&self) -> Result<&ParsedState, &[ParseError]> {
        self.parsed
            .get_or_init(|| self.parse())
            .as_ref()
            .map_err(Vec::as_slice)
    }

    fn parse(&self) -> Result<ParsedState, Vec<ParseError>> {
        let parsed = Parser::new(self.config.template.as_str(), self.source_id).parse()?;

        let mut input_variables = self.config.input_variables.clone();
        for name in parsed.referenced_variables() {
            if !input_variables
                .iter()
                .any(|v| v.name.eq_ignore_ascii_case(name))
            {
                input_variables.push(InputVariable::new(name));
            }
        }
        debug!(
            blocks = parsed.blocks.len(),
            inputs = input_variables.len(),
            "parsed prompt template"
        );

        Ok(ParsedState {
            blocks: parsed.blocks,
            input_variables,
            warnings: parsed.warnings,
        })
    }

    /// Caller arguments plus declared defaults for anything missing.
    fn with_defaults(&self, args: &KernelArguments) -> KernelArguments {
        let mut args = args.clone();
        for variable in &self.config.input_variables {
            if let Some(default) = variable.default.as_deref().filter(|d| !d.is_empty())
                && !args.contains(&variable.name)
            {
                args.insert(variable.name.as_str(), default);
            }
        }
        args
    }
}

#[async_trait]
impl PromptTemplate for KernelPromptTemplate {
    async fn render(
        &self,
        ctx: &RenderContext<'_>,
        args: &KernelArguments,
    ) -> Result<String, RenderError> {
        KernelPromptTemplate::render(self, ctx, args).await
    }
}
