use futures::future::try_join_all;
use sktemplate::block::{Block, CodeBlock, FunctionIdBlock, NamedArgValue, VarBlock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::arguments::KernelArguments;
use crate::encoding::html_encode;
use crate::error::RenderError;
use crate::function::{FunctionMetadata, FunctionRegistry};
use crate::value::Value;

/// How function calls within one template are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// One call at a time, in source order.
    #[default]
    Sequential,
    /// All blocks polled at once; output is still assembled in source order.
    Concurrent,
}

/// What a render needs besides the template and its arguments.
#[derive(Clone)]
pub struct RenderContext<'a> {
    pub registry: &'a dyn FunctionRegistry,
    pub cancel: CancellationToken,
    pub mode: EvaluationMode,
}

impl<'a> RenderContext<'a> {
    pub fn new(registry: &'a dyn FunctionRegistry) -> Self {
        RenderContext {
            registry,
            cancel: CancellationToken::new(),
            mode: EvaluationMode::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Which rendered values skip HTML encoding.
#[derive(Debug, Clone, Default)]
pub struct ContentSafety {
    /// Trust every variable and function result.
    pub allow_unsafe_content: bool,
    /// Variables trusted individually, compared ignoring case.
    pub trusted_variables: Vec<String>,
}

impl ContentSafety {
    fn should_encode(&self, block: &Block) -> bool {
        if self.allow_unsafe_content {
            return false;
        }
        match block {
            Block::Text(_) => false,
            Block::Variable(var) => !self
                .trusted_variables
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&var.name)),
            _ => true,
        }
    }
}

/// Render a validated block list. Returns the whole output or the first
/// error; never partial output.
pub async fn render_blocks(
    blocks: &[Block],
    ctx: &RenderContext<'_>,
    args: &KernelArguments,
    safety: &ContentSafety,
) -> Result<String, RenderError> {
    match ctx.mode {
        EvaluationMode::Sequential => {
            let mut out = String::new();
            for block in blocks {
                out.push_str(&render_block(block, ctx, args, safety).await?);
            }
            Ok(out)
        }
        EvaluationMode::Concurrent => {
            let parts = try_join_all(
                blocks
                    .iter()
                    .map(|block| render_block(block, ctx, args, safety)),
            )
            .await?;
            Ok(parts.concat())
        }
    }
}

async fn render_block(
    block: &Block,
    ctx: &RenderContext<'_>,
    args: &KernelArguments,
    safety: &ContentSafety,
) -> Result<String, RenderError> {
    let rendered = match block {
        Block::Text(text) => return Ok(text.content.clone()),
        Block::Variable(var) => lookup(args, var).to_string(),
        Block::Value(val) => val.value.clone(),
        Block::Code(code) => render_code(code, ctx, args).await?,
        Block::FunctionId(_) | Block::NamedArg(_) => block.content().to_string(),
    };

    if safety.should_encode(block) {
        Ok(html_encode(&rendered))
    } else {
        Ok(rendered)
    }
}

async fn render_code(
    code: &CodeBlock,
    ctx: &RenderContext<'_>,
    args: &KernelArguments,
) -> Result<String, RenderError> {
    debug!(code = %code.content, "rendering code block");
    match code.tokens.first() {
        Some(Block::Value(val)) => Ok(val.value.clone()),
        Some(Block::Variable(var)) => Ok(lookup(args, var).to_string()),
        Some(Block::FunctionId(id)) => call_function(code, id, ctx, args).await,
        _ => Ok(String::new()),
    }
}

async fn call_function(
    code: &CodeBlock,
    id: &FunctionIdBlock,
    ctx: &RenderContext<'_>,
    args: &KernelArguments,
) -> Result<String, RenderError> {
    let name = id.qualified_name().to_string();
    let Some(function) = ctx.registry.get_function(&id.plugin_name, &id.function_name) else {
        error!(function = %name, "function not found");
        return Err(RenderError::FunctionNotFound {
            name,
            span: code.span.clone(),
        });
    };

    let call_args = bind_arguments(code, function.metadata(), &name, args)?;

    if ctx.cancel.is_cancelled() {
        return Err(RenderError::Cancelled {
            name,
            span: code.span.clone(),
        });
    }

    debug!(function = %name, arguments = call_args.len(), "invoking function");
    let result = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            return Err(RenderError::Cancelled { name, span: code.span.clone() });
        }
        result = function.invoke(call_args) => result,
    };

    match result {
        Ok(value) => Ok(value.to_string()),
        Err(source) => {
            error!(function = %name, error = %source, "function failed");
            Err(RenderError::FunctionExecution {
                name,
                span: code.span.clone(),
                source,
            })
        }
    }
}

/// Build the arguments for one call: a copy of the outer arguments plus the
/// positional value bound to the first parameter and every named argument.
fn bind_arguments(
    code: &CodeBlock,
    metadata: &FunctionMetadata,
    name: &str,
    args: &KernelArguments,
) -> Result<KernelArguments, RenderError> {
    let mut call_args = args.clone();
    let tokens = code.arguments();
    if tokens.is_empty() {
        return Ok(call_args);
    }

    let Some(first) = metadata.parameters.first() else {
        return Err(RenderError::NoParameters {
            name: name.to_string(),
            count: tokens.len(),
            span: code.span.clone(),
        });
    };

    let positional = match &tokens[0] {
        Block::Value(val) => Some(Value::from(val.value.as_str())),
        Block::Variable(var) => Some(lookup(args, var).clone()),
        _ => None,
    };
    let named = if let Some(value) = positional {
        call_args.insert(first.name.as_str(), value);
        &tokens[1..]
    } else {
        tokens
    };
    let has_positional = named.len() < tokens.len();

    for token in named {
        let Block::NamedArg(arg) = token else {
            continue;
        };
        if has_positional && arg.name.eq_ignore_ascii_case(&first.name) {
            return Err(RenderError::AmbiguousArgument {
                name: name.to_string(),
                parameter: arg.name.clone(),
                span: arg.span.clone(),
            });
        }
        let value = match &arg.value {
            Some(NamedArgValue::Variable(var)) => lookup(args, var).clone(),
            Some(NamedArgValue::Value(val)) => Value::from(val.value.as_str()),
            None => Value::Null,
        };
        call_args.insert(arg.name.as_str(), value);
    }

    Ok(call_args)
}

static NULL: Value = Value::Null;

fn lookup<'v>(args: &'v KernelArguments, var: &VarBlock) -> &'v Value {
    match args.get(&var.name) {
        Some(value) => value,
        None => {
            warn!(variable = %var.name, "variable not found");
            &NULL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionCollection, ParameterMetadata};
    use sktemplate::block::TextBlock;
    use sktemplate::parser::Parser;

    fn blocks(template: &str) -> Vec<Block> {
        Parser::new(template, 0).parse().expect("valid template").blocks
    }

    fn echo() -> FunctionCollection {
        FunctionCollection::new().with_function(
            FunctionMetadata::new("t", "echo")
                .with_parameter(ParameterMetadata::new("input"))
                .with_parameter(ParameterMetadata::new("suffix")),
            |args| async move {
                let input = args.get("input").cloned().unwrap_or_default();
                let suffix = args.get("suffix").cloned().unwrap_or_default();
                Ok(Value::from(format!("{input}{suffix}")))
            },
        )
    }

    #[tokio::test]
    async fn binds_positional_and_named_arguments() {
        let functions = echo();
        let ctx = RenderContext::new(&functions);
        let args = KernelArguments::new().with("who", "Amy");
        let out = render_blocks(
            &blocks(r#"{{t.echo $who suffix="!"}}"#),
            &ctx,
            &args,
            &ContentSafety::default(),
        )
        .await
        .expect("renders");
        assert_eq!(out, "Amy!");
    }

    #[tokio::test]
    async fn outer_arguments_reach_the_function() {
        let functions = echo();
        let ctx = RenderContext::new(&functions);
        let args = KernelArguments::new().with("input", "x").with("suffix", "y");
        let out = render_blocks(&blocks("{{t.echo}}"), &ctx, &args, &ContentSafety::default())
            .await
            .expect("renders");
        assert_eq!(out, "xy");
    }

    #[tokio::test]
    async fn positional_and_named_first_parameter_is_ambiguous() {
        let functions = echo();
        let ctx = RenderContext::new(&functions);
        let err = render_blocks(
            &blocks(r#"{{t.echo "a" input="b"}}"#),
            &ctx,
            &KernelArguments::new(),
            &ContentSafety::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RenderError::AmbiguousArgument { parameter, .. } if parameter == "input"));
    }

    #[tokio::test]
    async fn arguments_to_parameterless_function_fail() {
        let functions = FunctionCollection::new()
            .with_function(FunctionMetadata::new("t", "now"), |_| async { Ok(Value::from("noon")) });
        let ctx = RenderContext::new(&functions);
        let err = render_blocks(
            &blocks(r#"{{t.now "x"}}"#),
            &ctx,
            &KernelArguments::new(),
            &ContentSafety::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RenderError::NoParameters { count: 1, .. }));
    }

    #[test]
    fn text_is_never_encoded() {
        let safety = ContentSafety::default();
        let text = Block::Text(TextBlock::new("<b>", 0..3));
        assert!(!safety.should_encode(&text));
    }

    #[test]
    fn trusted_variables_ignore_case() {
        let safety = ContentSafety {
            allow_unsafe_content: false,
            trusted_variables: vec!["Bio".to_string()],
        };
        assert!(!safety.should_encode(&Block::Variable(VarBlock::new("$bio", 0..4))));
        assert!(safety.should_encode(&Block::Variable(VarBlock::new("$name", 0..5))));
    }
}
