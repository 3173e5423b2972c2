use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use renderer::{
    FunctionCollection, FunctionError, FunctionMetadata, KernelArguments, KernelFunction,
    KernelPromptTemplate, ParameterMetadata, PromptTemplateConfig, RenderContext, Value,
};

/// One `[[function]]` entry of a stub function file.
#[derive(Debug, Clone, Deserialize)]
pub struct StubFunctionDef {
    #[serde(default)]
    pub plugin: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Parameter names; the first receives the positional argument.
    #[serde(default)]
    pub parameters: Vec<String>,

    /// Static result.
    #[serde(default)]
    pub result: Option<String>,

    /// Template rendered with the call arguments.
    #[serde(default)]
    pub template: Option<String>,

    /// The call fails with this message.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StubFile {
    #[serde(default)]
    function: Vec<StubFunctionDef>,
}

enum Behavior {
    Result(String),
    Template(KernelPromptTemplate),
    Error(String),
}

/// A function whose behavior is declared in TOML, for trying templates out
/// from the command line and in `.test.prompt` files.
struct StubFunction {
    metadata: FunctionMetadata,
    behavior: Behavior,
}

#[async_trait]
impl KernelFunction for StubFunction {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    async fn invoke(&self, arguments: KernelArguments) -> Result<Value, FunctionError> {
        match &self.behavior {
            Behavior::Result(result) => Ok(Value::from(result.as_str())),
            Behavior::Error(message) => Err(FunctionError::failed(message.as_str())),
            Behavior::Template(template) => {
                let functions = FunctionCollection::new();
                let ctx = RenderContext::new(&functions);
                template
                    .render(&ctx, &arguments)
                    .await
                    .map(Value::from)
                    .map_err(|e| FunctionError::Other(Box::new(e)))
            }
        }
    }
}

fn stub(def: &StubFunctionDef) -> Result<StubFunction, String> {
    let behavior = match (&def.result, &def.template, &def.error) {
        (Some(result), None, None) => Behavior::Result(result.clone()),
        (None, Some(template), None) => Behavior::Template(
            KernelPromptTemplate::new(PromptTemplateConfig::new(template.as_str()))
                .with_allow_unsafe_content(true),
        ),
        (None, None, Some(error)) => Behavior::Error(error.clone()),
        _ => {
            return Err(format!(
                "function '{}' must set exactly one of result, template or error",
                def.name
            ));
        }
    };

    let mut metadata =
        FunctionMetadata::new(def.plugin.as_str(), def.name.as_str()).with_description(def.description.as_str());
    for name in &def.parameters {
        metadata = metadata.with_parameter(ParameterMetadata::new(name.as_str()));
    }
    Ok(StubFunction { metadata, behavior })
}

/// Build a registry from stub definitions.
pub fn build_functions(defs: &[StubFunctionDef]) -> Result<FunctionCollection, String> {
    let mut functions = FunctionCollection::new();
    for def in defs {
        functions.add(Arc::new(stub(def)?));
    }
    Ok(functions)
}

/// Load a stub function file.
pub fn load_functions(path: &Path) -> Result<FunctionCollection, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    let file: StubFile =
        toml::from_str(&source).map_err(|e| format!("invalid function file '{}': {}", path.display(), e))?;
    build_functions(&file.function)
}
