use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::arguments::KernelArguments;
use crate::error::FunctionError;
use crate::value::Value;

/// Describes one parameter of a function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterMetadata {
    pub name: String,
    pub description: String,
    pub default_value: Option<String>,
    pub is_required: bool,
}

impl ParameterMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        ParameterMetadata {
            name: name.into(),
            is_required: true,
            ..Default::default()
        }
    }
}

/// Describes a callable function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionMetadata {
    pub plugin_name: String,
    pub name: String,
    pub description: String,
    /// The first parameter receives a template's positional argument.
    pub parameters: Vec<ParameterMetadata>,
}

impl FunctionMetadata {
    pub fn new(plugin_name: impl Into<String>, name: impl Into<String>) -> Self {
        FunctionMetadata {
            plugin_name: plugin_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterMetadata) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// `plugin.name`, or `name` for functions outside a plugin.
    pub fn fully_qualified_name(&self) -> String {
        if self.plugin_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.plugin_name, self.name)
        }
    }
}

/// A function a template can call.
#[async_trait]
pub trait KernelFunction: Send + Sync {
    fn metadata(&self) -> &FunctionMetadata;

    async fn invoke(&self, arguments: KernelArguments) -> Result<Value, FunctionError>;
}

/// Resolves the functions referenced by `{{plugin.function}}` blocks.
pub trait FunctionRegistry: Send + Sync {
    /// Look up a function. An empty `plugin_name` searches every plugin.
    fn get_function(&self, plugin_name: &str, function_name: &str) -> Option<Arc<dyn KernelFunction>>;
}

type Handler = dyn Fn(KernelArguments) -> BoxFuture<'static, Result<Value, FunctionError>> + Send + Sync;

/// A function backed by an async closure.
pub struct NativeFunction {
    metadata: FunctionMetadata,
    handler: Box<Handler>,
}

impl NativeFunction {
    pub fn new<F, Fut>(metadata: FunctionMetadata, handler: F) -> Self
    where
        F: Fn(KernelArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        NativeFunction {
            metadata,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelFunction for NativeFunction {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    async fn invoke(&self, arguments: KernelArguments) -> Result<Value, FunctionError> {
        (self.handler)(arguments).await
    }
}

/// A named group of functions.
struct Plugin {
    name: String,
    functions: Vec<Arc<dyn KernelFunction>>,
}

impl Plugin {
    fn get(&self, function_name: &str) -> Option<&Arc<dyn KernelFunction>> {
        self.functions
            .iter()
            .find(|f| f.metadata().name.eq_ignore_ascii_case(function_name))
    }
}

/// In-memory registry of plugins. Names are case-insensitive; plugins are
/// searched in registration order for unqualified lookups.
#[derive(Default)]
pub struct FunctionCollection {
    plugins: Vec<Plugin>,
}

impl FunctionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its metadata's plugin name, replacing any
    /// function of the same name in that plugin.
    pub fn add(&mut self, function: Arc<dyn KernelFunction>) {
        let plugin_name = function.metadata().plugin_name.clone();
        let index = match self
            .plugins
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(&plugin_name))
        {
            Some(index) => index,
            None => {
                self.plugins.push(Plugin {
                    name: plugin_name,
                    functions: Vec::new(),
                });
                self.plugins.len() - 1
            }
        };

        let plugin = &mut self.plugins[index];
        let name = function.metadata().name.clone();
        plugin
            .functions
            .retain(|f| !f.metadata().name.eq_ignore_ascii_case(&name));
        plugin.functions.push(function);
    }

    /// Builder-style [`add`](Self::add) for an async closure.
    pub fn with_function<F, Fut>(mut self, metadata: FunctionMetadata, handler: F) -> Self
    where
        F: Fn(KernelArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        self.add(Arc::new(NativeFunction::new(metadata, handler)));
        self
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    /// Metadata of every registered function.
    pub fn functions(&self) -> Vec<&FunctionMetadata> {
        self.plugins
            .iter()
            .flat_map(|p| p.functions.iter().map(|f| f.metadata()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.iter().all(|p| p.functions.is_empty())
    }
}

impl FunctionRegistry for FunctionCollection {
    fn get_function(&self, plugin_name: &str, function_name: &str) -> Option<Arc<dyn KernelFunction>> {
        if plugin_name.is_empty() {
            return self
                .plugins
                .iter()
                .find_map(|p| p.get(function_name))
                .cloned();
        }
        self.plugins
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(plugin_name))
            .and_then(|p| p.get(function_name))
            .cloned()
    }
}
