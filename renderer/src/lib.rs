pub mod arguments;
pub mod config;
pub mod encoding;
pub mod error;
pub mod factory;
pub mod function;
pub mod renderer;
pub mod template;
pub mod value;

pub use arguments::KernelArguments;
pub use config::{ConfigError, InputVariable, PromptTemplateConfig};
pub use error::{FunctionError, RenderError};
pub use factory::{
    AggregatorPromptTemplateFactory, KernelPromptTemplateFactory, PromptTemplate,
    PromptTemplateFactory,
};
pub use function::{
    FunctionCollection, FunctionMetadata, FunctionRegistry, KernelFunction, NativeFunction,
    ParameterMetadata,
};
pub use renderer::{EvaluationMode, RenderContext};
pub use template::KernelPromptTemplate;
pub use value::Value;
