use async_trait::async_trait;
use tracing::debug;

use crate::arguments::KernelArguments;
use crate::config::PromptTemplateConfig;
use crate::error::RenderError;
use crate::renderer::RenderContext;
use crate::template::KernelPromptTemplate;

/// Name of the `{{$variable}}` / `{{plugin.function}}` template format.
pub const SEMANTIC_KERNEL_TEMPLATE_FORMAT: &str = "semantic-kernel";

/// A template that renders to a prompt string.
#[async_trait]
pub trait PromptTemplate: Send + Sync {
    async fn render(
        &self,
        ctx: &RenderContext<'_>,
        args: &KernelArguments,
    ) -> Result<String, RenderError>;
}

/// Builds templates for the formats it understands.
pub trait PromptTemplateFactory: Send + Sync {
    /// `None` when `config.template_format` is not handled by this factory.
    fn try_create(&self, config: &PromptTemplateConfig) -> Option<Box<dyn PromptTemplate>>;

    fn create(&self, config: &PromptTemplateConfig) -> Result<Box<dyn PromptTemplate>, RenderError> {
        self.try_create(config)
            .ok_or_else(|| RenderError::UnsupportedFormat(config.template_format.clone()))
    }
}

/// Factory for [`KernelPromptTemplate`].
#[derive(Debug, Clone, Default)]
pub struct KernelPromptTemplateFactory {
    /// Passed to every template created.
    pub allow_unsafe_content: bool,
}

impl KernelPromptTemplateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_unsafe_content(mut self, allow: bool) -> Self {
        self.allow_unsafe_content = allow;
        self
    }
}

impl PromptTemplateFactory for KernelPromptTemplateFactory {
    fn try_create(&self, config: &PromptTemplateConfig) -> Option<Box<dyn PromptTemplate>> {
        if !config
            .template_format
            .eq_ignore_ascii_case(SEMANTIC_KERNEL_TEMPLATE_FORMAT)
        {
            return None;
        }
        Some(Box::new(
            KernelPromptTemplate::new(config.clone())
                .with_allow_unsafe_content(self.allow_unsafe_content),
        ))
    }
}

/// Tries each factory in order; the first one that accepts the format wins.
#[derive(Default)]
pub struct AggregatorPromptTemplateFactory {
    factories: Vec<Box<dyn PromptTemplateFactory>>,
}

impl AggregatorPromptTemplateFactory {
    pub fn new(factories: Vec<Box<dyn PromptTemplateFactory>>) -> Self {
        AggregatorPromptTemplateFactory { factories }
    }

    pub fn with_factory(mut self, factory: impl PromptTemplateFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }
}

impl PromptTemplateFactory for AggregatorPromptTemplateFactory {
    fn try_create(&self, config: &PromptTemplateConfig) -> Option<Box<dyn PromptTemplate>> {
        let template = self.factories.iter().find_map(|f| f.try_create(config));
        if template.is_none() {
            debug!(format = %config.template_format, "no factory accepted template format");
        }
        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(format: &str) -> PromptTemplateConfig {
        PromptTemplateConfig {
            template_format: format.to_string(),
            ..PromptTemplateConfig::new("hi")
        }
    }

    #[test]
    fn kernel_factory_accepts_its_format_ignoring_case() {
        let factory = KernelPromptTemplateFactory::new();
        assert!(factory.try_create(&config("semantic-kernel")).is_some());
        assert!(factory.try_create(&config("Semantic-Kernel")).is_some());
        assert!(factory.try_create(&config("handlebars")).is_none());
    }

    #[test]
    fn create_reports_unsupported_format() {
        let err = KernelPromptTemplateFactory::new()
            .create(&config("jinja2"))
            .err()
            .expect("unsupported");
        assert!(matches!(err, RenderError::UnsupportedFormat(f) if f == "jinja2"));
    }

    #[test]
    fn empty_aggregator_accepts_nothing() {
        let factory = AggregatorPromptTemplateFactory::default();
        assert!(factory.try_create(&config("semantic-kernel")).is_none());
    }
}
