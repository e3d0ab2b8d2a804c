//! Registration data consumed by [`BehaviorGraph::build_from`].
//!
//! [`Registry`] is a small builder for routes, their action calls and
//! input/output media, named behavior types and the policies that apply them.
//! Writers and readers are recorded as specs and only turned into descriptors
//! when the graph is built, so a malformed registration fails the build.
//!
//! [`BehaviorGraph::build_from`]: crate::core::graph::BehaviorGraph::build_from

use crate::core::chain::BehaviorChain;
use crate::core::descriptor::{Condition, ImplementationRef, MediaDescriptor};
use crate::core::error::ConfigurationError;
use crate::core::graph::GraphOptions;
use crate::core::media;
use crate::core::nodes::{ActionCall, BehaviorType, CachingNode, InputNode, OutputNode};
use crate::core::policy::{ChainFilter, PolicyDefinition};
use crate::core::resource::ResourceType;
use crate::core::view::ViewToken;
use std::sync::Arc;

/// Everything the graph builder needs from registration.
pub trait RegistrationSource {
    fn routes(&self) -> &[RouteDefinition];

    /// Behavior types policies may refer to by name.
    fn behavior_types(&self) -> &[BehaviorType];

    /// Policies in registration order.
    fn policies(&self) -> &[PolicyDefinition];

    fn options(&self) -> GraphOptions {
        GraphOptions::default()
    }
}

#[derive(Clone)]
enum WriterSpec {
    Json,
    Text,
    View(Arc<dyn ViewToken>),
    Custom(ImplementationRef),
}

#[derive(Clone)]
enum ReaderSpec {
    Json,
    Text,
    Custom(ImplementationRef),
}

#[derive(Clone)]
struct Conditional {
    spec: WriterSpec,
    condition: Condition,
}

/// One route and how its chain is assembled.
#[derive(Clone, Default)]
pub struct RouteDefinition {
    pattern: String,
    action: Option<ActionCall>,
    input_type: Option<ResourceType>,
    output_type: Option<ResourceType>,
    readers: Vec<ReaderSpec>,
    writers: Vec<Conditional>,
    caching: Option<CachingNode>,
    opaque: bool,
}

impl RouteDefinition {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Sets the action. Its declared input and output types become the
    /// chain's unless set explicitly.
    pub fn calls(&mut self, action: ActionCall) -> &mut Self {
        self.action = Some(action);
        self
    }

    pub fn input(&mut self, input_type: ResourceType) -> &mut Self {
        self.input_type = Some(input_type);
        self
    }

    pub fn output(&mut self, output_type: ResourceType) -> &mut Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn output_to_json(&mut self) -> &mut Self {
        self.write(WriterSpec::Json, Condition::always())
    }

    pub fn output_to_text(&mut self) -> &mut Self {
        self.write(WriterSpec::Text, Condition::always())
    }

    pub fn render_view(&mut self, token: Arc<dyn ViewToken>) -> &mut Self {
        self.write(WriterSpec::View(token), Condition::always())
    }

    pub fn render_view_when(&mut self, token: Arc<dyn ViewToken>, condition: Condition) -> &mut Self {
        self.write(WriterSpec::View(token), condition)
    }

    pub fn write_with(&mut self, implementation: impl Into<ImplementationRef>) -> &mut Self {
        self.write(WriterSpec::Custom(implementation.into()), Condition::always())
    }

    pub fn write_with_when(
        &mut self,
        implementation: impl Into<ImplementationRef>,
        condition: Condition,
    ) -> &mut Self {
        self.write(WriterSpec::Custom(implementation.into()), condition)
    }

    fn write(&mut self, spec: WriterSpec, condition: Condition) -> &mut Self {
        self.writers.push(Conditional { spec, condition });
        self
    }

    pub fn read_json(&mut self) -> &mut Self {
        self.readers.push(ReaderSpec::Json);
        self
    }

    pub fn read_text(&mut self) -> &mut Self {
        self.readers.push(ReaderSpec::Text);
        self
    }

    pub fn read_with(&mut self, implementation: impl Into<ImplementationRef>) -> &mut Self {
        self.readers.push(ReaderSpec::Custom(implementation.into()));
        self
    }

    pub fn cache_output(&mut self) -> &mut Self {
        self.caching = Some(CachingNode::new());
        self
    }

    pub fn cache_output_varying_by(&mut self, header: &str) -> &mut Self {
        let caching = self.caching.take().unwrap_or_default().vary_by(header);
        self.caching = Some(caching);
        self
    }

    /// Marks the chain as pre-finalized. Policies skip it.
    pub fn opaque(&mut self) -> &mut Self {
        self.opaque = true;
        self
    }

    /// Assembles this route's chain: caching, input, action call, output.
    pub fn build_chain(&self) -> Result<BehaviorChain, ConfigurationError> {
        let mut chain = BehaviorChain::for_route(&self.pattern);
        if self.opaque {
            chain.mark_opaque();
        }

        if let Some(caching) = &self.caching {
            chain.append(caching.clone());
        }

        let input_type = self
            .input_type
            .clone()
            .or_else(|| self.action.as_ref().and_then(|a| a.input_type().cloned()));
        if let Some(input) = self.build_input(input_type)? {
            chain.append(input);
        }

        if let Some(action) = &self.action {
            chain.append(action.clone());
        }

        let output_type = self
            .output_type
            .clone()
            .or_else(|| self.action.as_ref().and_then(|a| a.output_type().cloned()));
        if let Some(output) = self.build_output(output_type)? {
            chain.append(output);
        }

        Ok(chain)
    }

    fn build_input(&self, input_type: Option<ResourceType>) -> Result<Option<InputNode>, ConfigurationError> {
        let readers = self
            .readers
            .iter()
            .map(|spec| {
                let descriptor = match spec {
                    ReaderSpec::Json => MediaDescriptor::reader(media::json_reader(), input_type.clone()),
                    ReaderSpec::Text => MediaDescriptor::reader(media::text_reader(), input_type.clone()),
                    ReaderSpec::Custom(implementation) => {
                        MediaDescriptor::reader(implementation.clone(), input_type.clone())
                    }
                };
                descriptor.map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(input_type) = input_type.or_else(|| readers.first().map(|r| r.resource_type().clone())) else {
            return Ok(None);
        };

        let mut node = InputNode::new(input_type);
        for reader in readers {
            node.add_reader(reader)?;
        }
        Ok(Some(node))
    }

    fn build_output(&self, output_type: Option<ResourceType>) -> Result<Option<OutputNode>, ConfigurationError> {
        let writers = self
            .writers
            .iter()
            .map(|Conditional { spec, condition }| {
                let descriptor = match spec {
                    WriterSpec::Json => MediaDescriptor::writer(media::json_writer(), output_type.clone()),
                    WriterSpec::Text => Ok(MediaDescriptor::write_string()),
                    WriterSpec::View(token) => Ok(MediaDescriptor::view(Arc::clone(token))),
                    WriterSpec::Custom(implementation) => {
                        MediaDescriptor::writer(implementation.clone(), output_type.clone())
                    }
                };
                descriptor.map(|d| Arc::new(d.with_condition(condition.clone())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(output_type) = output_type.or_else(|| writers.first().map(|w| w.resource_type().clone())) else {
            return Ok(None);
        };

        let mut node = OutputNode::new(output_type);
        for writer in writers {
            node.add_writer(writer)?;
        }
        Ok(Some(node))
    }
}

/// A builder-style [`RegistrationSource`].
#[derive(Clone, Default)]
pub struct Registry {
    routes: Vec<RouteDefinition>,
    behaviors: Vec<BehaviorType>,
    policies: Vec<PolicyDefinition>,
    options: GraphOptions,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route and returns it for further configuration.
    pub fn route(&mut self, pattern: impl Into<String>) -> &mut RouteDefinition {
        self.routes.push(RouteDefinition::new(pattern));
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    /// Adds an opaque, output-cached chain such as a static content endpoint.
    pub fn asset_chain(&mut self, pattern: impl Into<String>, action: ActionCall) -> &mut RouteDefinition {
        let route = self.route(pattern);
        route.calls(action).cache_output().opaque();
        route
    }

    pub fn register_behavior(&mut self, behavior: BehaviorType) -> &mut Self {
        self.behaviors.push(behavior);
        self
    }

    /// Wraps every non-opaque chain with the named behavior type.
    pub fn wrap_behavior_chains_with(&mut self, behavior: impl Into<String>) -> &mut Self {
        self.policies.push(PolicyDefinition::new(behavior));
        self
    }

    /// Wraps every non-opaque chain matching `filter` with the named behavior type.
    pub fn wrap_behavior_chains_with_where<F>(&mut self, behavior: impl Into<String>, filter: F) -> &mut Self
    where
        F: Fn(&BehaviorChain) -> bool + Send + Sync + 'static,
    {
        let filter: ChainFilter = Arc::new(filter);
        self.policies.push(PolicyDefinition::new(behavior).with_filter(filter));
        self
    }

    pub fn validate_on_build(&mut self, validate: bool) -> &mut Self {
        self.options.validate_on_build = validate;
        self
    }
}

impl RegistrationSource for Registry {
    fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    fn behavior_types(&self) -> &[BehaviorType] {
        &self.behaviors
    }

    fn policies(&self) -> &[PolicyDefinition] {
        &self.policies
    }

    fn options(&self) -> GraphOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::{ChainNode, NodeKind};

    fn order() -> ResourceType {
        ResourceType::new("shop", "Order")
    }

    fn kinds(chain: &BehaviorChain) -> Vec<NodeKind> {
        chain.iter().map(ChainNode::kind).collect()
    }

    #[test]
    fn test_route_chain_takes_types_from_the_action() {
        let mut route = RouteDefinition::new("orders/{id}");
        route
            .calls(
                ActionCall::from_fn("Orders", "show", |_| Ok(None))
                    .with_input(ResourceType::new("shop", "OrderQuery"))
                    .with_output(order()),
            )
            .read_json()
            .output_to_json();

        let chain = route.build_chain().unwrap();
        assert_eq!(kinds(&chain), vec![NodeKind::Input, NodeKind::ActionCall, NodeKind::Output]);

        let output = chain.iter().find_map(ChainNode::as_output).unwrap();
        assert_eq!(output.resource_type(), &order());
        let input = chain.iter().find_map(ChainNode::as_input).unwrap();
        assert_eq!(input.readers().len(), 1);
    }

    #[test]
    fn test_json_output_without_any_type_fails() {
        let mut route = RouteDefinition::new("untyped");
        route
            .calls(ActionCall::from_fn("Untyped", "get", |_| Ok(None)))
            .output_to_json();
        let err = route.build_chain().unwrap_err();
        assert!(matches!(err, ConfigurationError::ResourceTypeRequired { .. }));
    }

    #[test]
    fn test_text_output_infers_string_type() {
        let mut route = RouteDefinition::new("hello");
        route
            .calls(ActionCall::from_fn("Hello", "say", |_| Ok(None)))
            .output_to_text();
        let chain = route.build_chain().unwrap();
        let output = chain.iter().find_map(ChainNode::as_output).unwrap();
        assert_eq!(output.resource_type(), &ResourceType::string());
    }

    #[test]
    fn test_text_output_for_a_non_string_action_is_rejected() {
        let mut route = RouteDefinition::new("orders");
        route
            .calls(ActionCall::from_fn("Orders", "list", |_| Ok(None)).with_output(order()))
            .output_to_json()
            .output_to_text();
        let err = route.build_chain().unwrap_err();
        assert!(matches!(err, ConfigurationError::ResourceTypeMismatch { .. }));
    }

    #[test]
    fn test_asset_chain_is_opaque_and_cached() {
        let mut registry = Registry::new();
        registry
            .asset_chain("_content/{path}", ActionCall::from_fn("Assets", "serve", |_| Ok(None)))
            .output_to_text();
        let route = &registry.routes()[0];
        assert!(route.is_opaque());

        let chain = route.build_chain().unwrap();
        assert!(chain.is_opaque());
        assert_eq!(kinds(&chain), vec![NodeKind::Caching, NodeKind::ActionCall, NodeKind::Output]);
    }
}
