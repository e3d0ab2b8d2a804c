//! The behavior graph: every chain of the application.
//!
//! A [`BehaviorGraph`] is built from registration data, reshaped by policies
//! and then frozen into a [`FrozenGraph`] that request dispatch reads
//! concurrently.

use crate::core::chain::{BehaviorChain, FrozenChain};
use crate::core::describe::{DescribesItself, Description};
use crate::core::error::ConfigurationError;
use crate::core::nodes::{ChainNode, NodeKind};
use crate::core::policy::ChainPolicy;
use crate::core::registry::RegistrationSource;
use crate::core::validation;
use crate::core::visitor::{ChainView, VisitableGraph};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Switches for [`BehaviorGraph::build_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphOptions {
    /// Fail the build when validation finds errors, not only on malformed chains.
    pub validate_on_build: bool,
}

/// The mutable, build-phase graph.
#[derive(Debug, Clone, Default)]
pub struct BehaviorGraph {
    chains: Vec<BehaviorChain>,
}

impl BehaviorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one chain per registered route, then applies the registered
    /// policies in order.
    pub fn build_from(source: &dyn RegistrationSource) -> Result<Self, ConfigurationError> {
        let mut graph = Self::new();
        let mut seen = HashSet::new();

        for route in source.routes() {
            if !seen.insert(route.pattern()) {
                return Err(ConfigurationError::DuplicateRoute(route.pattern().to_string()));
            }
            graph.add_chain(route.build_chain()?);
        }

        for definition in source.policies() {
            let policy = definition.resolve(source.behavior_types())?;
            graph.apply(&policy);
        }

        for chain in &graph.chains {
            chain.check()?;
        }

        if source.options().validate_on_build {
            let result = validation::validate(&graph);
            result.log_summary();
            if let Some(error) = result.first_error() {
                return Err(ConfigurationError::Invalid(error.to_string()));
            }
        }

        log::debug!(
            "Built behavior graph with {} chains ({} opaque)",
            graph.len(),
            graph.chains.iter().filter(|c| c.is_opaque()).count()
        );
        Ok(graph)
    }

    /// Adds a chain and returns it for further assembly.
    pub fn add_chain(&mut self, chain: BehaviorChain) -> &mut BehaviorChain {
        self.chains.push(chain);
        let last = self.chains.len() - 1;
        &mut self.chains[last]
    }

    pub fn chains(&self) -> &[BehaviorChain] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [BehaviorChain] {
        &mut self.chains
    }

    pub fn chain_for(&self, route: &str) -> Option<&BehaviorChain> {
        self.chains.iter().find(|c| c.route() == Some(route))
    }

    pub fn apply(&mut self, policy: &dyn ChainPolicy) {
        policy.configure(self);
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Ends the build phase. Chain order is kept.
    pub fn freeze(self) -> FrozenGraph {
        let chains: Vec<FrozenChain> = self.chains.into_iter().map(BehaviorChain::freeze).collect();
        let by_route = chains
            .iter()
            .enumerate()
            .filter_map(|(index, chain)| chain.route().map(|r| (r.to_string(), index)))
            .collect();
        FrozenGraph {
            chains: chains.into(),
            by_route,
        }
    }
}

impl VisitableGraph for BehaviorGraph {
    fn chain_views(&self) -> Vec<ChainView<'_>> {
        self.chains
            .iter()
            .map(|c| ChainView::new(c.id(), c.route(), c.is_opaque(), c.iter().collect()))
            .collect()
    }
}

/// The immutable, dispatch-phase graph.
#[derive(Debug, Clone)]
pub struct FrozenGraph {
    chains: Arc<[FrozenChain]>,
    by_route: HashMap<String, usize>,
}

impl FrozenGraph {
    pub fn chains(&self) -> &[FrozenChain] {
        &self.chains
    }

    pub fn chain_for(&self, route: &str) -> Option<&FrozenChain> {
        self.by_route.get(route).and_then(|&index| self.chains.get(index))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// A serializable snapshot of every chain, for diagnostics pages.
    pub fn report(&self) -> Vec<ChainReport> {
        self.chain_views().iter().map(ChainReport::from_view).collect()
    }

    pub fn report_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }
}

impl VisitableGraph for FrozenGraph {
    fn chain_views(&self) -> Vec<ChainView<'_>> {
        self.chains
            .iter()
            .map(|c| ChainView::new(c.id(), c.route(), c.is_opaque(), c.nodes().iter().collect()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub id: String,
    pub route: Option<String>,
    pub opaque: bool,
    pub nodes: Vec<NodeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub kind: String,
    pub description: Description,
    /// The writers or readers of an output or input node.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Description>,
}

impl ChainReport {
    fn from_view(view: &ChainView<'_>) -> Self {
        Self {
            id: view.id().to_string(),
            route: view.route().map(str::to_string),
            opaque: view.is_opaque(),
            nodes: view.nodes().iter().map(|n| NodeReport::from_node(n)).collect(),
        }
    }
}

impl NodeReport {
    fn from_node(node: &ChainNode) -> Self {
        let media = match node {
            ChainNode::Output(output) => output.writers().iter().map(|w| w.describe()).collect(),
            ChainNode::Input(input) => input.readers().iter().map(|r| r.describe()).collect(),
            _ => Vec::new(),
        };
        Self {
            kind: kind_label(node.kind()).to_string(),
            description: node.describe(),
            media,
        }
    }
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Input => "input",
        NodeKind::ActionCall => "action-call",
        NodeKind::Output => "output",
        NodeKind::Wrapper => "wrapper",
        NodeKind::Caching => "caching",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::{ActionCall, BehaviorType};
    use crate::core::registry::Registry;
    use crate::core::resource::ResourceType;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .route("orders")
            .calls(ActionCall::from_fn("Orders", "list", |_| Ok(None)).with_output(ResourceType::new("shop", "Order")))
            .output_to_json();
        registry
            .route("hello")
            .calls(ActionCall::from_fn("Hello", "say", |_| Ok(None)))
            .output_to_text();
        registry
    }

    #[test]
    fn test_build_creates_one_chain_per_route_in_order() {
        let graph = BehaviorGraph::build_from(&registry()).unwrap();
        let routes: Vec<_> = graph.chains().iter().filter_map(|c| c.route()).collect();
        assert_eq!(routes, vec!["orders", "hello"]);
        assert!(graph.chain_for("hello").is_some());
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let mut registry = registry();
        registry
            .route("orders")
            .calls(ActionCall::from_fn("Orders", "again", |_| Ok(None)));
        let err = BehaviorGraph::build_from(&registry).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateRoute("orders".to_string()));
    }

    #[test]
    fn test_unknown_policy_behavior_is_rejected() {
        let mut registry = registry();
        registry.wrap_behavior_chains_with("Audit");
        let err = BehaviorGraph::build_from(&registry).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownBehavior { .. }));

        registry.register_behavior(BehaviorType::new("Audit", |inner| inner));
        assert!(BehaviorGraph::build_from(&registry).is_ok());
    }

    #[test]
    fn test_route_without_action_fails_the_build() {
        let mut registry = registry();
        registry.route("empty").output_to_text();
        let err = BehaviorGraph::build_from(&registry).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::ActionCount {
                route: "empty".to_string(),
                count: 0,
            }
        );
    }

    #[test]
    fn test_validate_on_build_turns_errors_fatal() {
        let mut registry = registry();
        registry
            .route("silent")
            .calls(ActionCall::from_fn("Silent", "get", |_| Ok(None)))
            .output(ResourceType::new("shop", "Order"));
        assert!(BehaviorGraph::build_from(&registry).is_ok());

        registry.validate_on_build(true);
        let err = BehaviorGraph::build_from(&registry).unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(msg) if msg.starts_with("silent: no writer")));
    }

    #[test]
    fn test_freeze_keeps_order_and_lookup() {
        let graph = BehaviorGraph::build_from(&registry()).unwrap();
        let ids: Vec<_> = graph.chains().iter().map(|c| c.id()).collect();

        let frozen = graph.freeze();
        assert_eq!(frozen.chains().iter().map(|c| c.id()).collect::<Vec<_>>(), ids);
        assert_eq!(frozen.chain_for("orders").map(|c| c.id()), Some(ids[0]));
        assert!(frozen.chain_for("missing").is_none());
    }

    #[test]
    fn test_report_describes_writers() {
        let frozen = BehaviorGraph::build_from(&registry()).unwrap().freeze();
        let report = frozen.report();
        assert_eq!(report.len(), 2);

        let hello = &report[1];
        assert_eq!(hello.route.as_deref(), Some("hello"));
        let output = hello.nodes.iter().find(|n| n.kind == "output").unwrap();
        assert_eq!(
            output.media[0].short_description,
            "Writes out a string value to the Http response as text/plain"
        );
        assert!(frozen.report_json().unwrap().contains("\"action-call\""));
    }
}
