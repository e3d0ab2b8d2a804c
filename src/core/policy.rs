//! Graph-wide policies that reshape chains after routes are assembled.

use crate::core::chain::{BehaviorChain, NodeId};
use crate::core::error::ConfigurationError;
use crate::core::graph::BehaviorGraph;
use crate::core::nodes::{BehaviorType, NodeKind, Wrapper};
use std::fmt;
use std::sync::Arc;

/// Chain predicate used to narrow where a policy applies.
pub type ChainFilter = Arc<dyn Fn(&BehaviorChain) -> bool + Send + Sync>;

/// A transformation over the whole graph.
pub trait ChainPolicy {
    fn name(&self) -> String;

    fn configure(&self, graph: &mut BehaviorGraph);
}

/// A registered "wrap chains with behavior X" request, resolved against the
/// behavior catalog when the graph is built.
#[derive(Clone)]
pub struct PolicyDefinition {
    behavior: String,
    filter: Option<ChainFilter>,
}

impl PolicyDefinition {
    pub fn new(behavior: impl Into<String>) -> Self {
        Self {
            behavior: behavior.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: ChainFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn behavior(&self) -> &str {
        &self.behavior
    }

    pub fn resolve(&self, catalog: &[BehaviorType]) -> Result<WrapWith, ConfigurationError> {
        let behavior = catalog
            .iter()
            .find(|b| b.name() == self.behavior)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownBehavior {
                policy: format!("wrap behavior chains with {}", self.behavior),
                behavior: self.behavior.clone(),
            })?;
        Ok(WrapWith {
            behavior,
            filter: self.filter.clone(),
        })
    }
}

impl fmt::Debug for PolicyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDefinition")
            .field("behavior", &self.behavior)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Wraps every non-opaque chain with one behavior type.
///
/// The wrapper goes directly after the chain's input node so it sees the
/// bound input and encloses the action call and output. A chain without an
/// input node gets the wrapper after any leading caching nodes, or as its
/// new top. Applying several of these in order leaves the last one applied
/// outermost among them, since each lands right after the input node.
#[derive(Clone)]
pub struct WrapWith {
    behavior: BehaviorType,
    filter: Option<ChainFilter>,
}

impl WrapWith {
    pub fn new(behavior: BehaviorType) -> Self {
        Self { behavior, filter: None }
    }

    pub fn only_where<F>(mut self, filter: F) -> Self
    where
        F: Fn(&BehaviorChain) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn behavior(&self) -> &BehaviorType {
        &self.behavior
    }

    fn matches(&self, chain: &BehaviorChain) -> bool {
        !chain.is_opaque() && self.filter.as_ref().is_none_or(|f| f(chain))
    }
}

impl ChainPolicy for WrapWith {
    fn name(&self) -> String {
        format!("wrap behavior chains with {}", self.behavior.name())
    }

    fn configure(&self, graph: &mut BehaviorGraph) {
        let mut wrapped = 0;
        for chain in graph.chains_mut() {
            if !self.matches(chain) {
                continue;
            }
            wrap_chain(chain, &self.behavior);
            wrapped += 1;
        }
        log::debug!("Applied '{}' to {} chains", self.name(), wrapped);
    }
}

/// Inserts a wrapper for `behavior` at the wrapping point of `chain`.
pub fn wrap_chain(chain: &mut BehaviorChain, behavior: &BehaviorType) -> NodeId {
    let wrapper = Wrapper::new(behavior.clone());
    let anchor = wrapping_anchor(chain);
    match anchor.and_then(|anchor| chain.insert_after(anchor, wrapper.clone())) {
        Some(id) => id,
        None => chain.prepend(wrapper),
    }
}

fn wrapping_anchor(chain: &BehaviorChain) -> Option<NodeId> {
    chain.find(NodeKind::Input).or_else(|| {
        chain
            .ids()
            .take_while(|&id| chain.node(id).is_some_and(|n| n.is(NodeKind::Caching)))
            .last()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::{ActionCall, CachingNode, ChainNode, InputNode, OutputNode};
    use crate::core::resource::ResourceType;

    fn behavior(name: &str) -> BehaviorType {
        BehaviorType::new(name, |inner| inner)
    }

    fn described(chain: &BehaviorChain) -> Vec<String> {
        chain
            .iter()
            .map(|node| match node {
                ChainNode::Wrapper(w) => w.behavior_type().name().to_string(),
                other => format!("{:?}", other.kind()),
            })
            .collect()
    }

    fn call() -> ActionCall {
        ActionCall::from_fn("Orders", "list", |_| Ok(None))
    }

    #[test]
    fn test_wraps_right_after_input() {
        let mut chain = BehaviorChain::for_route("orders");
        chain.append(InputNode::new(ResourceType::string()));
        chain.append(call());
        chain.append(OutputNode::new(ResourceType::string()));

        wrap_chain(&mut chain, &behavior("Audit"));
        assert_eq!(described(&chain), vec!["Input", "Audit", "ActionCall", "Output"]);
    }

    #[test]
    fn test_second_wrap_is_outermost() {
        let mut chain = BehaviorChain::for_route("orders");
        chain.append(InputNode::new(ResourceType::string()));
        chain.append(call());

        wrap_chain(&mut chain, &behavior("W1"));
        wrap_chain(&mut chain, &behavior("W2"));
        assert_eq!(described(&chain), vec!["Input", "W2", "W1", "ActionCall"]);
    }

    #[test]
    fn test_without_input_wraps_after_leading_caching() {
        let mut cached = BehaviorChain::for_route("cached");
        cached.append(CachingNode::new());
        cached.append(call());
        wrap_chain(&mut cached, &behavior("Audit"));
        assert_eq!(described(&cached), vec!["Caching", "Audit", "ActionCall"]);

        let mut bare = BehaviorChain::for_route("bare");
        bare.append(call());
        wrap_chain(&mut bare, &behavior("Audit"));
        assert_eq!(described(&bare), vec!["Audit", "ActionCall"]);
    }

    #[test]
    fn test_resolve_unknown_behavior_fails() {
        let definition = PolicyDefinition::new("Missing");
        let err = definition.resolve(&[behavior("Audit")]).err().unwrap();
        assert_eq!(
            err,
            ConfigurationError::UnknownBehavior {
                policy: "wrap behavior chains with Missing".to_string(),
                behavior: "Missing".to_string(),
            }
        );
    }

    #[test]
    fn test_filter_and_opaque_chains_are_skipped() {
        let mut graph = BehaviorGraph::new();
        for route in ["orders", "admin/users"] {
            let chain = graph.add_chain(BehaviorChain::for_route(route));
            chain.append(call());
        }
        let asset = graph.add_chain(BehaviorChain::for_route("_content"));
        asset.mark_opaque();
        asset.append(CachingNode::new());

        let policy = WrapWith::new(behavior("Audit"))
            .only_where(|chain| !chain.route().is_some_and(|r| r.starts_with("admin")));
        graph.apply(&policy);

        let wrapped: Vec<_> = graph
            .chains()
            .iter()
            .filter(|c| c.count(NodeKind::Wrapper) > 0)
            .filter_map(|c| c.route())
            .collect();
        assert_eq!(wrapped, vec!["orders"]);
    }
}
