//! Behavior chains.
//!
//! While the graph is being built a chain is an arena of nodes joined by
//! `next` links, so policies can splice nodes in anywhere. Freezing turns it
//! into a plain head-to-tail sequence that request dispatch only reads.

use crate::core::error::ConfigurationError;
use crate::core::nodes::{ChainNode, NodeKind};
use std::sync::Arc;
use uuid::Uuid;

/// Handle to a node inside one chain. Only the chain that issued it (or a
/// clone of that chain) accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    chain: Uuid,
    index: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    node: ChainNode,
    next: Option<NodeId>,
}

/// The build-phase form of one endpoint's pipeline.
#[derive(Debug, Clone)]
pub struct BehaviorChain {
    id: Uuid,
    route: Option<String>,
    opaque: bool,
    slots: Vec<Slot>,
    top: Option<NodeId>,
}

impl BehaviorChain {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            route: None,
            opaque: false,
            slots: Vec::new(),
            top: None,
        }
    }

    pub fn for_route(route: impl Into<String>) -> Self {
        let mut chain = Self::new();
        chain.route = Some(route.into());
        chain
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Opaque chains are pre-finalized: policies leave them alone and they
    /// need no action call.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn mark_opaque(&mut self) {
        self.opaque = true;
    }

    pub fn top(&self) -> Option<NodeId> {
        self.top
    }

    /// Whether `id` was issued by this chain.
    pub fn owns(&self, id: NodeId) -> bool {
        id.chain == self.id && id.index < self.slots.len()
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        if id.chain != self.id {
            return None;
        }
        self.slots.get(id.index)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|s| s.next)
    }

    pub fn node(&self, id: NodeId) -> Option<&ChainNode> {
        self.slot(id).map(|s| &s.node)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ChainNode> {
        if id.chain != self.id {
            return None;
        }
        self.slots.get_mut(id.index).map(|s| &mut s.node)
    }

    /// For a wrapper, the node it wraps.
    pub fn inner_of(&self, id: NodeId) -> Option<&ChainNode> {
        match self.node(id) {
            Some(ChainNode::Wrapper(_)) => self.next(id).and_then(|n| self.node(n)),
            _ => None,
        }
    }

    fn alloc(&mut self, node: ChainNode, next: Option<NodeId>) -> NodeId {
        let id = NodeId {
            chain: self.id,
            index: self.slots.len(),
        };
        self.slots.push(Slot { node, next });
        id
    }

    fn splice_after(&mut self, anchor: usize, node: ChainNode) -> NodeId {
        let after = self.slots[anchor].next;
        let id = self.alloc(node, after);
        self.slots[anchor].next = Some(id);
        id
    }

    /// Makes `node` the new top.
    pub fn prepend(&mut self, node: impl Into<ChainNode>) -> NodeId {
        let id = self.alloc(node.into(), self.top);
        self.top = Some(id);
        id
    }

    /// Adds `node` after the current last node.
    pub fn append(&mut self, node: impl Into<ChainNode>) -> NodeId {
        match self.last() {
            Some(last) => self.splice_after(last.index, node.into()),
            None => self.prepend(node),
        }
    }

    /// Splices `node` in directly after `anchor`. Returns `None`, leaving the
    /// chain untouched, when `anchor` belongs to another chain.
    pub fn insert_after(&mut self, anchor: NodeId, node: impl Into<ChainNode>) -> Option<NodeId> {
        if !self.owns(anchor) {
            return None;
        }
        Some(self.splice_after(anchor.index, node.into()))
    }

    /// Splices `node` in directly before `anchor`. Returns `None`, leaving the
    /// chain untouched, when `anchor` belongs to another chain.
    pub fn insert_before(&mut self, anchor: NodeId, node: impl Into<ChainNode>) -> Option<NodeId> {
        if !self.owns(anchor) {
            return None;
        }
        let id = match self.previous(anchor) {
            Some(previous) => self.splice_after(previous.index, node.into()),
            None => self.prepend(node),
        };
        Some(id)
    }

    fn previous(&self, id: NodeId) -> Option<NodeId> {
        self.ids().take_while(|&n| n != id).last()
    }

    fn last(&self) -> Option<NodeId> {
        self.ids().last()
    }

    /// Node handles from head to tail.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.top, move |&id| self.next(id))
    }

    /// Nodes from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &ChainNode> + '_ {
        self.ids().filter_map(move |id| self.node(id))
    }

    /// First node of the given kind, head to tail.
    pub fn find(&self, kind: NodeKind) -> Option<NodeId> {
        self.ids().find(|&id| self.node(id).is_some_and(|n| n.is(kind)))
    }

    pub fn any(&self, predicate: impl Fn(&ChainNode) -> bool) -> bool {
        self.iter().any(predicate)
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.iter().filter(|n| n.is(kind)).count()
    }

    pub fn len(&self) -> usize {
        self.ids().count()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Checks the chain shape: exactly one action call unless opaque.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        let count = self.count(NodeKind::ActionCall);
        if self.opaque || count == 1 {
            return Ok(());
        }
        Err(ConfigurationError::ActionCount {
            route: self.route.clone().unwrap_or_else(|| self.id.to_string()),
            count,
        })
    }

    /// Ends the build phase for this chain.
    pub fn freeze(self) -> FrozenChain {
        let nodes: Vec<ChainNode> = self.iter().cloned().collect();
        FrozenChain {
            id: self.id,
            route: self.route,
            opaque: self.opaque,
            nodes: nodes.into(),
        }
    }
}

impl Default for BehaviorChain {
    fn default() -> Self {
        Self::new()
    }
}

/// The dispatch-phase form of a chain: an immutable, shareable sequence.
#[derive(Debug, Clone)]
pub struct FrozenChain {
    id: Uuid,
    route: Option<String>,
    opaque: bool,
    nodes: Arc<[ChainNode]>,
}

impl FrozenChain {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn nodes(&self) -> &[ChainNode] {
        &self.nodes
    }

    pub fn top(&self) -> Option<&ChainNode> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::nodes::{ActionCall, CachingNode, InputNode, OutputNode};
    use crate::core::resource::ResourceType;

    fn call() -> ActionCall {
        ActionCall::from_fn("Home", "index", |_| Ok(None))
    }

    fn kinds(chain: &BehaviorChain) -> Vec<NodeKind> {
        chain.iter().map(ChainNode::kind).collect()
    }

    #[test]
    fn test_append_and_prepend() {
        let mut chain = BehaviorChain::for_route("home");
        chain.append(call());
        chain.append(OutputNode::new(ResourceType::string()));
        chain.prepend(InputNode::new(ResourceType::string()));

        assert_eq!(kinds(&chain), vec![NodeKind::Input, NodeKind::ActionCall, NodeKind::Output]);
        assert_eq!(chain.len(), 3);
        let top = chain.top().unwrap();
        assert!(chain.node(top).unwrap().is(NodeKind::Input));
    }

    #[test]
    fn test_insert_after_and_before() {
        let mut chain = BehaviorChain::new();
        let action = chain.append(call());
        chain.insert_before(action, InputNode::new(ResourceType::string()));
        chain.insert_after(action, OutputNode::new(ResourceType::string()));
        chain.insert_before(chain.top().unwrap(), CachingNode::new());

        assert_eq!(
            kinds(&chain),
            vec![NodeKind::Caching, NodeKind::Input, NodeKind::ActionCall, NodeKind::Output]
        );
        assert_eq!(chain.find(NodeKind::ActionCall), Some(action));
    }

    #[test]
    fn test_foreign_anchor_is_rejected() {
        let mut other = BehaviorChain::new();
        let foreign = other.append(call());

        let mut chain = BehaviorChain::for_route("home");
        chain.append(InputNode::new(ResourceType::string()));
        chain.append(call());

        assert!(!chain.owns(foreign));
        assert_eq!(chain.insert_after(foreign, CachingNode::new()), None);
        assert_eq!(chain.insert_before(foreign, CachingNode::new()), None);
        assert!(chain.node(foreign).is_none());
        assert!(chain.next(foreign).is_none());
        assert_eq!(kinds(&chain), vec![NodeKind::Input, NodeKind::ActionCall]);
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_check_counts_action_calls() {
        let mut chain = BehaviorChain::for_route("twice");
        chain.append(call());
        chain.append(call());
        assert_eq!(
            chain.check(),
            Err(ConfigurationError::ActionCount {
                route: "twice".to_string(),
                count: 2,
            })
        );

        let mut opaque = BehaviorChain::for_route("_content");
        opaque.mark_opaque();
        opaque.append(CachingNode::new());
        assert!(opaque.check().is_ok());
    }

    #[test]
    fn test_freeze_keeps_order_and_identity() {
        let mut chain = BehaviorChain::for_route("home");
        let action = chain.append(call());
        chain.insert_before(action, InputNode::new(ResourceType::string()));
        let id = chain.id();

        let frozen = chain.freeze();
        assert_eq!(frozen.id(), id);
        assert_eq!(frozen.route(), Some("home"));
        assert_eq!(
            frozen.nodes().iter().map(ChainNode::kind).collect::<Vec<_>>(),
            vec![NodeKind::Input, NodeKind::ActionCall]
        );
    }

    #[test]
    fn test_chains_get_distinct_ids() {
        assert_ne!(BehaviorChain::new().id(), BehaviorChain::new().id());
    }
}
