//! Read-only traversal of a behavior graph for diagnostics and tooling.
//!
//! Chains are visited in graph order and each one is handed to the
//! callbacks as a [`ChainView`]: its identity plus its nodes materialized
//! head to tail. Callbacks decide for themselves which chains to skip.

use crate::core::nodes::{ChainNode, NodeKind};
use crate::core::validation::{ValidationIssue, ValidationResult};
use serde::Serialize;
use uuid::Uuid;

/// One chain as seen by a visitor.
#[derive(Debug, Clone)]
pub struct ChainView<'a> {
    id: Uuid,
    route: Option<&'a str>,
    opaque: bool,
    nodes: Vec<&'a ChainNode>,
}

impl<'a> ChainView<'a> {
    pub fn new(id: Uuid, route: Option<&'a str>, opaque: bool, nodes: Vec<&'a ChainNode>) -> Self {
        Self {
            id,
            route,
            opaque,
            nodes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn route(&self) -> Option<&'a str> {
        self.route
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// Nodes from head to tail.
    pub fn nodes(&self) -> &[&'a ChainNode] {
        &self.nodes
    }

    pub fn top(&self) -> Option<&'a ChainNode> {
        self.nodes.first().copied()
    }

    /// The node following the one at `index`.
    pub fn next_of(&self, index: usize) -> Option<&'a ChainNode> {
        self.nodes.get(index + 1).copied()
    }

    pub fn first(&self, kind: NodeKind) -> Option<&'a ChainNode> {
        self.nodes.iter().copied().find(|n| n.is(kind))
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.is(kind)).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The route, or the chain id for routeless chains.
    pub fn label(&self) -> String {
        self.route.map(str::to_string).unwrap_or_else(|| self.id.to_string())
    }
}

/// A graph whose chains can be visited in a stable order.
pub trait VisitableGraph {
    fn chain_views(&self) -> Vec<ChainView<'_>>;
}

/// Receives findings while a graph is visited.
pub trait ConfigurationObserver {
    fn is_recording(&self) -> bool {
        false
    }

    fn record(&mut self, chain: &ChainView<'_>, issue: ValidationIssue);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NulloObserver;

impl ConfigurationObserver for NulloObserver {
    fn record(&mut self, _chain: &ChainView<'_>, _issue: ValidationIssue) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedIssue {
    pub chain: String,
    pub issue: ValidationIssue,
}

/// Keeps every finding in the order it was recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    entries: Vec<ObservedIssue>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ObservedIssue] {
        &self.entries
    }

    pub fn into_result(self) -> ValidationResult {
        let mut result = ValidationResult::new();
        for entry in self.entries {
            match entry.issue {
                ValidationIssue::Error(msg) => result.add_error(format!("{}: {}", entry.chain, msg)),
                ValidationIssue::Warning(msg) => result.add_warning(format!("{}: {}", entry.chain, msg)),
            }
        }
        result
    }
}

impl ConfigurationObserver for RecordingObserver {
    fn is_recording(&self) -> bool {
        true
    }

    fn record(&mut self, chain: &ChainView<'_>, issue: ValidationIssue) {
        self.entries.push(ObservedIssue {
            chain: chain.label(),
            issue,
        });
    }
}

type VisitAction<'a, O> = Box<dyn FnMut(&ChainView<'_>, &mut O) + 'a>;

/// Runs a list of callbacks over every chain of a graph.
pub struct BehaviorVisitor<'a, O: ConfigurationObserver> {
    observer: O,
    reason: String,
    actions: Vec<VisitAction<'a, O>>,
}

impl<'a, O: ConfigurationObserver> BehaviorVisitor<'a, O> {
    pub fn new(observer: O, reason: impl Into<String>) -> Self {
        Self {
            observer,
            reason: reason.into(),
            actions: Vec::new(),
        }
    }

    pub fn add_action<F>(&mut self, action: F) -> &mut Self
    where
        F: FnMut(&ChainView<'_>, &mut O) + 'a,
    {
        self.actions.push(Box::new(action));
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }

    /// Visits every chain once. Returns the number of chains visited.
    pub fn visit<G: VisitableGraph + ?Sized>(&mut self, graph: &G) -> usize {
        let views = graph.chain_views();
        log::debug!("Visiting {} chains: {}", views.len(), self.reason);
        for view in &views {
            for action in self.actions.iter_mut() {
                action(view, &mut self.observer);
            }
        }
        views.len()
    }
}

/// Single-callback shorthand for [`BehaviorVisitor`].
pub fn visit<G, O, F>(graph: &G, observer: &mut O, mut callback: F) -> usize
where
    G: VisitableGraph + ?Sized,
    O: ConfigurationObserver + ?Sized,
    F: FnMut(&ChainView<'_>, &mut O),
{
    let views = graph.chain_views();
    for view in &views {
        callback(view, observer);
    }
    views.len()
}
