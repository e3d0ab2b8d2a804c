use crate::core::error::ConnegError;
use crate::core::nodes::{ChainNode, NodeKind};
use crate::core::visitor::{self, ChainView, ConfigurationObserver, RecordingObserver, VisitableGraph};
use serde::Serialize;

/// Represents an issue found while validating a behavior graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationIssue {
    /// A hard error: the chain cannot serve requests correctly.
    Error(String),
    /// A warning: the chain works but is probably not what was meant.
    Warning(String),
}

/// The result of a graph validation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Error(msg.into()));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn first_error(&self) -> Option<&str> {
        self.issues.iter().find_map(|i| match i {
            ValidationIssue::Error(msg) => Some(msg.as_str()),
            ValidationIssue::Warning(_) => None,
        })
    }

    pub fn log_summary(&self) {
        if self.is_safe() && !self.has_warnings() {
            log::info!("Behavior graph validation passed");
            return;
        }

        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(msg) => log::error!("{}", msg),
                ValidationIssue::Warning(msg) => log::warn!("{}", msg),
            }
        }
    }
}

/// Checks every chain of `graph` and collects what is wrong with it.
pub fn validate<G: VisitableGraph + ?Sized>(graph: &G) -> ValidationResult {
    let mut observer = RecordingObserver::new();
    visitor::visit(graph, &mut observer, check_chain);
    observer.into_result()
}

fn check_chain(chain: &ChainView<'_>, observer: &mut RecordingObserver) {
    let actions = chain.count(NodeKind::ActionCall);
    if !chain.is_opaque() && actions != 1 {
        observer.record(
            chain,
            ValidationIssue::Error(format!("{} action calls, expected exactly one", actions)),
        );
    }

    let action = chain.first(NodeKind::ActionCall).and_then(ChainNode::as_action_call);
    let output = chain.first(NodeKind::Output).and_then(ChainNode::as_output);

    match (action.and_then(|a| a.output_type()), output) {
        (Some(returned), None) => observer.record(
            chain,
            ValidationIssue::Warning(format!(
                "{} returns {} but the chain has no output node",
                action.map(|a| a.signature()).unwrap_or_default(),
                returned
            )),
        ),
        (Some(returned), Some(output)) if returned != output.resource_type() => observer.record(
            chain,
            ValidationIssue::Error(format!(
                "action returns {} but the output node writes {}",
                returned,
                output.resource_type()
            )),
        ),
        _ => {}
    }

    if let Some(output) = output {
        if !output.has_writers() {
            let missing = ConnegError::NoWriterConfigured {
                resource_type: output.resource_type().clone(),
            };
            observer.record(chain, ValidationIssue::Error(missing.to_string()));
        }
        for writer in output.writers().iter().filter(|w| w.mimetypes().is_empty()) {
            observer.record(
                chain,
                ValidationIssue::Warning(format!(
                    "writer {} declares no mime types and is only chosen for */*",
                    writer
                )),
            );
        }
    }

    if chain.nodes().last().is_some_and(|n| n.is(NodeKind::Wrapper)) {
        observer.record(
            chain,
            ValidationIssue::Warning("the last node is a wrapper with nothing to wrap".to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::BehaviorChain;
    use crate::core::descriptor::MediaDescriptor;
    use crate::core::graph::BehaviorGraph;
    use crate::core::nodes::{ActionCall, BehaviorType, OutputNode, Wrapper};
    use crate::core::resource::ResourceType;
    use std::sync::Arc;

    #[test]
    fn test_clean_graph_is_safe() {
        let mut graph = BehaviorGraph::new();
        let chain = graph.add_chain(BehaviorChain::for_route("hello"));
        chain.append(ActionCall::from_fn("Hello", "say", |_| Ok(None)).with_output(ResourceType::string()));
        let mut output = OutputNode::new(ResourceType::string());
        output.add_writer(Arc::new(MediaDescriptor::write_string())).unwrap();
        chain.append(output);

        let result = validate(&graph);
        assert!(result.is_safe());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_reports_missing_writers_and_action_count() {
        let mut graph = BehaviorGraph::new();
        let chain = graph.add_chain(BehaviorChain::for_route("orders"));
        chain.append(OutputNode::new(ResourceType::new("shop", "Order")));

        let result = validate(&graph);
        assert!(!result.is_safe());
        assert_eq!(
            result.issues,
            vec![
                ValidationIssue::Error("orders: 0 action calls, expected exactly one".to_string()),
                ValidationIssue::Error(
                    "orders: no writer or reader is configured for resource type shop::Order".to_string()
                ),
            ]
        );
        assert_eq!(result.first_error(), Some("orders: 0 action calls, expected exactly one"));
    }

    #[test]
    fn test_warns_about_dangling_wrapper_and_missing_output() {
        let mut graph = BehaviorGraph::new();
        let chain = graph.add_chain(BehaviorChain::for_route("orders"));
        chain.append(ActionCall::from_fn("Orders", "list", |_| Ok(None)).with_output(ResourceType::string()));
        chain.append(Wrapper::new(BehaviorType::new("Audit", |inner| inner)));

        let result = validate(&graph);
        assert!(result.is_safe());
        assert_eq!(result.issues.len(), 2);
        assert!(result.has_warnings());
    }
}
