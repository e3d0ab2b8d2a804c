//! The node kinds a behavior chain is assembled from.

use crate::core::conneg;
use crate::core::describe::{Description, DescribesItself};
use crate::core::descriptor::{Capability, MediaDescriptor};
use crate::core::error::{ConfigurationError, ConnegError};
use crate::core::mime::MimeTypeSet;
use crate::core::resource::{ResourceType, ResourceValue};
use crate::core::runtime::{Action, ActionBehavior, FnAction};
use std::fmt;
use std::sync::Arc;

/// Binds the request body (or route values) into the action's input type.
#[derive(Debug, Clone)]
pub struct InputNode {
    input_type: ResourceType,
    readers: Vec<Arc<MediaDescriptor>>,
}

impl InputNode {
    pub fn new(input_type: ResourceType) -> Self {
        Self {
            input_type,
            readers: Vec::new(),
        }
    }

    pub fn add_reader(&mut self, reader: Arc<MediaDescriptor>) -> Result<(), ConfigurationError> {
        check_member(&self.input_type, Capability::MediaReader, &reader)?;
        self.readers.push(reader);
        Ok(())
    }

    pub fn input_type(&self) -> &ResourceType {
        &self.input_type
    }

    pub fn readers(&self) -> &[Arc<MediaDescriptor>] {
        &self.readers
    }

    pub fn mimetypes(&self) -> MimeTypeSet {
        union_of(&self.readers)
    }

    pub fn resolve_reader(&self, content_type: Option<&str>) -> Result<&Arc<MediaDescriptor>, ConnegError> {
        conneg::resolve_reader(&self.input_type, &self.readers, content_type)
    }
}

/// Writes the action's output, negotiating among its writers.
#[derive(Debug, Clone)]
pub struct OutputNode {
    resource_type: ResourceType,
    writers: Vec<Arc<MediaDescriptor>>,
}

impl OutputNode {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            writers: Vec::new(),
        }
    }

    /// Writers are negotiated in the order they are added.
    pub fn add_writer(&mut self, writer: Arc<MediaDescriptor>) -> Result<(), ConfigurationError> {
        check_member(&self.resource_type, Capability::MediaWriter, &writer)?;
        self.writers.push(writer);
        Ok(())
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn writers(&self) -> &[Arc<MediaDescriptor>] {
        &self.writers
    }

    pub fn has_writers(&self) -> bool {
        !self.writers.is_empty()
    }

    /// Every MIME type this node can produce, in negotiation order.
    pub fn mimetypes(&self) -> MimeTypeSet {
        union_of(&self.writers)
    }

    pub fn resolve_writer(&self, accepted: &[String]) -> Result<&Arc<MediaDescriptor>, ConnegError> {
        conneg::resolve(&self.resource_type, &self.writers, accepted)
    }
}

fn check_member(
    resource_type: &ResourceType,
    capability: Capability,
    descriptor: &MediaDescriptor,
) -> Result<(), ConfigurationError> {
    if descriptor.capability() != capability {
        return Err(ConfigurationError::MissingCapability {
            implementation: descriptor.implementation().full_name(),
            capability,
        });
    }
    if descriptor.resource_type() != resource_type {
        return Err(ConfigurationError::ResourceTypeMismatch {
            implementation: descriptor.implementation().full_name(),
            expected: resource_type.full_name(),
        });
    }
    Ok(())
}

fn union_of(descriptors: &[Arc<MediaDescriptor>]) -> MimeTypeSet {
    descriptors
        .iter()
        .flat_map(|d| d.mimetypes().iter().map(str::to_string).collect::<Vec<_>>())
        .collect()
}

/// A call into the endpoint's action.
#[derive(Clone)]
pub struct ActionCall {
    handler_type: String,
    method: String,
    input_type: Option<ResourceType>,
    output_type: Option<ResourceType>,
    action: Arc<dyn Action>,
}

impl ActionCall {
    pub fn new<A: Action + 'static>(handler_type: impl Into<String>, method: impl Into<String>, action: A) -> Self {
        Self {
            handler_type: handler_type.into(),
            method: method.into(),
            input_type: None,
            output_type: None,
            action: Arc::new(action),
        }
    }

    /// Wraps a synchronous function as the action.
    pub fn from_fn<F>(handler_type: impl Into<String>, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<ResourceValue>) -> Result<Option<ResourceValue>, String> + Send + Sync + 'static,
    {
        Self::new(handler_type, method, FnAction::new(f))
    }

    pub fn with_input(mut self, input_type: ResourceType) -> Self {
        self.input_type = Some(input_type);
        self
    }

    pub fn with_output(mut self, output_type: ResourceType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn handler_type(&self) -> &str {
        &self.handler_type
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn input_type(&self) -> Option<&ResourceType> {
        self.input_type.as_ref()
    }

    pub fn output_type(&self) -> Option<&ResourceType> {
        self.output_type.as_ref()
    }

    pub fn action(&self) -> &Arc<dyn Action> {
        &self.action
    }

    /// `Handler.method()`, used in logs and errors.
    pub fn signature(&self) -> String {
        format!("{}.{}()", self.handler_type, self.method)
    }
}

impl fmt::Debug for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCall")
            .field("handler_type", &self.handler_type)
            .field("method", &self.method)
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

type WrapFn = Arc<dyn Fn(Arc<dyn ActionBehavior>) -> Arc<dyn ActionBehavior> + Send + Sync>;

/// A named behavior that wraps everything after it in the chain.
#[derive(Clone)]
pub struct BehaviorType {
    name: String,
    wrap: WrapFn,
}

impl BehaviorType {
    pub fn new<F>(name: impl Into<String>, wrap: F) -> Self
    where
        F: Fn(Arc<dyn ActionBehavior>) -> Arc<dyn ActionBehavior> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the live behavior around `inner`.
    pub fn wrap(&self, inner: Arc<dyn ActionBehavior>) -> Arc<dyn ActionBehavior> {
        (self.wrap)(inner)
    }
}

impl PartialEq for BehaviorType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for BehaviorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BehaviorType").field(&self.name).finish()
    }
}

/// Policy-inserted wrapper. Its inner node is the node that follows it.
#[derive(Debug, Clone)]
pub struct Wrapper {
    behavior: BehaviorType,
}

impl Wrapper {
    pub fn new(behavior: BehaviorType) -> Self {
        Self { behavior }
    }

    pub fn behavior_type(&self) -> &BehaviorType {
        &self.behavior
    }
}

/// Serves a stored response for repeated requests to the same path.
#[derive(Debug, Clone, Default)]
pub struct CachingNode {
    vary_by: Vec<String>,
}

impl CachingNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request header to the cache key.
    pub fn vary_by(mut self, header: impl Into<String>) -> Self {
        self.vary_by.push(header.into().to_ascii_lowercase());
        self
    }

    pub fn vary_by_headers(&self) -> &[String] {
        &self.vary_by
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    ActionCall,
    Output,
    Wrapper,
    Caching,
}

/// One unit of a behavior chain.
#[derive(Debug, Clone)]
pub enum ChainNode {
    Input(InputNode),
    ActionCall(ActionCall),
    Output(OutputNode),
    Wrapper(Wrapper),
    Caching(CachingNode),
}

impl ChainNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            ChainNode::Input(_) => NodeKind::Input,
            ChainNode::ActionCall(_) => NodeKind::ActionCall,
            ChainNode::Output(_) => NodeKind::Output,
            ChainNode::Wrapper(_) => NodeKind::Wrapper,
            ChainNode::Caching(_) => NodeKind::Caching,
        }
    }

    pub fn is(&self, kind: NodeKind) -> bool {
        self.kind() == kind
    }

    pub fn as_wrapper(&self) -> Option<&Wrapper> {
        match self {
            ChainNode::Wrapper(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_action_call(&self) -> Option<&ActionCall> {
        match self {
            ChainNode::ActionCall(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_output(&self) -> Option<&OutputNode> {
        match self {
            ChainNode::Output(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_output_mut(&mut self) -> Option<&mut OutputNode> {
        match self {
            ChainNode::Output(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_input(&self) -> Option<&InputNode> {
        match self {
            ChainNode::Input(i) => Some(i),
            _ => None,
        }
    }
}

fn joined(set: &MimeTypeSet) -> String {
    if set.is_empty() {
        "no media types".to_string()
    } else {
        set.iter().collect::<Vec<_>>().join(", ")
    }
}

impl DescribesItself for ChainNode {
    fn describe(&self) -> Description {
        match self {
            ChainNode::Input(input) => Description::new(
                format!("Input {}", input.input_type().name()),
                format!(
                    "Binds {} from the request ({})",
                    input.input_type().full_name(),
                    joined(&input.mimetypes())
                ),
            ),
            ChainNode::ActionCall(call) => {
                let input = call.input_type().map(ResourceType::name).unwrap_or("");
                let output = call.output_type().map(ResourceType::name).unwrap_or("()");
                Description::new(
                    call.signature(),
                    format!("Calls {}.{}({}) -> {}", call.handler_type(), call.method(), input, output),
                )
            }
            ChainNode::Output(output) => Description::new(
                format!("Output {}", output.resource_type().name()),
                format!(
                    "Writes {} as {}",
                    output.resource_type().full_name(),
                    joined(&output.mimetypes())
                ),
            ),
            ChainNode::Wrapper(wrapper) => Description::new(
                format!("Wrapper {}", wrapper.behavior_type().name()),
                format!("Wraps the rest of the chain with {}", wrapper.behavior_type().name()),
            ),
            ChainNode::Caching(caching) => {
                let short = if caching.vary_by_headers().is_empty() {
                    "Caches the response of the rest of the chain by path".to_string()
                } else {
                    format!(
                        "Caches the response of the rest of the chain by path and {}",
                        caching.vary_by_headers().join(", ")
                    )
                };
                Description::new("Output Caching", short)
            }
        }
    }
}

impl From<InputNode> for ChainNode {
    fn from(node: InputNode) -> Self {
        ChainNode::Input(node)
    }
}

impl From<ActionCall> for ChainNode {
    fn from(node: ActionCall) -> Self {
        ChainNode::ActionCall(node)
    }
}

impl From<OutputNode> for ChainNode {
    fn from(node: OutputNode) -> Self {
        ChainNode::Output(node)
    }
}

impl From<Wrapper> for ChainNode {
    fn from(node: Wrapper) -> Self {
        ChainNode::Wrapper(node)
    }
}

impl From<CachingNode> for ChainNode {
    fn from(node: CachingNode) -> Self {
        ChainNode::Caching(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media;

    fn order() -> ResourceType {
        ResourceType::new("shop", "Order")
    }

    fn json_for(rt: ResourceType) -> Arc<MediaDescriptor> {
        Arc::new(MediaDescriptor::writer(media::json_writer(), Some(rt)).unwrap())
    }

    #[test]
    fn test_output_node_rejects_other_resource_types() {
        let mut output = OutputNode::new(order());
        output.add_writer(json_for(order())).unwrap();
        let err = output
            .add_writer(Arc::new(MediaDescriptor::write_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ResourceTypeMismatch { .. }));
        assert_eq!(output.writers().len(), 1);
    }

    #[test]
    fn test_output_node_rejects_readers() {
        let mut output = OutputNode::new(order());
        let reader = MediaDescriptor::reader(media::json_reader(), Some(order())).unwrap();
        assert!(output.add_writer(Arc::new(reader)).is_err());
    }

    #[test]
    fn test_output_mimetypes_follow_writer_order() {
        let mut output = OutputNode::new(order());
        let csv = crate::core::descriptor::Implementation::new("shop", "CsvWriter")
            .writes(order())
            .mimetypes(["text/csv", "application/json"]);
        output.add_writer(Arc::new(MediaDescriptor::writer(csv, None).unwrap())).unwrap();
        output.add_writer(json_for(order())).unwrap();

        assert_eq!(
            output.mimetypes().iter().collect::<Vec<_>>(),
            vec!["text/csv", "application/json", "text/json"]
        );
        let winner = output.resolve_writer(&["application/json".to_string()]).unwrap();
        assert_eq!(winner.implementation().name(), "CsvWriter");
    }

    #[test]
    fn test_output_without_writers_reports_no_writer() {
        let output = OutputNode::new(order());
        assert!(!output.has_writers());
        assert!(matches!(
            output.resolve_writer(&["*/*".to_string()]),
            Err(ConnegError::NoWriterConfigured { .. })
        ));
    }

    #[test]
    fn test_node_descriptions() {
        let call = ActionCall::from_fn("OrderController", "show", |_| Ok(None))
            .with_input(ResourceType::new("shop", "OrderQuery"))
            .with_output(order());
        let description = ChainNode::from(call).describe();
        assert_eq!(description.title, "OrderController.show()");
        assert_eq!(description.short_description, "Calls OrderController.show(OrderQuery) -> Order");

        let caching = ChainNode::from(CachingNode::new().vary_by("Accept")).describe();
        assert_eq!(
            caching.short_description,
            "Caches the response of the rest of the chain by path and accept"
        );
    }
}
