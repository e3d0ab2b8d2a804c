//! Request dispatch over a frozen graph.
//!
//! A frozen chain is folded from tail to head into nested behaviors, each
//! holding the behavior that follows it. Everything a request produces lives
//! in its own [`RequestContext`].

use crate::core::chain::FrozenChain;
use crate::core::conneg;
use crate::core::container::Container;
use crate::core::descriptor::MediaDescriptor;
use crate::core::error::{ConnegError, DispatchError};
use crate::core::graph::FrozenGraph;
use crate::core::mime::AcceptList;
use crate::core::nodes::{ActionCall, CachingNode, ChainNode, InputNode, OutputNode};
use crate::core::resource::ResourceValue;
use async_trait::async_trait;
use futures::stream::{FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// What the HTTP-facing collaborator gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub mimetype: String,
    pub body: String,
}

impl Response {
    pub fn ok(mimetype: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            mimetype: mimetype.into(),
            body: body.into(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            mimetype: String::new(),
            body: String::new(),
        }
    }
}

/// Request-scoped state. Never shared between requests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    pub route_values: serde_json::Map<String, ResourceValue>,
    pub headers: HashMap<String, String>,
    pub accept: AcceptList,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub input: Option<ResourceValue>,
    pub output: Option<ResourceValue>,
    pub response: Option<Response>,
    /// Labels pushed by each behavior as it runs, outermost first.
    pub trace: Vec<String>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the `Accept` header and the parsed preference list.
    pub fn with_accept(mut self, header: &str) -> Self {
        self.accept = AcceptList::parse(header);
        self.headers.insert("accept".to_string(), header.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.headers.insert("content-type".to_string(), content_type.clone());
        self.content_type = Some(content_type);
        self.body = Some(body.into());
        self
    }

    pub fn with_route_value(mut self, name: impl Into<String>, value: impl Into<ResourceValue>) -> Self {
        self.route_values.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// One live step of a materialized chain.
#[async_trait]
pub trait ActionBehavior: Send + Sync {
    async fn invoke(&self, request: &mut RequestContext) -> Result<(), DispatchError>;
}

/// The endpoint code an action call node invokes.
#[async_trait]
pub trait Action: Send + Sync {
    async fn call(&self, input: Option<ResourceValue>) -> Result<Option<ResourceValue>, String>;
}

/// Adapts a synchronous function into an [`Action`].
pub struct FnAction<F> {
    f: F,
}

impl<F> FnAction<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(Option<ResourceValue>) -> Result<Option<ResourceValue>, String> + Send + Sync,
{
    async fn call(&self, input: Option<ResourceValue>) -> Result<Option<ResourceValue>, String> {
        (self.f)(input)
    }
}

/// Storage behind caching nodes.
#[async_trait]
pub trait OutputCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Response>;
    async fn store(&self, key: String, response: Response);
}

/// Process-local output cache.
#[derive(Default)]
pub struct InMemoryOutputCache {
    entries: RwLock<HashMap<String, Response>>,
}

impl InMemoryOutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl OutputCache for InMemoryOutputCache {
    async fn get(&self, key: &str) -> Option<Response> {
        self.entries.read().await.get(key).cloned()
    }

    async fn store(&self, key: String, response: Response) {
        self.entries.write().await.insert(key, response);
    }
}

async fn invoke_inner(
    inner: &Option<Arc<dyn ActionBehavior>>,
    request: &mut RequestContext,
) -> Result<(), DispatchError> {
    match inner {
        Some(inner) => inner.invoke(request).await,
        None => Ok(()),
    }
}

struct InputBehavior {
    node: InputNode,
    container: Arc<Container>,
    inner: Option<Arc<dyn ActionBehavior>>,
}

#[async_trait]
impl ActionBehavior for InputBehavior {
    async fn invoke(&self, request: &mut RequestContext) -> Result<(), DispatchError> {
        let bound = match &request.body {
            Some(body) => {
                let descriptor = self.node.resolve_reader(request.content_type.as_deref())?;
                let reader = self.container.build_reader(&descriptor.to_object_def())?;
                let mimetype = request
                    .content_type
                    .clone()
                    .or_else(|| descriptor.mimetypes().first().map(str::to_string))
                    .unwrap_or_default();
                reader.read(&mimetype, body)?
            }
            _ => ResourceValue::Object(request.route_values.clone()),
        };

        request.trace.push(format!("input {}", self.node.input_type().name()));
        request.input = Some(bound);
        invoke_inner(&self.inner, request).await
    }
}

struct ActionCallBehavior {
    call: ActionCall,
    inner: Option<Arc<dyn ActionBehavior>>,
}

#[async_trait]
impl ActionBehavior for ActionCallBehavior {
    async fn invoke(&self, request: &mut RequestContext) -> Result<(), DispatchError> {
        request.trace.push(format!("action {}", self.call.signature()));
        let output = self
            .call
            .action()
            .call(request.input.clone())
            .await
            .map_err(|message| DispatchError::Action {
                action: self.call.signature(),
                message,
            })?;
        request.output = output;
        invoke_inner(&self.inner, request).await
    }
}

/// The writer an output node picks for `request`, and the MIME type it
/// answers with. Writers whose condition rejects the request are skipped.
fn negotiate(node: &OutputNode, request: &RequestContext) -> Result<(Arc<MediaDescriptor>, String), DispatchError> {
    let candidates: Vec<_> = node
        .writers()
        .iter()
        .filter(|w| w.condition().applies(request))
        .cloned()
        .collect();

    if candidates.is_empty() && node.has_writers() {
        return Err(ConnegError::NotAcceptable {
            resource_type: node.resource_type().clone(),
            accepted: request.accept.as_slice().to_vec(),
        }
        .into());
    }

    let descriptor = Arc::clone(conneg::resolve(
        node.resource_type(),
        &candidates,
        request.accept.as_slice(),
    )?);

    let mimetype = request
        .accept
        .iter()
        .find(|m| descriptor.mimetypes().contains(m))
        .or_else(|| descriptor.mimetypes().first())
        .unwrap_or("application/octet-stream")
        .to_string();
    Ok((descriptor, mimetype))
}

struct OutputBehavior {
    node: OutputNode,
    container: Arc<Container>,
    inner: Option<Arc<dyn ActionBehavior>>,
}

#[async_trait]
impl ActionBehavior for OutputBehavior {
    async fn invoke(&self, request: &mut RequestContext) -> Result<(), DispatchError> {
        let (descriptor, mimetype) = negotiate(&self.node, request)?;
        let writer = self.container.build_writer(&descriptor.to_object_def())?;

        let resource = request.output.clone().unwrap_or(ResourceValue::Null);
        let body = writer.write(&mimetype, &resource)?;

        request.trace.push(format!("output {} as {}", descriptor, mimetype));
        request.response = Some(Response::ok(mimetype, body));
        invoke_inner(&self.inner, request).await
    }
}

struct CachingBehavior {
    chain_id: Uuid,
    node: CachingNode,
    /// The chain's output node. Stored responses are keyed by what it
    /// negotiates, so every client still gets its own representation.
    output: Option<OutputNode>,
    container: Arc<Container>,
    inner: Option<Arc<dyn ActionBehavior>>,
}

impl CachingBehavior {
    fn key(&self, request: &RequestContext) -> Result<String, DispatchError> {
        let mut key = format!("{}:{}", self.chain_id, request.path);
        for header in self.node.vary_by_headers() {
            key.push('|');
            key.push_str(request.header(header).unwrap_or_default());
        }
        if let Some(output) = &self.output {
            let (descriptor, mimetype) = negotiate(output, request)?;
            key.push_str(&format!("|{} as {}", descriptor, mimetype));
        }
        Ok(key)
    }
}

#[async_trait]
impl ActionBehavior for CachingBehavior {
    async fn invoke(&self, request: &mut RequestContext) -> Result<(), DispatchError> {
        let key = match self.key(request) {
            Ok(key) => key,
            Err(e) => {
                // Nothing cacheable; the output node reports the failure.
                log::debug!("Bypassing the output cache for {}: {}", request.path, e);
                request.trace.push("cache bypass".to_string());
                return invoke_inner(&self.inner, request).await;
            }
        };
        let cache = self.container.output_cache();

        if let Some(cached) = cache.get(&key).await {
            log::debug!("Serving {} from the output cache", request.path);
            request.trace.push("cache hit".to_string());
            request.response = Some(cached);
            return Ok(());
        }

        request.trace.push("cache miss".to_string());
        invoke_inner(&self.inner, request).await?;
        if let Some(response) = &request.response {
            cache.store(key, response.clone()).await;
        }
        Ok(())
    }
}

struct Nullo;

#[async_trait]
impl ActionBehavior for Nullo {
    async fn invoke(&self, _request: &mut RequestContext) -> Result<(), DispatchError> {
        Ok(())
    }
}

/// Builds the live behavior stack for a frozen chain.
pub fn materialize(chain: &FrozenChain, container: &Arc<Container>) -> Arc<dyn ActionBehavior> {
    let mut inner: Option<Arc<dyn ActionBehavior>> = None;

    for node in chain.nodes().iter().rev() {
        let behavior: Arc<dyn ActionBehavior> = match node {
            ChainNode::Input(node) => Arc::new(InputBehavior {
                node: node.clone(),
                container: Arc::clone(container),
                inner: inner.take(),
            }),
            ChainNode::ActionCall(call) => Arc::new(ActionCallBehavior {
                call: call.clone(),
                inner: inner.take(),
            }),
            ChainNode::Output(node) => Arc::new(OutputBehavior {
                node: node.clone(),
                container: Arc::clone(container),
                inner: inner.take(),
            }),
            ChainNode::Wrapper(wrapper) => {
                let wrapped = inner.take().unwrap_or_else(|| Arc::new(Nullo));
                wrapper.behavior_type().wrap(wrapped)
            }
            ChainNode::Caching(node) => Arc::new(CachingBehavior {
                chain_id: chain.id(),
                node: node.clone(),
                output: chain.nodes().iter().find_map(ChainNode::as_output).cloned(),
                container: Arc::clone(container),
                inner: inner.take(),
            }),
        };
        inner = Some(behavior);
    }

    inner.unwrap_or_else(|| Arc::new(Nullo))
}

/// Runs requests through a frozen graph.
///
/// Cheap to clone and safe to share across tasks: the graph and container
/// are only read.
#[derive(Clone)]
pub struct Dispatcher {
    graph: Arc<FrozenGraph>,
    container: Arc<Container>,
}

impl Dispatcher {
    pub fn new(graph: FrozenGraph, container: Container) -> Self {
        Self::from_shared(Arc::new(graph), Arc::new(container))
    }

    pub fn from_shared(graph: Arc<FrozenGraph>, container: Arc<Container>) -> Self {
        Self { graph, container }
    }

    pub fn graph(&self) -> &FrozenGraph {
        &self.graph
    }

    /// Dispatches one request through the chain registered for `route`,
    /// returning the response and the finished request context.
    pub async fn dispatch_with_context(
        &self,
        route: &str,
        mut request: RequestContext,
    ) -> Result<(Response, RequestContext), DispatchError> {
        let chain = self
            .graph
            .chain_for(route)
            .ok_or_else(|| DispatchError::UnknownRoute(route.to_string()))?;

        let behavior = materialize(chain, &self.container);
        if let Err(e) = behavior.invoke(&mut request).await {
            log::warn!("Request to {} failed with {}: {}", route, e.status_code(), e);
            return Err(e);
        }

        let response = request.response.clone().unwrap_or_else(Response::no_content);
        Ok((response, request))
    }

    pub async fn dispatch(&self, route: &str, request: RequestContext) -> Result<Response, DispatchError> {
        self.dispatch_with_context(route, request)
            .await
            .map(|(response, _)| response)
    }

    /// Dispatches several requests concurrently. Results come back in the
    /// order the requests were given.
    pub async fn dispatch_all<I, S>(&self, requests: I) -> Vec<Result<Response, DispatchError>>
    where
        I: IntoIterator<Item = (S, RequestContext)>,
        S: AsRef<str>,
    {
        let mut pending: FuturesOrdered<_> = requests
            .into_iter()
            .map(|(route, request)| async move { self.dispatch(route.as_ref(), request).await })
            .collect();

        let mut responses = Vec::new();
        while let Some(response) = pending.next().await {
            responses.push(response);
        }
        responses
    }
}
