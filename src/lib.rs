//! # Cinnabar
//!
//! A composable behavior-chain and content-negotiation engine for web endpoints.
//!
//! ## Features
//!
//! - **Behavior Chains**: Every route gets a chain of input binding, action call and output nodes
//! - **Policies**: Wrap whole groups of chains with cross-cutting behaviors after registration
//! - **Content Negotiation**: Pick a writer from the client's `Accept` list, deterministically
//! - **Descriptors**: Open generic writers and readers are closed over a resource type at startup
//! - **Frozen Graphs**: Dispatch reads an immutable graph, so it is safe to share across tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cinnabar::prelude::*;
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = Registry::new();
//! registry
//!     .route("orders/{id}")
//!     .calls(
//!         ActionCall::from_fn("Orders", "show", |_| Ok(Some(json!({ "id": 7 }))))
//!             .with_output(ResourceType::new("shop", "Order")),
//!     )
//!     .output_to_json();
//!
//! let graph = BehaviorGraph::build_from(&registry)?.freeze();
//! let dispatcher = Dispatcher::new(graph, Container::with_defaults());
//!
//! let request = RequestContext::new("orders/7").with_accept("application/json");
//! let response = dispatcher.dispatch("orders/{id}", request).await?;
//! assert_eq!(response.body, r#"{"id":7}"#);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`conneg`]: The writer and reader selection rules
//! - [`media`]: Built-in writers and readers
//! - [`prelude`]: Commonly used types and traits (import with `use cinnabar::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

pub use crate::core::{conneg, media};

// Resources and media types
pub use crate::core::describe::{DescribesItself, Description};
pub use crate::core::mime::{AcceptList, DeclaresMimeTypes, MimeType, MimeTypeSet};
pub use crate::core::resource::{ResourceType, ResourceValue};

// Descriptors and construction
pub use crate::core::container::{Container, ObjectDef};
pub use crate::core::descriptor::{
    Capability, ClosedCapability, Condition, GenericTemplate, Implementation, ImplementationRef,
    MediaDescriptor, build_concrete, find_capability,
};
pub use crate::core::media::{MediaReader, MediaWriter};
pub use crate::core::view::{StaticViewToken, ViewFactory, ViewToken};

// Chains and graphs
pub use crate::core::chain::{BehaviorChain, FrozenChain, NodeId};
pub use crate::core::graph::{BehaviorGraph, ChainReport, FrozenGraph, GraphOptions, NodeReport};
pub use crate::core::nodes::{
    ActionCall, BehaviorType, CachingNode, ChainNode, InputNode, NodeKind, OutputNode, Wrapper,
};
pub use crate::core::policy::{ChainFilter, ChainPolicy, PolicyDefinition, WrapWith, wrap_chain};
pub use crate::core::registry::{RegistrationSource, Registry, RouteDefinition};

// Inspection
pub use crate::core::validation::{ValidationIssue, ValidationResult, validate};
pub use crate::core::visitor::{
    BehaviorVisitor, ChainView, ConfigurationObserver, NulloObserver, ObservedIssue,
    RecordingObserver, VisitableGraph, visit,
};

// Dispatch
pub use crate::core::runtime::{
    Action, ActionBehavior, Dispatcher, FnAction, InMemoryOutputCache, OutputCache,
    RequestContext, Response, materialize,
};

// Errors
pub use crate::core::error::{ConfigurationError, ConnegError, ConstructionError, DispatchError};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to register routes, build a graph and
/// dispatch requests through it.
///
/// # Example
/// ```rust
/// use cinnabar::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Dispatch
        Action,
        ActionBehavior,
        // Chains
        ActionCall,
        BehaviorChain,
        BehaviorGraph,
        BehaviorType,
        Condition,
        // Errors
        ConfigurationError,
        ConnegError,
        Container,
        DispatchError,
        Dispatcher,
        FrozenGraph,
        // Descriptors
        GenericTemplate,
        Implementation,
        MediaDescriptor,
        MimeType,
        NodeKind,
        RequestContext,
        ResourceType,
        ResourceValue,
        Response,
        // Registration
        Registry,
        StaticViewToken,
        ViewFactory,
        ViewToken,
        WrapWith,
    };
}

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
