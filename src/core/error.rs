use crate::core::descriptor::Capability;
use crate::core::resource::ResourceType;
use thiserror::Error;

/// Registration data that cannot be turned into a valid behavior graph.
/// Always fatal to startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("resource type required for open generic {} {implementation}", .capability.role())]
    ResourceTypeRequired {
        implementation: String,
        capability: Capability,
    },

    #[error("{} type {implementation} must implement the {capability} capability", .capability.role())]
    MissingCapability {
        implementation: String,
        capability: Capability,
    },

    #[error("{implementation} implements the {capability} capability for several resource types: {candidates:?}")]
    AmbiguousCapability {
        implementation: String,
        capability: Capability,
        candidates: Vec<String>,
    },

    #[error("{implementation} does not serve resource type {expected}")]
    ResourceTypeMismatch {
        implementation: String,
        expected: String,
    },

    #[error("policy '{policy}' references unknown behavior type '{behavior}'")]
    UnknownBehavior { policy: String, behavior: String },

    #[error("route '{0}' is registered more than once")]
    DuplicateRoute(String),

    #[error("chain for route '{route}' has {count} action calls, expected exactly one")]
    ActionCount { route: String, count: usize },

    #[error("graph validation failed: {0}")]
    Invalid(String),
}

/// Negotiation failures. `NotAcceptable` and `UnsupportedMediaType` are client
/// facing; `NoWriterConfigured` is a configuration problem surfaced late.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnegError {
    #[error("no writer or reader is configured for resource type {resource_type}")]
    NoWriterConfigured { resource_type: ResourceType },

    #[error("none of [{}] can be produced for {resource_type}", .accepted.join(", "))]
    NotAcceptable {
        resource_type: ResourceType,
        accepted: Vec<String>,
    },

    #[error("content type '{content_type}' cannot be read into {resource_type}")]
    UnsupportedMediaType {
        resource_type: ResourceType,
        content_type: String,
    },
}

impl ConnegError {
    /// The conventional HTTP status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ConnegError::NoWriterConfigured { .. } => 500,
            ConnegError::NotAcceptable { .. } => 406,
            ConnegError::UnsupportedMediaType { .. } => 415,
        }
    }
}

/// Failures turning an `ObjectDef` into a live instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("no constructor registered for {0}")]
    UnknownImplementation(String),

    #[error("{implementation} requires a '{dependency}' dependency")]
    MissingDependency {
        implementation: String,
        dependency: String,
    },

    #[error("{implementation} did not build a {expected}")]
    WrongKind {
        implementation: String,
        expected: &'static str,
    },
}

/// Errors raised while a request flows through a frozen chain.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no chain is registered for route '{0}'")]
    UnknownRoute(String),

    #[error(transparent)]
    Conneg(#[from] ConnegError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("action {action} failed: {message}")]
    Action { action: String, message: String },

    #[error("could not write {mimetype}: {message}")]
    Write { mimetype: String, message: String },

    #[error("could not read {mimetype}: {message}")]
    Read { mimetype: String, message: String },

    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::UnknownRoute(_) => 404,
            DispatchError::Conneg(e) => e.status_code(),
            DispatchError::Read { .. } => 400,
            _ => 500,
        }
    }
}
