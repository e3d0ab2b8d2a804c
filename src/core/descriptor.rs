//! Writer and reader descriptors.
//!
//! A descriptor pairs a resource type with a closed implementation and the
//! MIME types that implementation declares. Implementations are either
//! concrete, in which case the resource type is discovered from the
//! capabilities they declare, or open generic templates that must be closed
//! over an explicit resource type.

use crate::core::container::ObjectDef;
use crate::core::describe::{Description, DescribesItself};
use crate::core::error::ConfigurationError;
use crate::core::media;
use crate::core::mime::{self, DeclaresMimeTypes, MimeType, MimeTypeSet};
use crate::core::resource::ResourceType;
use crate::core::runtime::RequestContext;
use crate::core::view::{VIEW_FACTORY_DEPENDENCY, ViewToken};
use std::fmt;
use std::sync::Arc;

/// The shape of a media capability: writing a resource out or reading one in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    MediaWriter,
    MediaReader,
}

impl Capability {
    pub fn role(&self) -> &'static str {
        match self {
            Capability::MediaWriter => "writer",
            Capability::MediaReader => "reader",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::MediaWriter => f.write_str("media-writer"),
            Capability::MediaReader => f.write_str("media-reader"),
        }
    }
}

/// A capability closed over one resource type, e.g. "writes `Order`".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClosedCapability {
    pub capability: Capability,
    pub resource_type: ResourceType,
}

/// A concrete implementation: a named type, the capabilities it declares and
/// its MIME type metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    namespace: String,
    name: String,
    type_args: Vec<ResourceType>,
    capabilities: Vec<ClosedCapability>,
    mimetypes: MimeTypeSet,
}

impl Implementation {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            type_args: Vec::new(),
            capabilities: Vec::new(),
            mimetypes: MimeTypeSet::new(),
        }
    }

    /// Declares that this implementation writes `resource_type`.
    pub fn writes(mut self, resource_type: ResourceType) -> Self {
        self.capabilities.push(ClosedCapability {
            capability: Capability::MediaWriter,
            resource_type,
        });
        self
    }

    /// Declares that this implementation reads `resource_type`.
    pub fn reads(mut self, resource_type: ResourceType) -> Self {
        self.capabilities.push(ClosedCapability {
            capability: Capability::MediaReader,
            resource_type,
        });
        self
    }

    /// Declares the MIME types this implementation handles.
    pub fn mimetypes<I, S>(mut self, mimetypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for m in mimetypes {
            self.mimetypes.insert(m);
        }
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_args(&self) -> &[ResourceType] {
        &self.type_args
    }

    pub fn capabilities(&self) -> &[ClosedCapability] {
        &self.capabilities
    }

    /// Short name with short generic arguments, e.g. `JsonWriter<Order>`.
    pub fn display_name(&self) -> String {
        self.render(self.name.clone(), |rt| rt.name().to_string())
    }

    /// Fully qualified name, e.g. `cinnabar::media::JsonWriter<shop::Order>`.
    pub fn full_name(&self) -> String {
        let head = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        };
        self.render(head, ResourceType::full_name)
    }

    fn render(&self, head: String, arg: impl Fn(&ResourceType) -> String) -> String {
        if self.type_args.is_empty() {
            return head;
        }
        let args: Vec<String> = self.type_args.iter().map(arg).collect();
        format!("{}<{}>", head, args.join(", "))
    }

    pub fn to_object_def(&self) -> ObjectDef {
        ObjectDef::new(&self.namespace, &self.name).with_type_args(self.type_args.clone())
    }
}

impl DeclaresMimeTypes for Implementation {
    fn declared_mimetypes(&self) -> &MimeTypeSet {
        &self.mimetypes
    }
}

/// An open generic implementation with one type parameter, e.g. `JsonWriter<T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericTemplate {
    namespace: String,
    name: String,
    capability: Capability,
    mimetypes: MimeTypeSet,
}

impl GenericTemplate {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, capability: Capability) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            capability,
            mimetypes: MimeTypeSet::new(),
        }
    }

    pub fn mimetypes<I, S>(mut self, mimetypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for m in mimetypes {
            self.mimetypes.insert(m);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}<T>", self.name)
        } else {
            format!("{}::{}<T>", self.namespace, self.name)
        }
    }
}

impl DeclaresMimeTypes for GenericTemplate {
    fn declared_mimetypes(&self) -> &MimeTypeSet {
        &self.mimetypes
    }
}

/// Closes an open template over a resource type.
pub fn build_concrete(template: &GenericTemplate, type_arg: &ResourceType) -> Implementation {
    Implementation {
        namespace: template.namespace.clone(),
        name: template.name.clone(),
        type_args: vec![type_arg.clone()],
        capabilities: vec![ClosedCapability {
            capability: template.capability,
            resource_type: type_arg.clone(),
        }],
        mimetypes: mime::read_from(template),
    }
}

/// Returns the first capability of the requested shape the implementation
/// declares.
pub fn find_capability(implementation: &Implementation, capability: Capability) -> Option<&ClosedCapability> {
    implementation
        .capabilities
        .iter()
        .find(|c| c.capability == capability)
}

/// Either side of an implementation reference as supplied by registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplementationRef {
    Open(GenericTemplate),
    Concrete(Implementation),
}

impl ImplementationRef {
    pub fn full_name(&self) -> String {
        match self {
            ImplementationRef::Open(t) => t.full_name(),
            ImplementationRef::Concrete(i) => i.full_name(),
        }
    }
}

impl From<GenericTemplate> for ImplementationRef {
    fn from(template: GenericTemplate) -> Self {
        ImplementationRef::Open(template)
    }
}

impl From<Implementation> for ImplementationRef {
    fn from(implementation: Implementation) -> Self {
        ImplementationRef::Concrete(implementation)
    }
}

/// A guard deciding whether a descriptor takes part in negotiation for a
/// given request.
#[derive(Clone)]
pub struct Condition {
    name: String,
    predicate: Option<Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>>,
}

impl Condition {
    pub fn always() -> Self {
        Self {
            name: "Always".to_string(),
            predicate: None,
        }
    }

    pub fn when<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Some(Arc::new(predicate)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applies(&self, request: &RequestContext) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(request))
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::always()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.name).finish()
    }
}

#[derive(Clone)]
enum DescriptorKind {
    Media,
    Text,
    View(Arc<dyn ViewToken>),
}

impl fmt::Debug for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Media => f.write_str("Media"),
            DescriptorKind::Text => f.write_str("Text"),
            DescriptorKind::View(token) => f.debug_tuple("View").field(&token.name()).finish(),
        }
    }
}

/// One candidate writer or reader for a resource type.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    capability: Capability,
    resource_type: ResourceType,
    implementation: Implementation,
    mimetypes: MimeTypeSet,
    condition: Condition,
    kind: DescriptorKind,
}

impl MediaDescriptor {
    /// Builds a writer descriptor. `resource_type` is required for open
    /// generic writers and optional for concrete ones.
    pub fn writer(
        implementation: impl Into<ImplementationRef>,
        resource_type: Option<ResourceType>,
    ) -> Result<Self, ConfigurationError> {
        Self::build(Capability::MediaWriter, implementation.into(), resource_type)
    }

    /// Builds a reader descriptor, with the same rules as [`MediaDescriptor::writer`].
    pub fn reader(
        implementation: impl Into<ImplementationRef>,
        resource_type: Option<ResourceType>,
    ) -> Result<Self, ConfigurationError> {
        Self::build(Capability::MediaReader, implementation.into(), resource_type)
    }

    /// The built-in plain-text writer for string resources.
    pub fn write_string() -> Self {
        let implementation = media::string_writer();
        Self {
            capability: Capability::MediaWriter,
            resource_type: ResourceType::string(),
            mimetypes: MimeType::TEXT.into(),
            implementation,
            condition: Condition::always(),
            kind: DescriptorKind::Text,
        }
    }

    /// A view-rendering writer for the token's view model.
    pub fn view(token: Arc<dyn ViewToken>) -> Self {
        let resource_type = token.view_model().clone();
        let implementation = build_concrete(&media::view_writer(), &resource_type);
        Self {
            capability: Capability::MediaWriter,
            resource_type,
            implementation,
            mimetypes: MimeType::HTML.into(),
            condition: Condition::always(),
            kind: DescriptorKind::View(token),
        }
    }

    fn build(
        capability: Capability,
        implementation: ImplementationRef,
        resource_type: Option<ResourceType>,
    ) -> Result<Self, ConfigurationError> {
        let (implementation, resource_type) = match implementation {
            ImplementationRef::Open(template) => {
                let Some(resource_type) = resource_type else {
                    return Err(ConfigurationError::ResourceTypeRequired {
                        implementation: template.full_name(),
                        capability,
                    });
                };
                if template.capability() != capability {
                    return Err(ConfigurationError::MissingCapability {
                        implementation: template.full_name(),
                        capability,
                    });
                }
                (build_concrete(&template, &resource_type), resource_type)
            }
            ImplementationRef::Concrete(implementation) => {
                let resource_type = derive_resource_type(&implementation, capability, resource_type)?;
                (implementation, resource_type)
            }
        };

        // The closed implementation must still produce/consume the resource type.
        let closes = implementation
            .capabilities()
            .iter()
            .any(|c| c.capability == capability && c.resource_type == resource_type);
        if !closes {
            return Err(ConfigurationError::ResourceTypeMismatch {
                implementation: implementation.full_name(),
                expected: resource_type.full_name(),
            });
        }

        log::debug!(
            "Registered {} {} for {}",
            capability.role(),
            implementation.full_name(),
            resource_type
        );

        Ok(Self {
            capability,
            mimetypes: mime::read_from(&implementation),
            resource_type,
            implementation,
            condition: Condition::always(),
            kind: DescriptorKind::Media,
        })
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub fn mimetypes(&self) -> &MimeTypeSet {
        &self.mimetypes
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// The view token behind a view descriptor.
    pub fn view_token(&self) -> Option<&Arc<dyn ViewToken>> {
        match &self.kind {
            DescriptorKind::View(token) => Some(token),
            _ => None,
        }
    }

    /// The construction object used to build the live writer or reader.
    pub fn to_object_def(&self) -> ObjectDef {
        match &self.kind {
            DescriptorKind::Media | DescriptorKind::Text => self.implementation.to_object_def(),
            DescriptorKind::View(token) => self
                .implementation
                .to_object_def()
                .with_dependency(VIEW_FACTORY_DEPENDENCY, token.to_view_factory_def()),
        }
    }
}

fn derive_resource_type(
    implementation: &Implementation,
    capability: Capability,
    explicit: Option<ResourceType>,
) -> Result<ResourceType, ConfigurationError> {
    if find_capability(implementation, capability).is_none() {
        return Err(ConfigurationError::MissingCapability {
            implementation: implementation.full_name(),
            capability,
        });
    }

    if let Some(explicit) = explicit {
        return Ok(explicit);
    }

    let mut candidates: Vec<&ResourceType> = Vec::new();
    for closed in implementation.capabilities().iter().filter(|c| c.capability == capability) {
        if !candidates.contains(&&closed.resource_type) {
            candidates.push(&closed.resource_type);
        }
    }

    match candidates.as_slice() {
        [single] => Ok((*single).clone()),
        _ => Err(ConfigurationError::AmbiguousCapability {
            implementation: implementation.full_name(),
            capability,
            candidates: candidates.iter().map(|rt| rt.full_name()).collect(),
        }),
    }
}

impl DescribesItself for MediaDescriptor {
    fn describe(&self) -> Description {
        match &self.kind {
            DescriptorKind::Text => Description::new(
                self.implementation.display_name(),
                "Writes out a string value to the Http response as text/plain",
            ),
            DescriptorKind::View(token) => {
                let short = if token.namespace().is_empty() {
                    self.to_string()
                } else {
                    format!(
                        "View {}.{}, Condition {}",
                        token.namespace(),
                        token.name(),
                        self.condition.name()
                    )
                };
                Description::new(format!("View {}", token.name()), short)
            }
            DescriptorKind::Media => {
                let verb = match self.capability {
                    Capability::MediaWriter => "Writes",
                    Capability::MediaReader => "Reads",
                };
                Description::new(
                    self.implementation.display_name(),
                    format!(
                        "{} the resource model {} with {}",
                        verb,
                        self.resource_type.full_name(),
                        self.implementation.full_name()
                    ),
                )
            }
        }
    }
}

impl fmt::Display for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DescriptorKind::View(token) => {
                write!(f, "View {}, Condition {}", token.name(), self.condition.name())
            }
            _ => f.write_str(&self.implementation.display_name()),
        }
    }
}
