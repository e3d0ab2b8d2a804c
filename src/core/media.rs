//! Live writer and reader capabilities plus the built-in implementations.

use crate::core::container::{Container, ObjectDef};
use crate::core::descriptor::{Capability, GenericTemplate, Implementation};
use crate::core::error::{ConstructionError, DispatchError};
use crate::core::mime::MimeType;
use crate::core::resource::{ResourceType, ResourceValue};
use crate::core::view::{VIEW_FACTORY_DEPENDENCY, ViewFactory};
use std::sync::Arc;

/// Namespace of the built-in implementations.
pub const NAMESPACE: &str = "cinnabar::media";

/// Writes a resource out as the negotiated media type.
pub trait MediaWriter: Send + Sync {
    fn write(&self, mimetype: &str, resource: &ResourceValue) -> Result<String, DispatchError>;
}

/// Reads a request body of the given media type into a resource.
pub trait MediaReader: Send + Sync {
    fn read(&self, mimetype: &str, body: &str) -> Result<ResourceValue, DispatchError>;
}

/// `StringWriter`: writes string resources as `text/plain`.
pub fn string_writer() -> Implementation {
    Implementation::new(NAMESPACE, "StringWriter")
        .writes(ResourceType::string())
        .mimetypes([MimeType::TEXT.value()])
}

/// `JsonWriter<T>`: serializes any resource as `application/json`.
pub fn json_writer() -> GenericTemplate {
    GenericTemplate::new(NAMESPACE, "JsonWriter", Capability::MediaWriter)
        .mimetypes([MimeType::JSON.value(), "text/json"])
}

/// `ViewWriter<T>`: renders the view model through a view factory as `text/html`.
pub fn view_writer() -> GenericTemplate {
    GenericTemplate::new(NAMESPACE, "ViewWriter", Capability::MediaWriter)
        .mimetypes([MimeType::HTML.value()])
}

/// `JsonReader<T>`: deserializes `application/json` bodies.
pub fn json_reader() -> GenericTemplate {
    GenericTemplate::new(NAMESPACE, "JsonReader", Capability::MediaReader)
        .mimetypes([MimeType::JSON.value(), "text/json"])
}

/// `TextReader`: reads `text/plain` bodies into string resources.
pub fn text_reader() -> Implementation {
    Implementation::new(NAMESPACE, "TextReader")
        .reads(ResourceType::string())
        .mimetypes([MimeType::TEXT.value()])
}

struct StringWriter;

impl MediaWriter for StringWriter {
    fn write(&self, _mimetype: &str, resource: &ResourceValue) -> Result<String, DispatchError> {
        Ok(match resource {
            ResourceValue::String(s) => s.clone(),
            ResourceValue::Null => String::new(),
            other => other.to_string(),
        })
    }
}

struct JsonWriter;

impl MediaWriter for JsonWriter {
    fn write(&self, mimetype: &str, resource: &ResourceValue) -> Result<String, DispatchError> {
        serde_json::to_string(resource).map_err(|e| DispatchError::Write {
            mimetype: mimetype.to_string(),
            message: e.to_string(),
        })
    }
}

struct ViewWriter {
    factory: Arc<dyn ViewFactory>,
}

impl MediaWriter for ViewWriter {
    fn write(&self, mimetype: &str, resource: &ResourceValue) -> Result<String, DispatchError> {
        self.factory
            .render(resource)
            .map_err(|message| DispatchError::Write {
                mimetype: mimetype.to_string(),
                message,
            })
    }
}

struct JsonReader;

impl MediaReader for JsonReader {
    fn read(&self, mimetype: &str, body: &str) -> Result<ResourceValue, DispatchError> {
        serde_json::from_str(body).map_err(|e| DispatchError::Read {
            mimetype: mimetype.to_string(),
            message: e.to_string(),
        })
    }
}

struct TextReader;

impl MediaReader for TextReader {
    fn read(&self, _mimetype: &str, body: &str) -> Result<ResourceValue, DispatchError> {
        Ok(ResourceValue::String(body.to_string()))
    }
}

fn key(name: &str) -> String {
    ObjectDef::new(NAMESPACE, name).key()
}

/// Registers constructors for every built-in implementation.
pub(crate) fn register_defaults(container: &mut Container) {
    container.register_writer(key("StringWriter"), |_, _| Ok(Arc::new(StringWriter) as Arc<dyn MediaWriter>));
    container.register_writer(key("JsonWriter"), |_, _| Ok(Arc::new(JsonWriter) as Arc<dyn MediaWriter>));
    container.register_writer(key("ViewWriter"), |def, container| {
        let factory = container.view_factory_dependency(def, VIEW_FACTORY_DEPENDENCY)?;
        Ok(Arc::new(ViewWriter { factory }) as Arc<dyn MediaWriter>)
    });
    container.register_reader(key("JsonReader"), |_, _| Ok(Arc::new(JsonReader) as Arc<dyn MediaReader>));
    container.register_reader(key("TextReader"), |def, _| {
        if !def.type_args().is_empty() {
            return Err(ConstructionError::WrongKind {
                implementation: def.key(),
                expected: "non-generic reader",
            });
        }
        Ok(Arc::new(TextReader) as Arc<dyn MediaReader>)
    });
}
