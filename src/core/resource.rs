use serde::{Deserialize, Serialize};
use std::fmt;

/// The payload a chain produces or consumes.
pub type ResourceValue = serde_json::Value;

/// A type tag identifying the logical resource a writer or reader serves.
///
/// This is deliberately not a `TypeId`: registration data can name resource
/// types that have no Rust counterpart, and two tags are equal whenever their
/// namespace and name are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceType {
    namespace: String,
    name: String,
}

impl ResourceType {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Builds the tag for a Rust type from its `type_name`.
    pub fn of<T: ?Sized>() -> Self {
        Self::parse(std::any::type_name::<T>())
    }

    /// Splits a path such as `shop::orders::Order` into namespace and name.
    /// Generic arguments stay with the name.
    pub fn parse(path: &str) -> Self {
        let head_end = path.find('<').unwrap_or(path.len());
        match path[..head_end].rfind("::") {
            Some(split) => Self::new(&path[..split], &path[split + 2..]),
            None => Self::new("", path),
        }
    }

    pub fn string() -> Self {
        Self::of::<String>()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invoice;

    #[test]
    fn test_of_splits_namespace_and_name() {
        let rt = ResourceType::of::<Invoice>();
        assert_eq!(rt.name(), "Invoice");
        assert!(rt.namespace().ends_with("resource::tests"));
        assert_eq!(rt.full_name(), format!("{}::Invoice", rt.namespace()));
    }

    #[test]
    fn test_parse_keeps_generic_arguments_on_the_name() {
        let rt = ResourceType::parse("alloc::vec::Vec<shop::Order>");
        assert_eq!(rt.namespace(), "alloc::vec");
        assert_eq!(rt.name(), "Vec<shop::Order>");
    }

    #[test]
    fn test_parse_without_namespace() {
        let rt = ResourceType::parse("u32");
        assert_eq!(rt.namespace(), "");
        assert_eq!(rt.full_name(), "u32");
    }

    #[test]
    fn test_string_tag_is_stable() {
        assert_eq!(ResourceType::string(), ResourceType::parse("alloc::string::String"));
    }
}
