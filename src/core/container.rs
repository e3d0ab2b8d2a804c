//! Construction objects and the minimal container that builds live writers,
//! readers and view factories from them at request time.

use crate::core::error::ConstructionError;
use crate::core::media::{self, MediaReader, MediaWriter};
use crate::core::resource::ResourceType;
use crate::core::runtime::{InMemoryOutputCache, OutputCache};
use crate::core::view::ViewFactory;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Describes how to build one instance: the implementation, its generic
/// arguments and its named dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDef {
    namespace: String,
    name: String,
    type_args: Vec<ResourceType>,
    dependencies: Vec<(String, ObjectDef)>,
}

impl ObjectDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            type_args: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_type_args(mut self, type_args: Vec<ResourceType>) -> Self {
        self.type_args = type_args;
        self
    }

    /// Adds or replaces a named dependency.
    pub fn with_dependency(mut self, name: impl Into<String>, def: ObjectDef) -> Self {
        let name = name.into();
        self.dependencies.retain(|(n, _)| n != &name);
        self.dependencies.push((name, def));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_args(&self) -> &[ResourceType] {
        &self.type_args
    }

    pub fn dependencies(&self) -> &[(String, ObjectDef)] {
        &self.dependencies
    }

    pub fn dependency(&self, name: &str) -> Option<&ObjectDef> {
        self.dependencies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, def)| def)
    }

    /// The key constructors are registered under: namespace and name without
    /// type arguments, so one constructor serves every closed form of a
    /// generic implementation.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }
}

type Built = Box<dyn Any + Send + Sync>;
type Constructor = Arc<dyn Fn(&ObjectDef, &Container) -> Result<Built, ConstructionError> + Send + Sync>;

/// Turns `ObjectDef`s into live instances.
///
/// Constructors are registered by implementation key. The container is
/// configured during startup and only read afterwards.
pub struct Container {
    constructors: HashMap<String, Constructor>,
    output_cache: Arc<dyn OutputCache>,
}

impl Container {
    /// An empty container with an in-memory output cache.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
            output_cache: Arc::new(InMemoryOutputCache::new()),
        }
    }

    /// A container that can build every built-in writer and reader.
    pub fn with_defaults() -> Self {
        let mut container = Self::new();
        media::register_defaults(&mut container);
        container
    }

    pub fn with_output_cache(mut self, cache: Arc<dyn OutputCache>) -> Self {
        self.output_cache = cache;
        self
    }

    pub fn output_cache(&self) -> &Arc<dyn OutputCache> {
        &self.output_cache
    }

    pub fn register_writer<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectDef, &Container) -> Result<Arc<dyn MediaWriter>, ConstructionError> + Send + Sync + 'static,
    {
        self.register(key, move |def, container| {
            constructor(def, container).map(|w| Box::new(w) as Built)
        });
    }

    pub fn register_reader<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectDef, &Container) -> Result<Arc<dyn MediaReader>, ConstructionError> + Send + Sync + 'static,
    {
        self.register(key, move |def, container| {
            constructor(def, container).map(|r| Box::new(r) as Built)
        });
    }

    pub fn register_view_factory<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectDef, &Container) -> Result<Arc<dyn ViewFactory>, ConstructionError> + Send + Sync + 'static,
    {
        self.register(key, move |def, container| {
            constructor(def, container).map(|v| Box::new(v) as Built)
        });
    }

    fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectDef, &Container) -> Result<Built, ConstructionError> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.constructors.contains_key(&key) {
            log::warn!("Constructor for {} was already registered, overwriting it.", key);
        }
        self.constructors.insert(key, Arc::new(constructor));
    }

    pub fn contains(&self, def: &ObjectDef) -> bool {
        self.constructors.contains_key(&def.key())
    }

    pub fn build_writer(&self, def: &ObjectDef) -> Result<Arc<dyn MediaWriter>, ConstructionError> {
        self.build::<Arc<dyn MediaWriter>>(def, "media writer")
    }

    pub fn build_reader(&self, def: &ObjectDef) -> Result<Arc<dyn MediaReader>, ConstructionError> {
        self.build::<Arc<dyn MediaReader>>(def, "media reader")
    }

    pub fn build_view_factory(&self, def: &ObjectDef) -> Result<Arc<dyn ViewFactory>, ConstructionError> {
        self.build::<Arc<dyn ViewFactory>>(def, "view factory")
    }

    /// Builds the named dependency of `def` as a view factory.
    pub fn view_factory_dependency(
        &self,
        def: &ObjectDef,
        dependency: &str,
    ) -> Result<Arc<dyn ViewFactory>, ConstructionError> {
        let inner = def
            .dependency(dependency)
            .ok_or_else(|| ConstructionError::MissingDependency {
                implementation: def.key(),
                dependency: dependency.to_string(),
            })?;
        self.build_view_factory(inner)
    }

    fn build<T: Any>(&self, def: &ObjectDef, expected: &'static str) -> Result<T, ConstructionError> {
        let key = def.key();
        let constructor = self
            .constructors
            .get(&key)
            .ok_or_else(|| ConstructionError::UnknownImplementation(key.clone()))?;
        let built = constructor(def, self)?;
        built
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| ConstructionError::WrongKind {
                implementation: key,
                expected,
            })
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::MediaDescriptor;
    use serde_json::json;

    #[test]
    fn test_defaults_build_string_and_json_writers() {
        let container = Container::with_defaults();

        let text = container
            .build_writer(&MediaDescriptor::write_string().to_object_def())
            .unwrap();
        assert_eq!(text.write("text/plain", &json!("hi")).unwrap(), "hi");

        let def = MediaDescriptor::writer(media::json_writer(), Some(ResourceType::new("shop", "Order")))
            .unwrap()
            .to_object_def();
        let writer = container.build_writer(&def).unwrap();
        assert_eq!(writer.write("application/json", &json!({"id": 7})).unwrap(), r#"{"id":7}"#);
    }

    #[test]
    fn test_unknown_implementation() {
        let container = Container::new();
        let err = container
            .build_writer(&ObjectDef::new("shop", "Nope"))
            .err()
            .unwrap();
        assert_eq!(err, ConstructionError::UnknownImplementation("shop::Nope".to_string()));
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let container = Container::with_defaults();
        let def = MediaDescriptor::write_string().to_object_def();
        let err = container.build_reader(&def).err().unwrap();
        assert!(matches!(err, ConstructionError::WrongKind { expected: "media reader", .. }));
    }

    #[test]
    fn test_missing_dependency() {
        let container = Container::with_defaults();
        let err = container
            .view_factory_dependency(&ObjectDef::new("shop", "Page"), "view_factory")
            .err()
            .unwrap();
        assert!(matches!(err, ConstructionError::MissingDependency { .. }));
    }

    #[test]
    fn test_dependencies_replace_by_name() {
        let def = ObjectDef::new("a", "B")
            .with_dependency("x", ObjectDef::new("a", "One"))
            .with_dependency("x", ObjectDef::new("a", "Two"));
        assert_eq!(def.dependencies().len(), 1);
        assert_eq!(def.dependency("x").unwrap().name(), "Two");
    }
}
