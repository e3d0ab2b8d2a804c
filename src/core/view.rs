use crate::core::container::ObjectDef;
use crate::core::resource::{ResourceType, ResourceValue};

/// Dependency name under which a view writer receives its view factory.
pub const VIEW_FACTORY_DEPENDENCY: &str = "view_factory";

/// A located view, as handed over by the view-location collaborator.
pub trait ViewToken: Send + Sync {
    fn name(&self) -> &str;

    /// May be empty.
    fn namespace(&self) -> &str;

    /// The model type the view renders; it is the view node's resource type.
    fn view_model(&self) -> &ResourceType;

    /// How to build the factory that renders this view.
    fn to_view_factory_def(&self) -> ObjectDef;
}

/// Renders a view model into markup.
pub trait ViewFactory: Send + Sync {
    fn render(&self, model: &ResourceValue) -> Result<String, String>;
}

/// A plain value implementation of [`ViewToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticViewToken {
    name: String,
    namespace: String,
    view_model: ResourceType,
    factory: ObjectDef,
}

impl StaticViewToken {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        view_model: ResourceType,
        factory: ObjectDef,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            view_model,
            factory,
        }
    }
}

impl ViewToken for StaticViewToken {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn view_model(&self) -> &ResourceType {
        &self.view_model
    }

    fn to_view_factory_def(&self) -> ObjectDef {
        self.factory.clone()
    }
}
