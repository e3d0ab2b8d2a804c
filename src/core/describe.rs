use serde::{Deserialize, Serialize};

/// A human-readable summary of a node or descriptor, used by diagnostics
/// tooling and never by request dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub title: String,
    pub short_description: String,
}

impl Description {
    pub fn new(title: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            short_description: short_description.into(),
        }
    }
}

/// Implemented by everything that shows up in a chain report.
pub trait DescribesItself {
    fn describe(&self) -> Description;
}
