pub mod chain;
pub mod conneg;
pub mod container;
pub mod describe;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod media;
pub mod mime;
pub mod nodes;
pub mod policy;
pub mod registry;
pub mod resource;
pub mod runtime;
pub mod validation;
pub mod view;
pub mod visitor;
