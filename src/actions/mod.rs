//! Action catalog: the closed set of things the assistant can do

pub mod catalog;
pub mod loader;

pub use catalog::{
    Action, ActionCatalog, ActionSource, ActionSpec, ParamSpec, ParamType, Parameters,
};
pub use loader::load_catalog_file;
