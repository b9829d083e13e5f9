//! Playbook schema, construction from analyzed evidence, and JSON storage.

mod builder;
mod model;
mod store;

pub use builder::{build_playbook, PlaybookBuilder};
pub use model::{DateFilters, Playbook, PlaybookTask, SourceReference};
pub use store::PlaybookStore;
