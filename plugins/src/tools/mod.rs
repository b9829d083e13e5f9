pub mod command;
pub mod manifest;

pub use command::CommandTool;
pub use manifest::ManifestTool;
