pub mod analyzer;
pub mod config;
pub mod error;
pub mod executor;
pub mod playbook;
pub mod replay;
pub mod tool;
