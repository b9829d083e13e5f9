pub mod analyze;
pub mod build;
pub mod cli;
pub mod replay;
pub mod show;
