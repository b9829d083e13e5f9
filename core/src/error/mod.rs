#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;

pub use error::{AnalyzerError, CliError, PlaybookError};
pub use executor::ExecutorError;
