//! Tool capability interface, the lazy registry and the fan-out decorator.

mod fanout;
mod registry;
mod traits;
mod types;

pub use fanout::FanOutToolExecutor;
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolExecutor};
pub use types::{
    param_str, ParamMap, ParamValue, ToolResponse, STATUS_ERROR, STATUS_SKIPPED, STATUS_SUCCESS,
};
