mod error;
mod registry;
pub mod user_functions;

pub use error::ToolError;
pub use registry::{ParamSpec, ParamType, ToolArgs, ToolDescriptor, ToolRegistry};
