//! Tools the orchestrating agent can dispatch to.

mod registry;

pub use registry::{query_argument, AgentTool, ToolDefinition, ToolError, ToolRegistry};
