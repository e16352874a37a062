//! Tool runtime for multi-tenant agent requests.
//!
//! Each inbound request becomes an [`ExecutionContext`](incidentfox_core::ExecutionContext)
//! scoped to the task handling it. Tools resolve their integration config through the
//! shared [`ConfigResolver`](incidentfox_core::ConfigResolver), and the runtime turns
//! their failures into one of three outcomes:
//!
//! 1. **Completed** - the tool's JSON result
//! 2. **ConfigRequired** - the `config_required` envelope for a missing integration
//! 3. **Failed** - a generic execution failure with a stable `error_kind`
//!
//! Concurrent sub-calls made through [`runtime::AgentRuntime::handle_all`] each get the
//! request's context explicitly propagated; nothing is inherited from the worker thread.

pub mod runtime;
pub mod tools;

pub use runtime::{AgentRuntime, RequestScope, ToolRequest, ToolResponse};
pub use tools::{Tool, ToolCall, ToolError, ToolRegistry};
