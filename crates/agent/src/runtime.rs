use std::sync::Arc;

use incidentfox_core::context::{self, ExecutionContext, TeamConfig};
use incidentfox_core::protocol::{handle_integration_not_configured, ConfigRequiredResponse};
use incidentfox_core::resolver::ConfigResolver;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::tools::{ToolCall, ToolError, ToolRegistry};

/// Tenant identity and configuration for one inbound request.
#[derive(Clone, Debug, Deserialize)]
pub struct RequestScope {
    pub org_id: String,
    pub team_node_id: String,
    #[serde(default)]
    pub team_config: TeamConfig,
}

impl RequestScope {
    pub fn into_context(self) -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(self.org_id, self.team_node_id, self.team_config))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self { tool: tool.into(), input }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ToolResponse {
    Completed(Value),
    ConfigRequired(ConfigRequiredResponse),
    Failed { error_kind: String, message: String },
}

impl ToolResponse {
    fn failed(error_kind: &str, message: impl Into<String>) -> Self {
        Self::Failed { error_kind: error_kind.to_string(), message: message.into() }
    }

    pub fn is_config_required(&self) -> bool {
        matches!(self, Self::ConfigRequired(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Completed(result) => json!({"ok": true, "result": result}),
            Self::ConfigRequired(envelope) => envelope.to_value(),
            Self::Failed { error_kind, message } => {
                json!({"ok": false, "error_kind": error_kind, "message": message})
            }
        }
    }
}

impl Serialize for ToolResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// Dispatches tool calls inside a tenant's execution context.
pub struct AgentRuntime {
    registry: ToolRegistry,
    resolver: ConfigResolver,
}

impl AgentRuntime {
    pub fn new(registry: ToolRegistry, resolver: ConfigResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs one tool with `scope` installed for the duration of the call.
    pub async fn handle(&self, scope: RequestScope, request: ToolRequest) -> ToolResponse {
        context::scope(scope.into_context(), self.dispatch(&request)).await
    }

    /// Runs `requests` concurrently, each on its own task with the request's context
    /// propagated. Responses come back in request order.
    pub async fn handle_all(
        self: &Arc<Self>,
        scope: RequestScope,
        requests: Vec<ToolRequest>,
    ) -> Vec<ToolResponse> {
        context::scope(scope.into_context(), async {
            let handles: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    let runtime = Arc::clone(self);
                    context::spawn_with_context(async move { runtime.dispatch(&request).await })
                })
                .collect();

            let mut responses = Vec::with_capacity(handles.len());
            for handle in handles {
                let response = handle.await.unwrap_or_else(|join_error| {
                    ToolResponse::failed("execution_error", join_error.to_string())
                });
                responses.push(response);
            }
            responses
        })
        .await
    }

    /// Runs one tool against whatever context the calling task already has.
    pub async fn dispatch(&self, request: &ToolRequest) -> ToolResponse {
        let correlation_id = context::get().map(|c| c.request_id().to_owned());
        let correlation_id = correlation_id.as_deref().unwrap_or("none");

        let Some(tool) = self.registry.get(&request.tool) else {
            warn!(event_name = "tool.unknown", correlation_id, tool = %request.tool, "unknown tool requested");
            return ToolResponse::failed("unknown_tool", format!("unknown tool `{}`", request.tool));
        };

        let call = ToolCall {
            tool: tool.name(),
            integration: tool.integration(),
            input: &request.input,
            resolver: &self.resolver,
        };

        match tool.execute(call).await {
            Ok(result) => {
                info!(
                    event_name = "tool.completed",
                    correlation_id,
                    tool = call.tool,
                    integration = call.integration,
                    "tool call completed"
                );
                ToolResponse::Completed(result)
            }
            Err(ToolError::Integration(failure)) if failure.is_not_configured() => {
                info!(
                    event_name = "tool.config_required",
                    correlation_id,
                    tool = call.tool,
                    integration = call.integration,
                    missing = ?failure.missing_fields(),
                    "tool needs integration configuration"
                );
                ToolResponse::ConfigRequired(handle_integration_not_configured(
                    &failure,
                    call.tool,
                    Some(call.integration),
                ))
            }
            Err(ToolError::Integration(failure)) => {
                warn!(
                    event_name = "tool.integration_failed",
                    correlation_id,
                    tool = call.tool,
                    error_kind = failure.kind(),
                    error = %failure,
                    "tool call failed"
                );
                ToolResponse::failed(failure.kind(), failure.to_string())
            }
            Err(ToolError::NoContext(failure)) => {
                error!(
                    event_name = "tool.no_context",
                    tool = call.tool,
                    error = %failure,
                    "tool ran outside any request scope"
                );
                ToolResponse::failed("no_context", failure.to_string())
            }
            Err(failure @ ToolError::Execution(_)) => {
                warn!(
                    event_name = "tool.execution_failed",
                    correlation_id,
                    tool = call.tool,
                    error = %failure,
                    "tool call failed"
                );
                ToolResponse::failed("execution_error", failure.to_string())
            }
        }
    }
}
