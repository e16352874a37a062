use incidentfox_core::protocol::{make_config_required_response, ConfigRequiredRequest};

use crate::commands::CommandResult;

/// Prints the `config_required` envelope a tool would return for `integration`.
pub fn run(integration: &str, tool: &str, missing: Vec<String>) -> CommandResult {
    let mut request = ConfigRequiredRequest::default();
    if !missing.is_empty() {
        request = request.missing(missing);
    }

    let envelope = make_config_required_response(integration, tool, request);
    match serde_json::to_string_pretty(&envelope) {
        Ok(output) => CommandResult::raw(0, output),
        Err(error) => CommandResult::failure("envelope", "serialization", error.to_string(), 5),
    }
}
