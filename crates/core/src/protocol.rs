//! The `config_required` envelope.
//!
//! External CLIs and UIs look for `"config_required": true` in a tool result to start an
//! interactive setup flow, so field names here are a wire contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::IntegrationError;
use crate::integrations;

const GENERIC_HELP_OPTION: &str =
    "Configure this integration in your team settings, or ask your administrator to enable it";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRequiredResponse {
    pub config_required: bool,
    pub integration: String,
    pub tool: String,
    pub message: String,
    pub missing_config: Vec<String>,
    pub help: HelpInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpInfo {
    pub description: String,
    pub options: Vec<String>,
    pub docs_url: String,
}

impl ConfigRequiredResponse {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "config_required": true,
                "integration": self.integration,
                "tool": self.tool,
                "message": self.message,
            })
        })
    }
}

/// Optional parts of an envelope; anything left `None` comes from the catalog.
#[derive(Clone, Debug, Default)]
pub struct ConfigRequiredRequest {
    pub missing_config: Option<Vec<String>>,
    pub help_options: Option<Vec<String>>,
    pub docs_url: Option<String>,
    pub message: Option<String>,
}

impl ConfigRequiredRequest {
    pub fn missing(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.missing_config = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn help_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.help_options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn docs_url(mut self, docs_url: impl Into<String>) -> Self {
        self.docs_url = Some(docs_url.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Builds the envelope for `integration`/`tool`. Pure and infallible.
pub fn make_config_required_response(
    integration: &str,
    tool: &str,
    request: ConfigRequiredRequest,
) -> ConfigRequiredResponse {
    let spec = integrations::lookup(integration);
    let display_name = integrations::display_name(integration);

    let options = request.help_options.unwrap_or_else(|| match spec {
        Some(spec) => spec.help_options.iter().map(|option| (*option).to_string()).collect(),
        None => vec![GENERIC_HELP_OPTION.to_string()],
    });
    let docs_url = request.docs_url.unwrap_or_else(|| integrations::docs_url(integration));
    let message = request.message.unwrap_or_else(|| {
        format!(
            "{display_name} integration is not configured. Please provide the required configuration."
        )
    });

    ConfigRequiredResponse {
        config_required: true,
        integration: integration.to_string(),
        tool: tool.to_string(),
        message,
        missing_config: request.missing_config.unwrap_or_default(),
        help: HelpInfo {
            description: format!("To enable {display_name} integration, you need to:"),
            options,
            docs_url,
        },
    }
}

/// Tool-boundary adapter: the one place a resolution failure becomes the envelope.
///
/// The error's own integration id wins; `integration` is the fallback, then `"unknown"`.
pub fn handle_integration_not_configured(
    error: &IntegrationError,
    tool: &str,
    integration: Option<&str>,
) -> ConfigRequiredResponse {
    let integration = error.integration_id().or(integration).unwrap_or("unknown");
    let request = ConfigRequiredRequest::default().missing(error.missing_fields().iter().cloned());
    make_config_required_response(integration, tool, request)
}

/// True when `value` is a `config_required` envelope.
pub fn is_config_required(value: &Value) -> bool {
    value.get("config_required").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{
        handle_integration_not_configured, is_config_required, make_config_required_response,
        ConfigRequiredRequest,
    };
    use crate::errors::IntegrationError;

    #[test]
    fn slack_envelope_uses_catalog_defaults() {
        let response =
            make_config_required_response("slack", "send_message", ConfigRequiredRequest::default());
        let value = response.to_value();

        assert_eq!(value["config_required"], true);
        assert_eq!(value["integration"], "slack");
        assert_eq!(value["tool"], "send_message");
        assert_eq!(value["help"]["docs_url"], "https://docs.incidentfox.ai/integrations/slack");
        assert!(value["help"]["options"].as_array().is_some_and(|options| !options.is_empty()));
        assert_eq!(value["missing_config"], json!([]));
        assert_eq!(
            value["message"],
            "Slack integration is not configured. Please provide the required configuration."
        );
        assert_eq!(value["help"]["description"], "To enable Slack integration, you need to:");
    }

    #[test]
    fn envelope_has_exactly_the_wire_fields() {
        let value =
            make_config_required_response("github", "create_issue", ConfigRequiredRequest::default())
                .to_value();

        let Value::Object(top) = &value else { panic!("envelope must be an object") };
        let keys: Vec<_> = top.keys().map(String::as_str).collect();
        assert_eq!(keys, ["config_required", "help", "integration", "message", "missing_config", "tool"]);

        let Value::Object(help) = &value["help"] else { panic!("help must be an object") };
        let help_keys: Vec<_> = help.keys().map(String::as_str).collect();
        assert_eq!(help_keys, ["description", "docs_url", "options"]);
    }

    #[test]
    fn unknown_integration_gets_generic_help() {
        let response =
            make_config_required_response("honeycomb", "query", ConfigRequiredRequest::default());

        assert_eq!(response.help.options.len(), 1);
        assert!(response.help.options[0].contains("team settings"));
        assert_eq!(response.help.docs_url, "https://docs.incidentfox.ai/integrations/honeycomb");
        assert!(response.message.starts_with("Honeycomb integration is not configured."));
    }

    #[test]
    fn explicit_arguments_override_defaults() {
        let response = make_config_required_response(
            "grafana",
            "query_dashboards",
            ConfigRequiredRequest::default()
                .missing(["url"])
                .help_options(["Ask the platform team for a Grafana token"])
                .docs_url("https://wiki.example.com/grafana")
                .message("Grafana URL missing"),
        );

        assert_eq!(response.missing_config, ["url"]);
        assert_eq!(response.help.options, ["Ask the platform team for a Grafana token"]);
        assert_eq!(response.help.docs_url, "https://wiki.example.com/grafana");
        assert_eq!(response.message, "Grafana URL missing");
    }

    #[test]
    fn handler_takes_integration_and_fields_from_error() {
        let error = IntegrationError::not_configured(
            "aws",
            Some("describe_instances"),
            vec!["credentials".to_owned()],
        );

        let response = handle_integration_not_configured(&error, "describe_instances", Some("github"));

        assert_eq!(response.integration, "aws");
        assert_eq!(response.tool, "describe_instances");
        assert_eq!(response.missing_config, ["credentials"]);
        assert!(response.config_required);
    }

    #[test]
    fn handler_falls_back_to_supplied_integration_then_unknown() {
        let error = IntegrationError::Other("opaque failure".to_owned());

        let supplied = handle_integration_not_configured(&error, "search", Some("github"));
        assert_eq!(supplied.integration, "github");
        assert!(supplied.missing_config.is_empty());

        let unknown = handle_integration_not_configured(&error, "search", None);
        assert_eq!(unknown.integration, "unknown");
    }

    #[test]
    fn envelope_detection() {
        let envelope =
            make_config_required_response("kafka", "list_topics", ConfigRequiredRequest::default())
                .to_value();

        assert!(is_config_required(&envelope));
        assert!(!is_config_required(&json!({"ok": true})));
        assert!(!is_config_required(&json!({"config_required": "yes"})));
    }
}
