use thiserror::Error;

use crate::integrations;

/// Where users are sent to fix a missing integration unless `settings.settings_url` says otherwise.
pub const SETTINGS_URL: &str = "https://app.incidentfox.ai/team/settings/integrations";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("{}", not_configured_message(.integration_id, .tool_id.as_deref(), .missing_fields, .settings_url))]
    NotConfigured {
        integration_id: String,
        tool_id: Option<String>,
        missing_fields: Vec<String>,
        settings_url: String,
    },
    #[error("{} connection failed{}: {details}", display(.integration_id), status_suffix(.status_code))]
    Connection { integration_id: String, status_code: Option<u16>, details: String },
    #[error("{} authentication failed: {details}", display(.integration_id))]
    Authentication { integration_id: String, details: String },
    #[error("{0}")]
    Other(String),
}

impl IntegrationError {
    pub fn not_configured(
        integration_id: impl Into<String>,
        tool_id: Option<&str>,
        missing_fields: Vec<String>,
    ) -> Self {
        Self::NotConfigured {
            integration_id: integration_id.into(),
            tool_id: tool_id.map(str::to_string),
            missing_fields,
            settings_url: SETTINGS_URL.to_string(),
        }
    }

    /// Points the not-configured message at a different settings page. Other variants are
    /// returned unchanged.
    pub fn with_settings_url(mut self, url: impl Into<String>) -> Self {
        if let Self::NotConfigured { settings_url, .. } = &mut self {
            *settings_url = url.into();
        }
        self
    }

    pub fn integration_id(&self) -> Option<&str> {
        match self {
            Self::NotConfigured { integration_id, .. }
            | Self::Connection { integration_id, .. }
            | Self::Authentication { integration_id, .. } => Some(integration_id),
            Self::Other(_) => None,
        }
    }

    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Self::NotConfigured { tool_id, .. } => tool_id.as_deref(),
            _ => None,
        }
    }

    /// Empty for every variant except `NotConfigured`.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            Self::NotConfigured { missing_fields, .. } => missing_fields,
            _ => &[],
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }

    /// Stable snake_case label used in structured tool failures and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::Connection { .. } => "connection_error",
            Self::Authentication { .. } => "authentication_error",
            Self::Other(_) => "integration_error",
        }
    }
}

fn display(integration_id: &str) -> String {
    integrations::display_name(integration_id)
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

fn not_configured_message(
    integration_id: &str,
    tool_id: Option<&str>,
    missing_fields: &[String],
    settings_url: &str,
) -> String {
    let name = display(integration_id);
    let mut message = String::new();

    if let Some(tool_id) = tool_id {
        message.push_str(&format!("Tool '{tool_id}' requires the {name} integration. "));
    }

    if missing_fields.is_empty() {
        message.push_str(&format!("{name} integration is not configured. "));
    } else {
        message.push_str(&format!(
            "{name} integration is missing required configuration: {}. ",
            missing_fields.join(", ")
        ));
    }

    message.push_str(&format!("Configure it in team settings: {settings_url}"));
    message
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid vault path `{0}` (expected `vault://<namespace>/<path>`)")]
    MalformedVaultPath(String),
    #[error("secret `{path}` not found (looked up `{location}`)")]
    SecretNotFound { path: String, location: String },
    #[error("secret source `{source_name}` failed: {details}")]
    SecretSource { source_name: String, details: String },
}

/// A tool ran outside of any request scope. This is a caller bug (usually a missing
/// `propagate` at a fan-out point), not something a user can fix.
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
#[error("no execution context is installed for the current task; call context::set or context::propagate first")]
pub struct NoContextError;
