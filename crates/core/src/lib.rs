//! Execution context, configuration resolution and credential vault for multi-tenant
//! tool execution.
//!
//! Tools call [`resolver::ConfigResolver::resolve`] for the integration they wrap. A
//! `NotConfigured` failure is turned into the `config_required` envelope at the tool
//! boundary by [`protocol::handle_integration_not_configured`].

pub mod config;
pub mod context;
pub mod credentials;
pub mod errors;
pub mod integrations;
pub mod protocol;
pub mod resolver;
pub mod vault;

#[cfg(test)]
mod test_support;

pub use context::{ContextGuard, ExecutionContext, IntegrationConfig, TeamConfig};
pub use credentials::{CredentialStore, CredentialStoreError, DeleteOutcome};
pub use errors::{ConfigurationError, IntegrationError, NoContextError};
pub use protocol::{
    handle_integration_not_configured, make_config_required_response, ConfigRequiredRequest,
    ConfigRequiredResponse, HelpInfo,
};
pub use resolver::{ConfigResolver, ConfigSource, ResolvedConfig};
pub use vault::{EnvVarVault, SecretsManagerVault, VaultClient};
