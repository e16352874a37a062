//! Configuration resolution for integration tools.
//!
//! Order is fixed: the request's [`ExecutionContext`](crate::context::ExecutionContext)
//! first, then environment variables (and the local credential file, which the
//! environment overrides), then a typed `NotConfigured` failure. Tenant settings from the
//! context always win over whatever the host process happens to have in its environment.

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RuntimeConfig;
use crate::context::{self, is_truthy, IntegrationConfig};
use crate::credentials::CredentialStore;
use crate::errors::{IntegrationError, SETTINGS_URL};
use crate::integrations::{self, IntegrationSpec};
use crate::vault::{self, VaultClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    ExecutionContext,
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionContext => f.write_str("execution_context"),
            Self::Environment => f.write_str("environment"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub integration_id: String,
    pub source: ConfigSource,
    pub values: IntegrationConfig,
}

impl ResolvedConfig {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn into_values(self) -> IntegrationConfig {
        self.values
    }
}

/// One candidate config and what it still lacks.
struct Candidate {
    values: IntegrationConfig,
    missing: Vec<String>,
}

impl Candidate {
    fn is_usable(&self) -> bool {
        !self.values.is_empty() && self.missing.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ConfigResolver {
    vault: Arc<dyn VaultClient>,
    store: Option<CredentialStore>,
    settings_url: String,
}

impl ConfigResolver {
    pub fn new(vault: Arc<dyn VaultClient>) -> Self {
        Self { vault, store: None, settings_url: SETTINGS_URL.to_string() }
    }

    pub fn with_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Settings page named in `NotConfigured` messages.
    pub fn with_settings_url(mut self, url: impl Into<String>) -> Self {
        self.settings_url = url.into();
        self
    }

    /// Process vault, no credential file. For multi-tenant servers.
    pub fn server() -> Self {
        Self::new(vault::vault_client())
    }

    /// Process vault plus the default credential file when one can be located.
    pub fn local() -> Self {
        Self::from_runtime_config(&RuntimeConfig::default(), vault::vault_client())
    }

    /// `vault` plus the credential file `config` points at, unless the store is disabled.
    pub fn from_runtime_config(config: &RuntimeConfig, vault: Arc<dyn VaultClient>) -> Self {
        let resolver = Self::new(vault).with_settings_url(config.settings.settings_url.trim());
        if !config.credentials.enabled {
            return resolver;
        }

        let store = match &config.credentials.path {
            Some(path) => Ok(CredentialStore::new(path)),
            None => CredentialStore::open_default(),
        };
        match store {
            Ok(store) => resolver.with_store(store),
            Err(error) => {
                warn!(event_name = "resolver.store_unavailable", %error, "resolving without credential file");
                resolver
            }
        }
    }

    pub fn store(&self) -> Option<&CredentialStore> {
        self.store.as_ref()
    }

    pub fn vault(&self) -> &Arc<dyn VaultClient> {
        &self.vault
    }

    pub fn settings_url(&self) -> &str {
        &self.settings_url
    }

    /// Runs the precedence chain for `integration_id` on behalf of `tool_id`.
    pub fn resolve(
        &self,
        integration_id: &str,
        tool_id: Option<&str>,
    ) -> Result<ResolvedConfig, IntegrationError> {
        let spec = integrations::lookup(integration_id);
        let current = context::get();
        let correlation_id = current.as_ref().map(|c| c.request_id().to_owned());
        let correlation_id = correlation_id.as_deref().unwrap_or("none");

        let from_context = current
            .as_ref()
            .map(|context| self.evaluate(spec, context.integration_config(integration_id)));
        if let Some(candidate) = from_context.as_ref().filter(|candidate| candidate.is_usable()) {
            debug!(
                event_name = "resolver.resolved",
                correlation_id,
                integration = integration_id,
                tool = tool_id.unwrap_or("unknown"),
                source = %ConfigSource::ExecutionContext,
                "integration config resolved"
            );
            return Ok(ResolvedConfig {
                integration_id: integration_id.to_string(),
                source: ConfigSource::ExecutionContext,
                values: candidate.values.clone(),
            });
        }

        let from_env = spec.map(|spec| self.evaluate(Some(spec), self.env_values(spec)));
        if let Some(candidate) = from_env.as_ref().filter(|candidate| candidate.is_usable()) {
            debug!(
                event_name = "resolver.resolved",
                correlation_id,
                integration = integration_id,
                tool = tool_id.unwrap_or("unknown"),
                source = %ConfigSource::Environment,
                "integration config resolved"
            );
            return Ok(ResolvedConfig {
                integration_id: integration_id.to_string(),
                source: ConfigSource::Environment,
                values: candidate.values.clone(),
            });
        }

        let missing = [from_context, from_env]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.values.is_empty())
            .map(|candidate| candidate.missing)
            .unwrap_or_else(|| all_required(spec));

        debug!(
            event_name = "resolver.not_configured",
            correlation_id,
            integration = integration_id,
            tool = tool_id.unwrap_or("unknown"),
            missing = ?missing,
            "integration is not configured"
        );
        Err(IntegrationError::not_configured(integration_id, tool_id, missing)
            .with_settings_url(self.settings_url.as_str()))
    }

    pub fn is_configured(&self, integration_id: &str) -> bool {
        self.resolve(integration_id, None).is_ok()
    }

    fn evaluate(&self, spec: Option<&IntegrationSpec>, values: IntegrationConfig) -> Candidate {
        let (values, unresolved) = self.dereference(values);
        let mut missing = BTreeSet::new();

        if let Some(spec) = spec {
            for field in spec.required {
                let satisfied =
                    field.keys.iter().all(|key| values.get(*key).is_some_and(is_truthy));
                if !satisfied {
                    missing.insert(field.name.to_string());
                }
            }
        }

        for key in unresolved {
            let name = spec
                .and_then(|spec| spec.required.iter().find(|field| field.keys.contains(&key.as_str())))
                .map(|field| field.name.to_string())
                .unwrap_or(key);
            missing.insert(name);
        }

        Candidate { values, missing: missing.into_iter().collect() }
    }

    /// Swaps `vault://` string values for their secrets. Keys whose lookup fails are
    /// dropped and returned separately.
    fn dereference(&self, values: IntegrationConfig) -> (IntegrationConfig, Vec<String>) {
        let mut resolved = IntegrationConfig::new();
        let mut unresolved = Vec::new();

        for (key, value) in values {
            match value {
                Value::String(text) if vault::is_vault_path(&text) => {
                    match self.vault.get_secret(&text) {
                        Ok(secret) => {
                            resolved.insert(key, Value::String(secret.expose_secret().to_string()));
                        }
                        Err(error) => {
                            warn!(
                                event_name = "resolver.vault_reference_failed",
                                key = %key,
                                backend = self.vault.backend(),
                                %error,
                                "vault reference could not be resolved"
                            );
                            unresolved.push(key);
                        }
                    }
                }
                other => {
                    resolved.insert(key, other);
                }
            }
        }

        (resolved, unresolved)
    }

    fn env_values(&self, spec: &IntegrationSpec) -> IntegrationConfig {
        spec.env
            .iter()
            .filter_map(|binding| {
                binding
                    .vars
                    .iter()
                    .find_map(|var| self.lookup_env(var))
                    .map(|value| (binding.key.to_string(), Value::String(value)))
            })
            .collect()
    }

    fn lookup_env(&self, var: &str) -> Option<String> {
        match &self.store {
            Some(store) => store.get_env(var),
            None => env::var(var).ok().filter(|value| !value.trim().is_empty()),
        }
    }
}

fn all_required(spec: Option<&IntegrationSpec>) -> Vec<String> {
    spec.map(|spec| spec.required.iter().map(|field| field.name.to_string()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::Arc;

    use serde_json::{json, Map, Value};
    use tempfile::TempDir;

    use super::{ConfigResolver, ConfigSource};
    use crate::config::{LoadOptions, RuntimeConfig};
    use crate::context::ContextGuard;
    use crate::credentials::CredentialStore;
    use crate::errors::IntegrationError;
    use crate::test_support::env_lock;
    use crate::vault::EnvVarVault;

    const AWS_VARS: [&str; 5] = [
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
    ];

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(Arc::new(EnvVarVault))
    }

    fn team_config(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn clear(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    #[test]
    fn aws_without_context_or_env_reports_missing_credentials() {
        let _guard = env_lock().lock().expect("env lock");
        clear(&AWS_VARS);

        let error = resolver().resolve("aws", Some("describe_instances")).expect_err("not configured");

        assert!(error.is_not_configured());
        assert_eq!(error.integration_id(), Some("aws"));
        assert_eq!(error.tool_id(), Some("describe_instances"));
        assert!(error.missing_fields().contains(&"credentials".to_string()));
    }

    #[test]
    fn context_config_is_returned_without_metadata() {
        let _guard = ContextGuard::enter(
            "org1",
            "team1",
            team_config(json!({"integrations": {"github": {"level": "org", "token": "t1"}}})),
        );

        let resolved = resolver().resolve("github", Some("search_code")).expect("resolved");
        assert_eq!(resolved.source, ConfigSource::ExecutionContext);
        assert_eq!(Value::Object(resolved.values), json!({"token": "t1"}));
    }

    #[test]
    fn context_wins_over_environment() {
        let _lock = env_lock().lock().expect("env lock");
        env::set_var("GITHUB_TOKEN", "host-ops-token");
        let _guard = ContextGuard::enter(
            "org1",
            "team1",
            team_config(json!({"integrations": {"github": {"token": "tenant-token"}}})),
        );

        let resolved = resolver().resolve("github", None);
        env::remove_var("GITHUB_TOKEN");

        let resolved = resolved.expect("resolved");
        assert_eq!(resolved.source, ConfigSource::ExecutionContext);
        assert_eq!(resolved.get_str("token"), Some("tenant-token"));
    }

    #[test]
    fn environment_fills_in_when_context_lacks_integration() {
        let _lock = env_lock().lock().expect("env lock");
        clear(&AWS_VARS);
        env::set_var("AWS_ACCESS_KEY_ID", "AKIA123");
        env::set_var("AWS_SECRET_ACCESS_KEY", "shh");
        env::set_var("AWS_DEFAULT_REGION", "eu-west-1");
        let _guard = ContextGuard::enter("org1", "team1", team_config(json!({"integrations": {}})));

        let resolved = resolver().resolve("aws", Some("list_buckets"));
        clear(&AWS_VARS);

        let resolved = resolved.expect("resolved from env");
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.get_str("access_key_id"), Some("AKIA123"));
        assert_eq!(resolved.get_str("region"), Some("eu-west-1"));
    }

    #[test]
    fn partial_context_reports_its_own_missing_fields() {
        let _lock = env_lock().lock().expect("env lock");
        clear(&["DATADOG_API_KEY", "DD_API_KEY", "DATADOG_APP_KEY", "DD_APP_KEY"]);
        let _guard = ContextGuard::enter(
            "org1",
            "team1",
            team_config(json!({"integrations": {"datadog": {"level": "team", "api_key": "k"}}})),
        );

        let error = resolver().resolve("datadog", Some("query_metrics")).expect_err("incomplete");
        assert_eq!(error.missing_fields(), ["app_key"]);
    }

    #[test]
    fn credential_file_is_consulted_and_env_overrides_it() {
        let _lock = env_lock().lock().expect("env lock");
        clear(&["GITHUB_TOKEN", "GH_TOKEN", "GITHUB_API_URL"]);
        let dir = TempDir::new().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("credentials.env"));
        store.write("GITHUB_TOKEN", "from-file").expect("write");
        let resolver = resolver().with_store(store);

        let from_file = resolver.resolve("github", None).expect("resolved from file");
        env::set_var("GITHUB_TOKEN", "from-env");
        let from_env = resolver.resolve("github", None);
        env::remove_var("GITHUB_TOKEN");

        assert_eq!(from_file.get_str("token"), Some("from-file"));
        assert_eq!(from_env.expect("resolved from env").get_str("token"), Some("from-env"));
    }

    #[test]
    fn vault_references_in_context_are_dereferenced() {
        let _lock = env_lock().lock().expect("env lock");
        env::set_var("VAULT_ACME_SLACK_BOT_TOKEN", "xoxb-secret");
        let _guard = ContextGuard::enter(
            "acme",
            "sre",
            team_config(json!({"integrations": {"slack": {"bot_token": "vault://acme/slack/bot_token"}}})),
        );

        let resolved = resolver().resolve("slack", Some("send_message"));
        env::remove_var("VAULT_ACME_SLACK_BOT_TOKEN");

        assert_eq!(resolved.expect("resolved").get_str("bot_token"), Some("xoxb-secret"));
    }

    #[test]
    fn unresolvable_vault_reference_is_a_missing_field() {
        let _lock = env_lock().lock().expect("env lock");
        clear(&["VAULT_ACME_SLACK_BOT_TOKEN", "SLACK_BOT_TOKEN", "SLACK_APP_TOKEN"]);
        let _guard = ContextGuard::enter(
            "acme",
            "sre",
            team_config(json!({"integrations": {"slack": {
                "bot_token": "vault://acme/slack/bot_token",
                "channel": "#incidents",
            }}})),
        );

        let error = resolver().resolve("slack", Some("send_message")).expect_err("missing secret");
        assert_eq!(error.missing_fields(), ["bot_token"]);
    }

    #[test]
    fn unknown_integration_resolves_only_from_context() {
        let error = resolver().resolve("honeycomb", Some("query")).expect_err("no context");
        assert!(matches!(
            error,
            IntegrationError::NotConfigured { ref missing_fields, .. } if missing_fields.is_empty()
        ));

        let _guard = ContextGuard::enter(
            "org1",
            "team1",
            team_config(json!({"integrations": {"honeycomb": {"api_key": "hc"}}})),
        );
        assert!(resolver().is_configured("honeycomb"));
    }

    #[test]
    fn runtime_config_decides_whether_a_store_is_attached() {
        let mut config = RuntimeConfig::default();
        config.credentials.path = Some("/tmp/incidentfox-test/credentials.env".into());

        let with_store = ConfigResolver::from_runtime_config(&config, Arc::new(EnvVarVault));
        assert_eq!(
            with_store.store().map(|store| store.path().to_path_buf()),
            Some("/tmp/incidentfox-test/credentials.env".into())
        );

        config.credentials.enabled = false;
        let without_store = ConfigResolver::from_runtime_config(&config, Arc::new(EnvVarVault));
        assert!(without_store.store().is_none());
        assert_eq!(without_store.vault().backend(), "env");
    }

    #[test]
    fn configured_settings_url_reaches_not_configured_message() {
        let _lock = env_lock().lock().expect("env lock");
        clear(&["GITHUB_TOKEN", "GH_TOKEN", "GITHUB_API_URL"]);
        env::set_var("INCIDENTFOX_SETTINGS_URL", "https://fox.example.com/settings");
        let config = RuntimeConfig::load(LoadOptions::default());
        env::remove_var("INCIDENTFOX_SETTINGS_URL");

        let mut config = config.expect("config");
        config.credentials.enabled = false;
        let resolver = ConfigResolver::from_runtime_config(&config, Arc::new(EnvVarVault));
        assert_eq!(resolver.settings_url(), "https://fox.example.com/settings");

        let error = resolver.resolve("github", Some("search_code")).expect_err("not configured");
        assert!(error
            .to_string()
            .ends_with("Configure it in team settings: https://fox.example.com/settings"));
    }
}
