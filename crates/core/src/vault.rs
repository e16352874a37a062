use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{VaultBackend, VaultConfig};
use crate::errors::ConfigurationError;

pub const VAULT_SCHEME: &str = "vault://";

/// Resolves `vault://<namespace>/<path>` references to secret values.
pub trait VaultClient: Send + Sync + fmt::Debug {
    fn backend(&self) -> &'static str;
    fn get_secret(&self, path: &str) -> Result<SecretString, ConfigurationError>;
}

pub fn is_vault_path(value: &str) -> bool {
    value.starts_with(VAULT_SCHEME)
}

/// Everything after `vault://`; rejects other schemes and empty paths.
pub fn strip_scheme(path: &str) -> Result<&str, ConfigurationError> {
    match path.strip_prefix(VAULT_SCHEME) {
        Some(rest) if !rest.trim_matches('/').is_empty() => Ok(rest),
        _ => Err(ConfigurationError::MalformedVaultPath(path.to_string())),
    }
}

/// `vault://a/b/c` -> `VAULT_A_B_C`.
pub fn env_var_name(path: &str) -> Result<String, ConfigurationError> {
    let rest = strip_scheme(path)?;
    Ok(format!("VAULT_{}", rest.to_uppercase().replace('/', "_")))
}

/// Stateless backend reading `VAULT_<NAMESPACE>_<PATH>` variables. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvVarVault;

impl VaultClient for EnvVarVault {
    fn backend(&self) -> &'static str {
        "env"
    }

    fn get_secret(&self, path: &str) -> Result<SecretString, ConfigurationError> {
        let var = env_var_name(path)?;
        match env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(SecretString::from(value)),
            _ => Err(ConfigurationError::SecretNotFound { path: path.to_string(), location: var }),
        }
    }
}

/// Where a [`SecretsManagerVault`] loads its bulk secret from.
pub trait SecretSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    /// Raw JSON object mapping vault paths (without scheme) to values.
    fn fetch(&self) -> Result<String, ConfigurationError>;
}

/// A bulk secret materialized as a JSON file, e.g. mounted by a secrets operator.
#[derive(Clone, Debug)]
pub struct FileSecretSource {
    name: String,
    path: PathBuf,
}

impl FileSecretSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretSource for FileSecretSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<String, ConfigurationError> {
        fs::read_to_string(&self.path).map_err(|error| ConfigurationError::SecretSource {
            source_name: self.name.clone(),
            details: format!("could not read `{}`: {error}", self.path.display()),
        })
    }
}

/// Bulk-cached backend: one named secret holds many vault paths.
///
/// Loaded once on construction. A cache miss triggers exactly one synchronous reload
/// before the lookup fails; there is no background refresh. Concurrent misses may both
/// reload, and the last write wins.
pub struct SecretsManagerVault {
    source: Box<dyn SecretSource>,
    cache: RwLock<HashMap<String, String>>,
}

impl fmt::Debug for SecretsManagerVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsManagerVault")
            .field("source", &self.source)
            .field("cached_paths", &self.cached_paths())
            .finish()
    }
}

impl SecretsManagerVault {
    pub fn new(source: impl SecretSource + 'static) -> Result<Self, ConfigurationError> {
        let vault = Self { source: Box::new(source), cache: RwLock::new(HashMap::new()) };
        vault.reload()?;
        Ok(vault)
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn reload(&self) -> Result<(), ConfigurationError> {
        let raw = self.source.fetch()?;
        let entries = parse_bundle(self.source.name(), &raw)?;
        info!(
            event_name = "vault.bulk_secret.loaded",
            secret_name = self.source.name(),
            entries = entries.len(),
            "bulk secret loaded"
        );
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = entries;
        Ok(())
    }

    fn cached(&self, key: &str) -> Option<String> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

impl VaultClient for SecretsManagerVault {
    fn backend(&self) -> &'static str {
        "secrets_manager"
    }

    fn get_secret(&self, path: &str) -> Result<SecretString, ConfigurationError> {
        let key = strip_scheme(path)?;
        if let Some(value) = self.cached(key) {
            return Ok(SecretString::from(value));
        }

        debug!(event_name = "vault.cache_miss", path, "secret not cached; reloading once");
        self.reload()?;

        self.cached(key).map(SecretString::from).ok_or_else(|| ConfigurationError::SecretNotFound {
            path: path.to_string(),
            location: self.source.name().to_string(),
        })
    }
}

fn parse_bundle(source_name: &str, raw: &str) -> Result<HashMap<String, String>, ConfigurationError> {
    let invalid = |details: String| ConfigurationError::SecretSource {
        source_name: source_name.to_string(),
        details,
    };

    let value: Value =
        serde_json::from_str(raw).map_err(|error| invalid(format!("invalid JSON: {error}")))?;
    let Value::Object(entries) = value else {
        return Err(invalid("bulk secret must be a JSON object".to_string()));
    };

    Ok(entries
        .into_iter()
        .map(|(key, value)| {
            let key = key.strip_prefix(VAULT_SCHEME).map(str::to_string).unwrap_or(key);
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Builds the backend named by `config`.
pub fn client_from_config(config: &VaultConfig) -> Result<Arc<dyn VaultClient>, ConfigurationError> {
    match config.backend {
        VaultBackend::Env => Ok(Arc::new(EnvVarVault)),
        VaultBackend::SecretsManager => {
            let path = config.source_path.clone().ok_or_else(|| ConfigurationError::SecretSource {
                source_name: config.secret_name.clone(),
                details: "vault.source_path is required for the secrets_manager backend".to_string(),
            })?;
            let source = FileSecretSource::new(config.secret_name.clone(), path);
            Ok(Arc::new(SecretsManagerVault::new(source)?))
        }
    }
}

static ACTIVE_VAULT: OnceLock<RwLock<Arc<dyn VaultClient>>> = OnceLock::new();

fn active_slot() -> &'static RwLock<Arc<dyn VaultClient>> {
    ACTIVE_VAULT.get_or_init(|| RwLock::new(Arc::new(EnvVarVault)))
}

/// Process-wide backend; [`EnvVarVault`] until replaced.
pub fn vault_client() -> Arc<dyn VaultClient> {
    Arc::clone(&active_slot().read().unwrap_or_else(PoisonError::into_inner))
}

/// Replaces the process-wide backend for all later calls. Meant for startup and tests;
/// calls already holding the previous client keep using it.
pub fn set_vault_client(client: Arc<dyn VaultClient>) {
    info!(event_name = "vault.client.replaced", backend = client.backend(), "vault client replaced");
    *active_slot().write().unwrap_or_else(PoisonError::into_inner) = client;
}

pub fn reset_vault_client() {
    set_vault_client(Arc::new(EnvVarVault));
}

/// Looks `path` up through the process-wide backend.
pub fn get_secret(path: &str) -> Result<SecretString, ConfigurationError> {
    let client = vault_client();
    let result = client.get_secret(path);
    if let Err(error) = &result {
        warn!(event_name = "vault.lookup_failed", backend = client.backend(), %error, "secret lookup failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        env_var_name, get_secret, reset_vault_client, set_vault_client, vault_client, EnvVarVault,
        FileSecretSource, SecretSource, SecretsManagerVault, VaultClient,
    };
    use crate::errors::ConfigurationError;
    use crate::test_support::env_lock;

    #[derive(Debug)]
    struct CountingSource {
        payloads: Mutex<Vec<String>>,
        fetches: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(payloads: &[&str], fetches: Arc<AtomicUsize>) -> Self {
            let mut payloads: Vec<String> = payloads.iter().map(|p| (*p).to_owned()).collect();
            payloads.reverse();
            Self { payloads: Mutex::new(payloads), fetches }
        }
    }

    impl SecretSource for CountingSource {
        fn name(&self) -> &str {
            "test/bundle"
        }

        fn fetch(&self) -> Result<String, ConfigurationError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut payloads = self.payloads.lock().expect("payload lock");
            let next = if payloads.len() > 1 { payloads.pop() } else { payloads.last().cloned() };
            Ok(next.unwrap_or_else(|| "{}".to_owned()))
        }
    }

    #[test]
    fn env_var_name_is_uppercased_and_underscored() {
        assert_eq!(env_var_name("vault://a/b/c").as_deref(), Ok("VAULT_A_B_C"));
        assert_eq!(env_var_name("vault://Tenant/GitHub/token").as_deref(), Ok("VAULT_TENANT_GITHUB_TOKEN"));
        assert_eq!(env_var_name("vault://a/b/c"), env_var_name("vault://a/b/c"));
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for path in ["secret/a", "vault://", "vault:///", "VAULT://a/b"] {
            assert!(
                matches!(EnvVarVault.get_secret(path), Err(ConfigurationError::MalformedVaultPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn env_vault_fails_until_variable_is_set() {
        let _guard = env_lock().lock().expect("env lock");
        env::remove_var("VAULT_ACME_GITHUB_TOKEN");

        let missing = EnvVarVault.get_secret("vault://acme/github/token");
        assert!(matches!(
            missing,
            Err(ConfigurationError::SecretNotFound { ref location, .. }) if location == "VAULT_ACME_GITHUB_TOKEN"
        ));

        env::set_var("VAULT_ACME_GITHUB_TOKEN", "ghp_secret");
        let found = EnvVarVault.get_secret("vault://acme/github/token");
        env::remove_var("VAULT_ACME_GITHUB_TOKEN");

        assert_eq!(found.expect("secret after env set").expose_secret(), "ghp_secret");
    }

    #[test]
    fn bulk_vault_serves_from_cache_without_refetching() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource::new(&[r#"{"acme/datadog/api_key": "dd-1"}"#], Arc::clone(&fetches));
        let vault = SecretsManagerVault::new(source).expect("initial load");

        for _ in 0..3 {
            let value = vault.get_secret("vault://acme/datadog/api_key").expect("cached secret");
            assert_eq!(value.expose_secret(), "dd-1");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bulk_vault_reloads_exactly_once_on_miss() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource::new(
            &[r#"{"a/one": "1"}"#, r#"{"a/one": "1", "a/two": "2"}"#],
            Arc::clone(&fetches),
        );
        let vault = SecretsManagerVault::new(source).expect("initial load");

        let added = vault.get_secret("vault://a/two").expect("found after reload");
        assert_eq!(added.expose_secret(), "2");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        let missing = vault.get_secret("vault://a/three");
        assert!(matches!(missing, Err(ConfigurationError::SecretNotFound { .. })));
        assert_eq!(fetches.load(Ordering::SeqCst), 3, "one reload per miss, no retry loop");
    }

    #[test]
    fn bulk_vault_accepts_prefixed_keys_and_non_string_values() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = CountingSource::new(&[r#"{"vault://a/port": 5432, "a/name": "db"}"#], fetches);
        let vault = SecretsManagerVault::new(source).expect("initial load");

        assert_eq!(vault.cached_paths(), 2);
        assert_eq!(vault.get_secret("vault://a/port").expect("port").expose_secret(), "5432");
    }

    #[test]
    fn file_source_feeds_bulk_vault() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bundle.json");
        fs::write(&path, r#"{"acme/slack/bot_token": "xoxb-1"}"#).expect("write bundle");

        let vault = SecretsManagerVault::new(FileSecretSource::new("acme/prod", &path)).expect("load");
        assert_eq!(vault.get_secret("vault://acme/slack/bot_token").expect("token").expose_secret(), "xoxb-1");
    }

    #[test]
    fn bulk_vault_rejects_non_object_payload() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let result = SecretsManagerVault::new(CountingSource::new(&["[1, 2]"], fetches));
        assert!(matches!(result, Err(ConfigurationError::SecretSource { .. })));
    }

    #[test]
    fn process_vault_defaults_to_env_and_can_be_replaced() {
        let _guard = env_lock().lock().expect("env lock");
        reset_vault_client();
        assert_eq!(vault_client().backend(), "env");

        let fetches = Arc::new(AtomicUsize::new(0));
        let bulk = SecretsManagerVault::new(CountingSource::new(&[r#"{"x/y": "z"}"#], fetches))
            .expect("initial load");
        set_vault_client(Arc::new(bulk));

        let value = get_secret("vault://x/y").map(|secret| secret.expose_secret().to_owned());
        reset_vault_client();

        assert_eq!(value.as_deref(), Ok("z"));
        assert_eq!(vault_client().backend(), "env");
    }
}
