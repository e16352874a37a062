use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

/// One inspected setting: dotted key, rendered value, and the env vars that can set it.
struct Field<'a> {
    key: &'a str,
    value: String,
    env_keys: &'a [&'a str],
}

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());

    let credentials_path = config
        .credentials
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<default>".to_string());
    let source_path = config
        .vault
        .source_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());

    let fields = [
        Field {
            key: "vault.backend",
            value: format!("{:?}", config.vault.backend),
            env_keys: &["INCIDENTFOX_VAULT_BACKEND"],
        },
        Field {
            key: "vault.secret_name",
            value: config.vault.secret_name.clone(),
            env_keys: &["INCIDENTFOX_VAULT_SECRET_NAME"],
        },
        Field {
            key: "vault.source_path",
            value: source_path,
            env_keys: &["INCIDENTFOX_VAULT_SOURCE_PATH"],
        },
        Field {
            key: "credentials.path",
            value: credentials_path,
            env_keys: &["INCIDENTFOX_CREDENTIALS_FILE"],
        },
        Field {
            key: "credentials.enabled",
            value: config.credentials.enabled.to_string(),
            env_keys: &["INCIDENTFOX_CREDENTIALS_ENABLED"],
        },
        Field {
            key: "settings.settings_url",
            value: config.settings.settings_url.clone(),
            env_keys: &["INCIDENTFOX_SETTINGS_URL"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["INCIDENTFOX_LOGGING_LEVEL", "INCIDENTFOX_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["INCIDENTFOX_LOGGING_FORMAT", "INCIDENTFOX_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(field.key, field.env_keys, file_doc.as_ref(), file_path.as_deref());
        lines.push(render_line(field.key, &field.value, &source));
    }

    CommandResult::raw(0, lines.join("\n"))
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("incidentfox.toml"), PathBuf::from("config/incidentfox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> String {
    let from_env = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::{contains_path, field_source};

    #[test]
    fn dotted_paths_walk_nested_tables() {
        let doc: toml::Value =
            "[vault]\nbackend = \"env\"\n[logging]\nlevel = \"debug\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "vault.backend"));
        assert!(contains_path(&doc, "logging.level"));
        assert!(!contains_path(&doc, "logging.format"));
        assert!(!contains_path(&doc, "credentials.path"));
    }

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let doc: toml::Value = "[settings]\nsettings_url = \"https://x\"\n".parse().expect("toml");

        let source = field_source(
            "settings.settings_url",
            &["INCIDENTFOX_TEST_UNSET_VARIABLE"],
            Some(&doc),
            Some(std::path::Path::new("incidentfox.toml")),
        );
        assert_eq!(source, "file (incidentfox.toml)");

        let fallback =
            field_source("vault.backend", &["INCIDENTFOX_TEST_UNSET_VARIABLE"], Some(&doc), None);
        assert_eq!(fallback, "default");
    }
}
