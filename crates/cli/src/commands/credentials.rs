use std::env;

use incidentfox_core::config::RuntimeConfig;
use incidentfox_core::credentials::{CredentialStore, DeleteOutcome};

use crate::commands::{load_config, redact, CommandResult};

const COMMAND: &str = "credentials";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialAction {
    Set { key: String, value: String },
    Get { key: String, reveal: bool },
    Delete { key: String },
    List,
}

pub fn run(action: CredentialAction) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(result) => return result,
    };

    match action {
        CredentialAction::Set { key, value } => match store.write(&key, &value) {
            Ok(()) => CommandResult::success(
                COMMAND,
                format!("saved `{key}` to {}", store.path().display()),
            ),
            Err(error) => store_failure(error),
        },
        CredentialAction::Get { key, reveal } => {
            let source = if env_value(&key).is_some() { "env" } else { "file" };
            match store.get_env(&key) {
                Some(value) => {
                    let shown = if reveal { value } else { redact(&value) };
                    CommandResult::success(COMMAND, format!("{key} = {shown} (source: {source})"))
                }
                None => CommandResult::failure(
                    COMMAND,
                    "not_found",
                    format!("`{key}` is not set in the environment or {}", store.path().display()),
                    1,
                ),
            }
        }
        CredentialAction::Delete { key } => match store.delete(&key) {
            Ok(DeleteOutcome::Removed) => CommandResult::success(
                COMMAND,
                format!("removed `{key}` from {}", store.path().display()),
            ),
            Ok(DeleteOutcome::NotFound) => CommandResult::success(
                COMMAND,
                format!("`{key}` was not in {}; nothing to remove", store.path().display()),
            ),
            Err(error) => store_failure(error),
        },
        CredentialAction::List => match store.list() {
            Ok(entries) if entries.is_empty() => CommandResult::success(
                COMMAND,
                format!("no credentials saved in {}", store.path().display()),
            ),
            Ok(entries) => {
                let lines: Vec<String> = entries
                    .keys()
                    .map(|key| {
                        if env_value(key).is_some() {
                            format!("{key} (file, overridden by env)")
                        } else {
                            format!("{key} (file)")
                        }
                    })
                    .collect();
                CommandResult::success(COMMAND, lines.join("\n"))
            }
            Err(error) => store_failure(error),
        },
    }
}

fn open_store(config: &RuntimeConfig) -> Result<CredentialStore, CommandResult> {
    if !config.credentials.enabled {
        return Err(CommandResult::failure(
            COMMAND,
            "credentials_disabled",
            "the local credential store is disabled (credentials.enabled = false)",
            2,
        ));
    }

    match &config.credentials.path {
        Some(path) => Ok(CredentialStore::new(path)),
        None => CredentialStore::open_default().map_err(store_failure),
    }
}

fn store_failure(error: impl std::fmt::Display) -> CommandResult {
    CommandResult::failure(COMMAND, "credential_store", error.to_string(), 3)
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
