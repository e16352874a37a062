use incidentfox_core::vault::client_from_config;
use secrecy::ExposeSecret;

use crate::commands::{load_config, redact, CommandResult};

const COMMAND: &str = "vault";

/// Looks `path` up through the backend selected by the runtime config.
pub fn run(path: &str, reveal: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let client = match client_from_config(&config.vault) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(COMMAND, "vault_backend", error.to_string(), 4);
        }
    };

    match client.get_secret(path) {
        Ok(secret) => {
            let value = secret.expose_secret();
            let shown = if reveal { value.to_string() } else { redact(value) };
            CommandResult::success(
                COMMAND,
                format!("{path} = {shown} (backend: {})", client.backend()),
            )
        }
        Err(error) => CommandResult::failure(COMMAND, "vault_lookup", error.to_string(), 1),
    }
}
