use incidentfox_core::config::RuntimeConfig;
use incidentfox_core::integrations::CATALOG;
use incidentfox_core::resolver::ConfigResolver;
use incidentfox_core::vault::client_from_config;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "status";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Readiness {
    Configured,
    NotConfigured,
}

#[derive(Debug, Serialize)]
struct IntegrationStatus {
    integration: &'static str,
    display_name: &'static str,
    status: Readiness,
    source: Option<String>,
    missing_config: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    summary: String,
    vault_backend: String,
    credentials_file: Option<String>,
    integrations: Vec<IntegrationStatus>,
}

/// Which catalog integrations this host could serve without a request context.
pub fn run(json_output: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let report = match build_report(&config) {
        Ok(report) => report,
        Err(result) => return result,
    };

    if json_output {
        return match serde_json::to_string_pretty(&report) {
            Ok(output) => CommandResult::raw(0, output),
            Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 5),
        };
    }

    CommandResult::raw(0, render_human(&report))
}

fn build_report(config: &RuntimeConfig) -> Result<StatusReport, CommandResult> {
    let vault = client_from_config(&config.vault)
        .map_err(|error| CommandResult::failure(COMMAND, "vault_backend", error.to_string(), 4))?;
    let vault_backend = vault.backend().to_string();
    let resolver = ConfigResolver::from_runtime_config(config, vault);

    let integrations: Vec<IntegrationStatus> = CATALOG
        .iter()
        .map(|spec| match resolver.resolve(spec.id, None) {
            Ok(resolved) => IntegrationStatus {
                integration: spec.id,
                display_name: spec.display_name,
                status: Readiness::Configured,
                source: Some(resolved.source.to_string()),
                missing_config: Vec::new(),
            },
            Err(error) => IntegrationStatus {
                integration: spec.id,
                display_name: spec.display_name,
                status: Readiness::NotConfigured,
                source: None,
                missing_config: error.missing_fields().to_vec(),
            },
        })
        .collect();

    let configured =
        integrations.iter().filter(|status| status.status == Readiness::Configured).count();

    Ok(StatusReport {
        summary: format!("status: {configured} of {} integrations configured", integrations.len()),
        vault_backend,
        credentials_file: resolver.store().map(|store| store.path().display().to_string()),
        integrations,
    })
}

fn render_human(report: &StatusReport) -> String {
    let mut lines = vec![
        report.summary.clone(),
        format!("vault backend: {}", report.vault_backend),
        format!(
            "credentials file: {}",
            report.credentials_file.as_deref().unwrap_or("<disabled>")
        ),
    ];

    for status in &report.integrations {
        let line = match status.status {
            Readiness::Configured => format!(
                "- [ok] {}: configured via {}",
                status.integration,
                status.source.as_deref().unwrap_or("unknown")
            ),
            Readiness::NotConfigured => format!(
                "- [missing] {}: needs {}",
                status.integration,
                status.missing_config.join(", ")
            ),
        };
        lines.push(line);
    }

    lines.join("\n")
}
