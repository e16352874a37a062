//! Local `KEY=VALUE` credential file for single-user and dev tooling.
//!
//! Every read re-parses the file, so edits made by hand or by another store instance are
//! visible immediately. Process environment variables win over file values in
//! [`CredentialStore::get_env`]. Writes rewrite the whole file and assume a single writer.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, warn};

pub const CREDENTIALS_FILE_ENV: &str = "INCIDENTFOX_CREDENTIALS_FILE";

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("could not read credentials file `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not write credentials file `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid credential key `{0}` (must be non-empty without `=`, `#` or whitespace)")]
    InvalidKey(String),
    #[error("HOME is not set and {CREDENTIALS_FILE_ENV} was not provided")]
    HomeNotSet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$INCIDENTFOX_CREDENTIALS_FILE`, else `$HOME/.incidentfox/credentials.env`.
    pub fn default_path() -> Result<PathBuf, CredentialStoreError> {
        if let Some(explicit) = read_env(CREDENTIALS_FILE_ENV) {
            return Ok(PathBuf::from(explicit));
        }
        let home = read_env("HOME").ok_or(CredentialStoreError::HomeNotSet)?;
        Ok(PathBuf::from(home).join(".incidentfox").join("credentials.env"))
    }

    pub fn open_default() -> Result<Self, CredentialStoreError> {
        Self::default_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All pairs currently in the file. A missing file is an empty store.
    pub fn list(&self) -> Result<BTreeMap<String, String>, CredentialStoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse(&raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(CredentialStoreError::Read { path: self.path.clone(), source }),
        }
    }

    pub fn read(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        Ok(self.list()?.remove(key))
    }

    pub fn write(&self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        validate_key(key)?;
        let mut entries = self.list()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)?;
        debug!(event_name = "credentials.saved", key, path = %self.path.display(), "credential saved");
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<DeleteOutcome, CredentialStoreError> {
        let mut entries = self.list()?;
        if entries.remove(key).is_none() {
            return Ok(DeleteOutcome::NotFound);
        }
        self.persist(&entries)?;
        debug!(event_name = "credentials.deleted", key, path = %self.path.display(), "credential deleted");
        Ok(DeleteOutcome::Removed)
    }

    /// Process environment first, then the file. Empty env values count as unset.
    pub fn get_env(&self, key: &str) -> Option<String> {
        if let Some(value) = read_env(key) {
            return Some(value);
        }

        match self.read(key) {
            Ok(value) => value,
            Err(error) => {
                warn!(event_name = "credentials.read_failed", key, %error, "falling back to unset");
                None
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), CredentialStoreError> {
        let write_error =
            |source: io::Error| CredentialStoreError::Write { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&self.path, render(entries)).map_err(write_error)?;
        restrict_permissions(&self.path).map_err(write_error)?;
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn validate_key(key: &str) -> Result<(), CredentialStoreError> {
    let valid = !key.is_empty()
        && !key.chars().any(|ch| ch == '=' || ch == '#' || ch.is_whitespace());
    if valid {
        Ok(())
    } else {
        Err(CredentialStoreError::InvalidKey(key.to_string()))
    }
}

fn parse(raw: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        entries.insert(key.to_string(), unquote(value.trim()));
    }

    entries
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut output = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                match chars.next() {
                    Some('n') => output.push('\n'),
                    Some('r') => output.push('\r'),
                    Some(next) => output.push(next),
                    None => output.push('\\'),
                }
            } else {
                output.push(ch);
            }
        }
        return output;
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }

    value.to_string()
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value.chars().any(char::is_whitespace)
        || value.starts_with('"')
        || value.starts_with('\'')
}

fn render(entries: &BTreeMap<String, String>) -> String {
    let mut output = String::from("# IncidentFox local credentials\n");
    output.push_str(&format!(
        "# Managed by `incidentfox credentials`; last written {}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    for (key, value) in entries {
        if needs_quotes(value) {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
                .replace('\r', "\\r");
            output.push_str(&format!("{key}=\"{escaped}\"\n"));
        } else {
            output.push_str(&format!("{key}={value}\n"));
        }
    }

    output
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
