//! Settings and manifest loading

use anyhow::{Context, Result};
use rhsm::{
    AlreadyRegisteredPolicy, ProviderSettings, RawValue, RegistrationRequest, ResourceError,
    ValidationError, schema,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rhsm-register"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Largest accepted `timeout_secs` (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// How to talk to the registration tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Program to run
    pub command: String,
    /// Upper bound for one invocation, in seconds
    pub timeout_secs: u64,
    /// Re-query status after every change
    pub verify_after_apply: bool,
    pub already_registered: AlreadyRegisteredPolicy,
    pub not_registered_pattern: String,
}

impl Default for Settings {
    fn default() -> Self {
        let provider = ProviderSettings::default();
        Self {
            command: provider.command,
            timeout_secs: provider.timeout.as_secs(),
            verify_after_apply: provider.verify_after_apply,
            already_registered: provider.already_registered,
            not_registered_pattern: provider.not_registered_pattern,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(&expand_path(path)),
            None => {
                let path = config_dir()?.join("config.toml");
                if !path.exists() {
                    log::debug!("no settings at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in settings file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            anyhow::bail!("settings: command must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("settings: timeout_secs must be greater than zero");
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            anyhow::bail!("settings: timeout_secs must be at most {MAX_TIMEOUT_SECS}");
        }
        Ok(())
    }

    /// Settings in the form the provider takes
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            command: shellexpand::tilde(&self.command).into_owned(),
            timeout: Duration::from_secs(self.timeout_secs),
            verify_after_apply: self.verify_after_apply,
            already_registered: self.already_registered.clone(),
            not_registered_pattern: self.not_registered_pattern.clone(),
        }
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Attributes of one declared resource, as written in TOML
pub type Declaration = BTreeMap<String, toml::Value>;

/// Convert a TOML value into the shape attribute validation takes.
///
/// Values no attribute can hold become [`RawValue::Unsupported`] so they
/// are reported against their attribute instead of failing the manifest.
fn raw_value(value: &toml::Value) -> RawValue {
    match value {
        toml::Value::String(s) => RawValue::String(s.clone()),
        toml::Value::Integer(i) => RawValue::Integer(*i),
        toml::Value::Boolean(b) => RawValue::Bool(*b),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map_or_else(
                || RawValue::Unsupported("array of non-strings".to_string()),
                RawValue::List,
            ),
        other => RawValue::Unsupported(other.type_str().to_string()),
    }
}

/// A manifest file: an array of `[[rhsm_register]]` tables
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub rhsm_register: Vec<Declaration>,
}

impl Manifest {
    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_path(path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Parse manifest TOML
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate every declaration.
    ///
    /// All declarations are checked even after a failure, so one run
    /// reports every problem. A namevar declared twice is an error on the
    /// second declaration.
    pub fn requests(&self) -> (Vec<RegistrationRequest>, Vec<ResourceError>) {
        let mut requests = Vec::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for declaration in &self.rhsm_register {
            let attributes = declaration.iter().map(|(k, v)| (k.as_str(), raw_value(v)));
            match RegistrationRequest::from_attributes(attributes) {
                Ok(request) if !seen.insert(request.name().to_string()) => {
                    errors.push(ResourceError {
                        resource: request.name().to_string(),
                        errors: vec![ValidationError::InvalidValue {
                            attribute: schema::NAMEVAR.to_string(),
                            value: request.name().to_string(),
                            reason: "declared more than once".to_string(),
                        }],
                    });
                }
                Ok(request) => requests.push(request),
                Err(e) => errors.push(e),
            }
        }

        (requests, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.command, "subscription-manager");
        assert_eq!(settings.timeout_secs, 300);
        assert!(!settings.verify_after_apply);
        assert_eq!(settings.already_registered.exit_codes, vec![1, 64]);
    }

    #[test]
    fn test_settings_partial_file() {
        let file = write_temp(
            r#"
timeout_secs = 60
verify_after_apply = true

[already_registered]
exit_codes = [2]
"#,
        );
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.timeout_secs, 60);
        assert!(settings.verify_after_apply);
        assert_eq!(settings.already_registered.exit_codes, vec![2]);
        // Unset fields keep their defaults
        assert_eq!(settings.command, "subscription-manager");
        assert!(settings.already_registered.pattern.contains("already registered"));

        let provider = settings.provider_settings();
        assert_eq!(provider.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_settings_rejects_zero_timeout() {
        let file = write_temp("timeout_secs = 0\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_settings_rejects_huge_timeout() {
        let file = write_temp("timeout_secs = 9223372036854775807\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "{err}");

        let file = write_temp(&format!("timeout_secs = {MAX_TIMEOUT_SECS}\n"));
        assert!(Settings::load(Some(file.path())).is_ok());
    }

    #[test]
    fn test_settings_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_manifest_requests() {
        let manifest = Manifest::parse(
            r#"
[[rhsm_register]]
server_hostname = "subscription.example.com"
username = "doej"
password = "password123"
pool = "my_awesome_subscription"
server_insecure = "yes"

[[rhsm_register]]
name = "satellite.example.com"
ensure = "absent"
"#,
        )
        .unwrap();

        let (requests, errors) = manifest.requests();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].pool(), Some("my_awesome_subscription"));
        assert!(requests[0].server_insecure);
        assert_eq!(requests[1].name(), "satellite.example.com");
    }

    #[test]
    fn test_manifest_reports_every_invalid_declaration() {
        let manifest = Manifest::parse(
            r#"
[[rhsm_register]]
server_hostname = "@#$%foooooo^!)"

[[rhsm_register]]
server_hostname = "ok.example.com"
username = "doej"
password = "password123"
activationkeys = "1-key"
org = "acme"

[[rhsm_register]]
server_hostname = "fine.example.com"
"#,
        )
        .unwrap();

        let (requests, errors) = manifest.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(errors[1].to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_manifest_duplicate_names() {
        let manifest = Manifest::parse(
            r#"
[[rhsm_register]]
server_hostname = "a.example.com"

[[rhsm_register]]
identity = "a.example.com"
ensure = "absent"
"#,
        )
        .unwrap();

        let (requests, errors) = manifest.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].resource, "a.example.com");
    }

    #[test]
    fn test_manifest_accepts_key_array() {
        let manifest = Manifest::parse(
            r#"
[[rhsm_register]]
server_hostname = "subscription.example.com"
activationkeys = ["1-key", "2-key"]
org = "acme"
"#,
        )
        .unwrap();

        let (requests, errors) = manifest.requests();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(
            requests[0].get("activationkeys"),
            Some(RawValue::from("1-key,2-key"))
        );
    }

    #[test]
    fn test_manifest_odd_value_types_are_attribute_errors() {
        let manifest = Manifest::parse(
            r#"
[[rhsm_register]]
server_hostname = "subscription.example.com"
proxy_hostname = "proxy.example.com"
proxy_port = 3128.5
org = ["a", 1]

[[rhsm_register]]
server_hostname = "fine.example.com"
"#,
        )
        .unwrap();

        let (requests, errors) = manifest.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(errors.len(), 1);
        let messages = errors[0].to_string();
        assert!(messages.contains("proxy_port"), "{messages}");
        assert!(messages.contains("float"), "{messages}");
        assert!(messages.contains("org"), "{messages}");
    }

    #[test]
    fn test_manifest_load_from_file() {
        let file = write_temp("[[rhsm_register]]\nserver_hostname = \"h.example.com\"\n");
        let manifest = Manifest::load(file.path()).unwrap();
        assert_eq!(manifest.rhsm_register.len(), 1);
    }

    #[test]
    fn test_manifest_rejects_unknown_tables() {
        assert!(Manifest::parse("[[package]]\nname = \"x\"\n").is_err());
    }
}
