//! Observed registration state.

use serde::Serialize;

/// What `subscription-manager identity` reports about this host.
///
/// Recomputed on every apply and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub registered: bool,
    pub system_identity: Option<String>,
    pub current_org: Option<String>,
    pub current_environment: Option<String>,
}

impl RegistrationStatus {
    /// Status of a host that is not registered.
    pub fn unregistered() -> Self {
        Self::default()
    }

    /// Parse the output of a successful `identity` call.
    ///
    /// Lines look like `org name: Acme`; unknown keys are ignored. The org
    /// name is preferred over the org ID when both are present. Returns
    /// `None` unless the output names a system identity.
    pub fn from_identity_output(stdout: &str) -> Option<Self> {
        let mut status = Self {
            registered: true,
            ..Self::default()
        };
        let mut org_id = None;

        for line in stdout.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "system identity" => status.system_identity = Some(value.to_string()),
                "org name" => status.current_org = Some(value.to_string()),
                "org id" => org_id = Some(value.to_string()),
                "environment name" => status.current_environment = Some(value.to_string()),
                _ => {}
            }
        }

        status.system_identity.as_ref()?;
        if status.current_org.is_none() {
            status.current_org = org_id;
        }
        Some(status)
    }
}
