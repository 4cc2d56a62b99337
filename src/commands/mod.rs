pub mod apply;
pub mod plan;
pub mod schema;
pub mod status;
pub mod validate;

use crate::config::{Manifest, Settings};
use crate::ui;
use crate::Context;
use anyhow::{Context as _, Result, bail};
use rhsm::{Provider, RegistrationRequest, ResourceError};
use std::path::Path;

/// Load and validate a manifest, printing every construction error.
///
/// Nothing is returned unless every declaration is valid, so no command
/// ever runs for a partially valid manifest.
pub fn load_requests(path: &Path) -> Result<Vec<RegistrationRequest>> {
    let manifest = Manifest::load(path)?;
    let (requests, errors) = manifest.requests();
    if !errors.is_empty() {
        report_resource_errors(&errors);
        bail!(
            "{} in {}",
            ui::count(errors.len(), "invalid resource"),
            path.display()
        );
    }
    Ok(requests)
}

/// Print one block per invalid resource
pub fn report_resource_errors(errors: &[ResourceError]) {
    for error in errors {
        ui::error(&format!("rhsm_register[{}]", error.resource));
        for violation in &error.errors {
            ui::dim(&violation.to_string());
        }
    }
}

/// Build a provider from the settings file selected on the command line
pub fn provider(ctx: &Context) -> Result<Provider> {
    let settings = Settings::load(ctx.config.as_deref())?;
    log::debug!("settings: {settings:?}");
    Provider::new(settings.provider_settings()).context("Invalid provider settings")
}
