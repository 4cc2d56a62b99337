use crate::config::Manifest;
use crate::ui;
use anyhow::{Result, bail};
use std::path::Path;

/// Validate a manifest without running anything
pub fn run(manifest: &Path) -> Result<()> {
    let parsed = Manifest::load(manifest)?;
    let (requests, errors) = parsed.requests();

    for request in &requests {
        ui::success(&format!("rhsm_register[{}]", request.name()));
    }
    if !errors.is_empty() {
        super::report_resource_errors(&errors);
        bail!("{} invalid", ui::count(errors.len(), "resource"));
    }

    if requests.is_empty() {
        ui::warn("Manifest declares no rhsm_register resources");
    } else {
        ui::info(&format!("{} valid", ui::count(requests.len(), "resource")));
    }
    Ok(())
}
