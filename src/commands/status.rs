//! `rhsm-register status` - show this host's registration

use crate::Context;
use crate::cli::StatusArgs;
use crate::ui;
use anyhow::Result;
use colored::Colorize;

pub fn run(ctx: &Context, args: StatusArgs) -> Result<()> {
    let provider = super::provider(ctx)?;
    let status = provider.status()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    ui::header("Registration");
    let state = if status.registered {
        "registered".green()
    } else {
        "not registered".yellow()
    };
    ui::kv("status", &state.to_string());
    if status.registered {
        ui::kv("system identity", &ui::or_none(status.system_identity.as_deref()));
        ui::kv("organization", &ui::or_none(status.current_org.as_deref()));
        ui::kv("environment", &ui::or_none(status.current_environment.as_deref()));
    }
    Ok(())
}
