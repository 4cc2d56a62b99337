//! `rhsm-register plan` - show the transition for each resource

use crate::Context;
use crate::cli::PlanArgs;
use crate::resource::RhsmRegister;
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;
use declarative::ExecutionPlan;
use rhsm::Transition;
use std::collections::HashSet;
use std::rc::Rc;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let requests = super::load_requests(&args.manifest)?;
    let provider = Rc::new(super::provider(ctx)?);

    // Reuse the executor's target matching
    let mut plan = ExecutionPlan::new();
    for request in &requests {
        plan.add_resource(Box::new(RhsmRegister::new(
            request.clone(),
            Rc::clone(&provider),
        )));
    }
    let selected: HashSet<String> = plan
        .filter_by_target(args.target.as_deref())
        .resources
        .iter()
        .map(|r| r.id())
        .collect();

    if selected.is_empty() {
        ui::warn("No resources to plan");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Plan");
    }

    let mut changes = 0;
    let mut failures = 0;
    for request in requests.iter().filter(|r| selected.contains(r.name())) {
        match provider.plan(request) {
            Ok((status, transition)) => {
                let observed = if status.registered {
                    "registered"
                } else {
                    "unregistered"
                };
                let action = match transition {
                    Transition::Register => transition.to_string().green(),
                    Transition::Reregister => transition.to_string().yellow(),
                    Transition::Unregister => transition.to_string().red(),
                    Transition::None => transition.to_string().dimmed(),
                };
                println!(
                    "  {} ({observed}, want {}): {action}",
                    request.name().bold(),
                    request.ensure
                );
                if transition.is_change() {
                    changes += 1;
                }
            }
            Err(e) => {
                failures += 1;
                ui::error(&format!("{}: {}", request.name(), e.kind().description()));
                ui::dim(&e.to_string());
            }
        }
    }

    if !ctx.quiet {
        println!();
        ui::info(&format!("{} planned", ui::count(changes, "change")));
    }

    if failures > 0 {
        bail!("{} could not be planned", ui::count(failures, "resource"));
    }
    Ok(())
}
