//! `rhsm-register apply` - converge the host to the manifest

use crate::Context;
use crate::cli::ApplyArgs;
use crate::resource::RhsmRegister;
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan, ProgressCallback,
    ResourceDiff,
};
use std::rc::Rc;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let requests = super::load_requests(&args.manifest)?;
    let provider = Rc::new(super::provider(ctx)?);

    let mut plan = ExecutionPlan::new();
    for request in requests {
        plan.add_resource(Box::new(RhsmRegister::new(request, Rc::clone(&provider))));
    }
    let plan = plan.filter_by_target(args.target.as_deref());

    if plan.is_empty() {
        ui::warn("No resources to apply");
        return Ok(());
    }

    if !ctx.quiet {
        let title = if args.dry_run {
            "Apply (dry run)"
        } else {
            "Apply"
        };
        ui::header(title);
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
    };
    let mut progress = TerminalProgress {
        quiet: ctx.quiet,
        verbose: ctx.verbose > 0,
    };
    let mut confirm = PromptConfirm {
        assume_yes: args.yes,
    };

    let summary = declarative::execute(plan, opts, &mut progress, &mut confirm)?;
    print_summary(&summary, args.dry_run, ctx.quiet);

    if !summary.is_success() {
        bail!("{} failed", ui::count(summary.failed, "resource"));
    }
    Ok(())
}

fn print_summary(summary: &ExecuteSummary, dry_run: bool, quiet: bool) {
    if quiet {
        return;
    }
    println!();
    if dry_run {
        ui::info(&format!(
            "{} would be made",
            ui::count(summary.skipped, "change")
        ));
    } else if summary.total_changes() == 0 && summary.is_success() {
        ui::success("Already in the desired state");
    } else {
        ui::info(&format!(
            "{}, {} unchanged, {} skipped, {} failed",
            ui::count(summary.total_changes(), "change"),
            summary.no_change,
            summary.skipped,
            summary.failed
        ));
    }
}

/// Prints the plan and per-resource results
struct TerminalProgress {
    quiet: bool,
    /// Announce each resource before applying it
    verbose: bool,
}

impl ProgressCallback for TerminalProgress {
    fn on_plan(&mut self, diffs: &[ResourceDiff]) {
        if self.quiet {
            return;
        }
        for diff in diffs {
            let symbol = if diff.is_addition() {
                "+".green()
            } else if diff.is_removal() {
                "-".red()
            } else {
                "~".yellow()
            };
            println!("  {} {}", symbol, diff.description);
        }
        println!();
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        log::debug!("applying {id}");
        if self.verbose && !self.quiet {
            ui::dim(&format!("{id}: {description}"));
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::Failed { error } => ui::error(&format!("{id}: {error}")),
            _ if self.quiet => {}
            ApplyResult::Created => ui::success(&format!("{id}: registered")),
            ApplyResult::Modified => ui::success(&format!("{id}: re-registered")),
            ApplyResult::Removed => ui::success(&format!("{id}: unregistered")),
            ApplyResult::NoChange => ui::dim(&format!("{id}: no change")),
            ApplyResult::Skipped { reason } => ui::dim(&format!("{id}: skipped ({reason})")),
        }
    }
}

/// Asks on the terminal unless `--yes` was given
struct PromptConfirm {
    assume_yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assume_yes_skips_prompt() {
        let mut confirm = PromptConfirm { assume_yes: true };
        assert!(confirm.confirm("Apply changes?").unwrap());
    }
}
