//! Execution engine - applies resources one at a time

use crate::context::{AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback};
use crate::diff::{DiffReport, compute_diffs};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use log::{debug, warn};

/// Execute a plan with the given options and callbacks
///
/// Every resource is previewed first; if none need changes nothing is
/// applied. Otherwise the pending changes are reported and the user is
/// asked once. Each resource is then applied in plan order, and each
/// [`Resource::apply`] queries the system afresh, so a resource sees the
/// effect of the ones before it. A resource that fails is reported as
/// [`ApplyResult::Failed`] and the executor moves on.
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let preview = compute_diffs(&plan.resources);

    if !preview.has_changes() {
        return Ok(skip_pending(&preview, "no changes", progress));
    }
    progress.on_plan(&preview.diffs);

    if opts.dry_run {
        return Ok(skip_pending(&preview, "dry run", progress));
    }

    if !confirm.confirm("Apply changes?")? {
        return Ok(skip_pending(&preview, "declined", progress));
    }

    let mut summary = ExecuteSummary::default();
    for resource in &plan.resources {
        let id = resource.id();
        progress.on_resource_start(&id, &resource.description());
        let result = apply_resource(resource.as_ref());
        progress.on_resource_complete(&id, &result);
        summary.add_result(&result);
    }

    debug!(
        "applied {} change(s), {} failure(s)",
        summary.total_changes(),
        summary.failed
    );
    Ok(summary)
}

/// Summarize a preview without applying it; pending changes become skipped
fn skip_pending<P: ProgressCallback>(
    preview: &DiffReport,
    reason: &str,
    progress: &mut P,
) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();

    for failure in &preview.failures {
        let result = ApplyResult::Failed {
            error: failure.error.clone(),
        };
        progress.on_resource_complete(&failure.resource_id, &result);
        summary.add_result(&result);
    }
    summary.no_change += preview.unchanged;

    for diff in &preview.diffs {
        let result = ApplyResult::Skipped {
            reason: reason.to_string(),
        };
        progress.on_resource_complete(&diff.resource_id, &result);
        summary.add_result(&result);
    }
    summary
}

/// Apply a single resource, turning errors into a failed result
fn apply_resource(resource: &dyn Resource) -> ApplyResult {
    match resource.apply() {
        Ok(result) => result,
        Err(e) => {
            warn!("{} failed: {e:#}", resource.id());
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AutoDecline;
    use crate::types::ResourceState;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct TestResource {
        id: String,
        should_change: bool,
        fail_query: bool,
        fail_apply: bool,
        applied: Rc<Cell<usize>>,
    }

    impl TestResource {
        fn new(id: &str, should_change: bool) -> Self {
            Self {
                id: id.into(),
                should_change,
                fail_query: false,
                fail_apply: false,
                applied: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn current_state(&self) -> Result<ResourceState> {
            if self.fail_query {
                anyhow::bail!("cannot query {}", self.id);
            }
            if self.should_change && self.applied.get() == 0 {
                Ok(ResourceState::Absent)
            } else {
                Ok(ResourceState::Present { details: None })
            }
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }

        fn apply(&self) -> Result<ApplyResult> {
            if !self.needs_change(&self.current_state()?) {
                return Ok(ApplyResult::NoChange);
            }
            self.applied.set(self.applied.get() + 1);
            if self.fail_apply {
                anyhow::bail!("apply failed for {}", self.id);
            }
            Ok(ApplyResult::Created)
        }
    }

    /// Resources sharing one switch, each wanting it on or off
    #[derive(Debug)]
    struct Switch {
        id: &'static str,
        want_on: bool,
        on: Rc<Cell<bool>>,
    }

    impl Switch {
        fn state(on: bool) -> ResourceState {
            if on {
                ResourceState::Present { details: None }
            } else {
                ResourceState::Absent
            }
        }
    }

    impl Resource for Switch {
        fn id(&self) -> String {
            self.id.to_string()
        }

        fn description(&self) -> String {
            format!("switch {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "switch"
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(Self::state(self.on.get()))
        }

        fn desired_state(&self) -> ResourceState {
            Self::state(self.want_on)
        }

        fn apply(&self) -> Result<ApplyResult> {
            if self.on.get() == self.want_on {
                return Ok(ApplyResult::NoChange);
            }
            self.on.set(self.want_on);
            Ok(if self.want_on {
                ApplyResult::Created
            } else {
                ApplyResult::Removed
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<String>,
        completed: Vec<(String, ApplyResult)>,
    }

    impl ProgressCallback for Recorder {
        fn on_resource_start(&mut self, id: &str, _description: &str) {
            self.started.push(id.to_string());
        }

        fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
            self.completed.push((id.to_string(), result.clone()));
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let result = execute_simple(ExecutionPlan::new(), ExecuteOptions::default()).unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_execute_no_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource::new("test1", false)));

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();
        assert_eq!(result.no_change, 1);
        assert_eq!(result.total_changes(), 0);
    }

    #[test]
    fn test_execute_with_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(TestResource::new("test1", true)));
        plan.add_resource(Box::new(TestResource::new("test2", false)));

        let result = execute_simple(plan, ExecuteOptions::default()).unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.no_change, 1);
    }

    #[test]
    fn test_later_resource_sees_earlier_change() {
        let on = Rc::new(Cell::new(true));
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Switch {
            id: "off",
            want_on: false,
            on: Rc::clone(&on),
        }));
        plan.add_resource(Box::new(Switch {
            id: "on",
            want_on: true,
            on: Rc::clone(&on),
        }));

        let mut recorder = Recorder::default();
        let summary = execute(
            plan,
            ExecuteOptions::default(),
            &mut recorder,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.created, 1);
        assert!(on.get());
        assert_eq!(recorder.started, vec!["off", "on"]);
    }

    #[test]
    fn test_failures_do_not_stop_other_resources() {
        let mut broken_query = TestResource::new("query", true);
        broken_query.fail_query = true;
        let mut broken_apply = TestResource::new("apply", true);
        broken_apply.fail_apply = true;
        let healthy = TestResource::new("healthy", true);
        let healthy_count = Rc::clone(&healthy.applied);

        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(broken_query));
        plan.add_resource(Box::new(broken_apply));
        plan.add_resource(Box::new(healthy));

        let mut recorder = Recorder::default();
        let summary = execute(
            plan,
            ExecuteOptions::default(),
            &mut recorder,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.created, 1);
        assert_eq!(healthy_count.get(), 1);
        assert!(matches!(
            &recorder.completed[0],
            (id, ApplyResult::Failed { error }) if id == "query" && error.contains("cannot query")
        ));
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let resource = TestResource::new("test1", true);
        let applied = Rc::clone(&resource.applied);
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(resource));

        let opts = ExecuteOptions { dry_run: true };
        let summary = execute(plan, opts, &mut NoProgress, &mut AutoDecline).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(applied.get(), 0);
    }

    #[test]
    fn test_declined_confirmation_skips() {
        let resource = TestResource::new("test1", true);
        let applied = Rc::clone(&resource.applied);
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(resource));

        let mut recorder = Recorder::default();
        let summary = execute(
            plan,
            ExecuteOptions::default(),
            &mut recorder,
            &mut AutoDecline,
        )
        .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(applied.get(), 0);
        assert!(recorder.started.is_empty());
    }
}
