//! Execution planner - builds resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An ordered list of resources, applied one at a time in declaration order
#[derive(Default)]
pub struct ExecutionPlan {
    pub resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the end of the plan
    pub fn add_resource(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            resources: self
                .resources
                .into_iter()
                .filter(|r| predicate(r.as_ref()))
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type", "type.name" or a bare name
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Only the first dot separates type from name, so names may be dotted
/// hostnames.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        Some((ty, name)) if !ty.is_empty() && ty.contains('_') => {
            (Some(ty.to_string()), Some(name.to_string()))
        }
        _ if target.contains('_') && !target.contains('.') => (Some(target.to_string()), None),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type
        && resource.resource_type() != rt
    {
        return false;
    }

    if let Some(n) = name
        && resource.id() != n
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplyResult, ResourceState};
    use anyhow::Result;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Resource for Named {
        fn id(&self) -> String {
            self.0.to_string()
        }

        fn description(&self) -> String {
            self.0.to_string()
        }

        fn resource_type(&self) -> &'static str {
            "rhsm_register"
        }

        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }

        fn desired_state(&self) -> ResourceState {
            ResourceState::Absent
        }

        fn apply(&self) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    fn plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Named("subscription.example.com")));
        plan.add_resource(Box::new(Named("satellite.example.com")));
        plan
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("rhsm_register"),
            (Some("rhsm_register".to_string()), None)
        );
        assert_eq!(
            parse_target("rhsm_register.a.example.com"),
            (
                Some("rhsm_register".to_string()),
                Some("a.example.com".to_string())
            )
        );
        assert_eq!(
            parse_target("a.example.com"),
            (None, Some("a.example.com".to_string()))
        );
    }

    #[test]
    fn test_filter_by_target() {
        assert_eq!(plan().filter_by_target(None).total_resources(), 2);
        assert_eq!(
            plan().filter_by_target(Some("rhsm_register")).total_resources(),
            2
        );

        let filtered = plan().filter_by_target(Some("satellite.example.com"));
        assert_eq!(filtered.total_resources(), 1);
        assert_eq!(filtered.resources[0].id(), "satellite.example.com");

        let filtered = plan().filter_by_target(Some("rhsm_register.subscription.example.com"));
        assert_eq!(filtered.total_resources(), 1);

        assert!(plan().filter_by_target(Some("other_type")).is_empty());
    }
}
