//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        if !resource.needs_change(&current) {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired: resource.desired_state(),
        }))
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

/// A resource whose current state could not be determined
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffFailure {
    pub resource_id: String,
    pub error: String,
}

/// Diffs for a set of resources, plus the ones that could not be inspected
#[derive(Debug, Clone, Default)]
pub struct DiffReport {
    pub diffs: Vec<ResourceDiff>,
    pub failures: Vec<DiffFailure>,
    /// Resources already in the desired state
    pub unchanged: usize,
}

impl DiffReport {
    /// Check if any resource needs changes
    pub fn has_changes(&self) -> bool {
        !self.diffs.is_empty()
    }
}

/// Compute diffs for a list of resources
///
/// Each resource is inspected on its own; a failure is recorded and does
/// not stop the others.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> DiffReport {
    let mut report = DiffReport::default();
    for resource in resources {
        match ResourceDiff::from_resource(resource.as_ref()) {
            Ok(Some(diff)) => report.diffs.push(diff),
            Ok(None) => report.unchanged += 1,
            Err(e) => {
                log::debug!("cannot determine state of {}: {e:#}", resource.id());
                report.failures.push(DiffFailure {
                    resource_id: resource.id(),
                    error: format!("{e:#}"),
                });
            }
        }
    }
    report
}
