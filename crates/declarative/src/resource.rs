//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
///
/// The executor previews every resource with [`Resource::current_state`]
/// before asking for confirmation, but [`Resource::apply`] must query the
/// system again: an earlier resource in the same run may have changed it.
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyResult, Resource, ResourceState};
///
/// #[derive(Debug)]
/// struct Marker { path: String }
///
/// impl Resource for Marker {
///     fn id(&self) -> String { self.path.clone() }
///     fn description(&self) -> String { format!("Marker file at {}", self.path) }
///     fn resource_type(&self) -> &'static str { "marker" }
///
///     fn current_state(&self) -> Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self) -> Result<ApplyResult> {
///         if self.current_state()?.is_present() {
///             return Ok(ApplyResult::NoChange);
///         }
///         std::fs::write(&self.path, "")?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Unique identifier for this resource within its type
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping and filtering
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    ///
    /// This should query the system; an error means the state could not be
    /// determined and the resource must not be changed.
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Whether `current` differs from the desired state
    ///
    /// Override when a resource can need changes even though the states
    /// compare equal, e.g. a forced re-apply.
    fn needs_change(&self, current: &ResourceState) -> bool {
        *current != self.desired_state()
    }

    /// Apply changes to reach the desired state
    ///
    /// This method should:
    /// 1. Query the current state and return NoChange if it already matches
    /// 2. Make the necessary changes
    /// 3. Return the appropriate ApplyResult
    fn apply(&self) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
