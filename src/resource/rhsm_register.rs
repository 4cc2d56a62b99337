//! rhsm_register resource - host registration with a subscription service

use anyhow::Result;
use declarative::{ApplyResult, Resource, ResourceState};
use rhsm::provider::decide;
use rhsm::{Change, Ensure, Provider, RegistrationRequest, RegistrationStatus, schema};
use std::fmt;
use std::rc::Rc;

/// One declared registration, reconciled through a shared provider
pub struct RhsmRegister {
    request: RegistrationRequest,
    provider: Rc<Provider>,
}

impl RhsmRegister {
    pub fn new(request: RegistrationRequest, provider: Rc<Provider>) -> Self {
        Self { request, provider }
    }
}

impl fmt::Debug for RhsmRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The request holds secrets; show only the identity
        f.debug_struct("RhsmRegister")
            .field("server_hostname", &self.request.server_hostname)
            .field("ensure", &self.request.ensure)
            .finish_non_exhaustive()
    }
}

fn state_from_status(status: &RegistrationStatus) -> ResourceState {
    if !status.registered {
        return ResourceState::Absent;
    }
    let details = match (&status.system_identity, &status.current_org) {
        (Some(id), Some(org)) => Some(format!("{id} ({org})")),
        (Some(id), None) => Some(id.clone()),
        (None, org) => org.clone(),
    };
    ResourceState::Present { details }
}

impl Resource for RhsmRegister {
    fn id(&self) -> String {
        self.request.name().to_string()
    }

    fn description(&self) -> String {
        match self.request.ensure {
            Ensure::Present if self.request.force => {
                format!("Force registration with {}", self.request.server_url())
            }
            Ensure::Present => format!("Register with {}", self.request.server_url()),
            Ensure::Absent => format!("Unregister from {}", self.request.name()),
        }
    }

    fn resource_type(&self) -> &'static str {
        schema::RESOURCE_TYPE
    }

    fn current_state(&self) -> Result<ResourceState> {
        let status = self.provider.status()?;
        Ok(state_from_status(&status))
    }

    fn desired_state(&self) -> ResourceState {
        match self.request.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn needs_change(&self, current: &ResourceState) -> bool {
        let status = RegistrationStatus {
            registered: current.is_present(),
            ..RegistrationStatus::default()
        };
        decide(&self.request, &status).is_change()
    }

    fn apply(&self) -> Result<ApplyResult> {
        // Queries status again before acting
        let outcome = self.provider.reconcile(&self.request)?;
        for command in &outcome.commands {
            log::info!("ran: {command}");
        }

        Ok(match outcome.change {
            Change::Registered => ApplyResult::Created,
            Change::Reregistered => ApplyResult::Modified,
            Change::Unregistered => ApplyResult::Removed,
            Change::AlreadyRegistered => ApplyResult::Skipped {
                reason: "already registered".to_string(),
            },
            Change::Unchanged => ApplyResult::NoChange,
        })
    }
}
