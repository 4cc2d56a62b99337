//! Declarative Red Hat Subscription Management registration.
//!
//! The `rhsm_register` resource declares whether a host should be
//! registered with a subscription service. This crate provides:
//!
//! - [`schema`]: the attribute table (names, kinds, namevar, aliases)
//! - [`params`] and [`request`]: per-attribute validation and the
//!   cross-attribute rules that turn declared values into a
//!   [`RegistrationRequest`]
//! - [`provider`]: the idempotent reconcile loop that drives
//!   `subscription-manager` through a [`CommandRunner`]
//!
//! # Example
//!
//! ```no_run
//! use rhsm::{Provider, ProviderSettings, RawValue, RegistrationRequest};
//!
//! let request = RegistrationRequest::from_attributes([
//!     ("server_hostname", RawValue::from("subscription.example.com")),
//!     ("username", RawValue::from("doej")),
//!     ("password", RawValue::from("password123")),
//! ])?;
//!
//! let provider = Provider::new(ProviderSettings::default())?;
//! let outcome = provider.reconcile(&request)?;
//! println!("{:?}", outcome.change);
//! # Ok::<(), rhsm::Error>(())
//! ```

pub mod backend;
pub mod error;
pub mod params;
pub mod provider;
pub mod request;
pub mod schema;
pub mod status;

pub use backend::{CommandLine, CommandOutput, CommandRunner, RunError, SystemRunner};
pub use error::{Error, ProviderError, ProviderErrorKind, ResourceError, Result, ValidationError};
pub use params::{Ensure, RawValue};
pub use provider::{
    AlreadyRegisteredPolicy, Change, Outcome, Provider, ProviderSettings, Transition,
};
pub use request::{Authentication, Proxy, RegistrationRequest, Subscription};
pub use status::RegistrationStatus;
