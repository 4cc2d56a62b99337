//! Reconciliation engine for `rhsm_register`.
//!
//! Each reconcile runs strictly in sequence: query status, decide the
//! transition, run the corrective command(s), optionally query again.
//! A failed status query aborts the resource; no state is ever assumed.

use crate::backend::{CommandLine, CommandOutput, CommandRunner, RunError, SystemRunner};
use crate::error::{Error, ProviderError, ProviderErrorKind, Result};
use crate::params::Ensure;
use crate::request::{Authentication, RegistrationRequest, Subscription};
use crate::status::RegistrationStatus;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default registration tool.
pub const DEFAULT_COMMAND: &str = "subscription-manager";

/// Default upper bound for one tool invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// How the tool reports that the host is already registered.
///
/// A register call counts as "already registered" when its output matches
/// `pattern` and, if `exit_codes` is non-empty, its exit code is listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlreadyRegisteredPolicy {
    pub exit_codes: Vec<i32>,
    pub pattern: String,
}

impl Default for AlreadyRegisteredPolicy {
    fn default() -> Self {
        Self {
            exit_codes: vec![1, 64],
            pattern: "(?i)this system is already registered".to_string(),
        }
    }
}

/// Knobs for talking to the registration tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Program to run
    pub command: String,
    /// Upper bound for a single invocation
    pub timeout: Duration,
    /// Query status again after a corrective action
    pub verify_after_apply: bool,
    pub already_registered: AlreadyRegisteredPolicy,
    /// Output of a failed `identity` call meaning "not registered"
    pub not_registered_pattern: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_after_apply: false,
            already_registered: AlreadyRegisteredPolicy::default(),
            not_registered_pattern: "(?i)not (yet )?registered".to_string(),
        }
    }
}

/// The change needed to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// unregistered -> registered
    Register,
    /// registered -> registered again, because `force` is set
    Reregister,
    /// registered -> unregistered
    Unregister,
    /// Already in the desired state
    None,
}

impl Transition {
    /// Whether a corrective command is needed.
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Reregister => write!(f, "re-register (forced)"),
            Self::Unregister => write!(f, "unregister"),
            Self::None => write!(f, "no change"),
        }
    }
}

/// What a reconcile actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Registered,
    Reregistered,
    /// Register was attempted but the tool reported an existing registration
    AlreadyRegistered,
    Unregistered,
    Unchanged,
}

/// Result of reconciling one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub transition: Transition,
    pub change: Change,
    /// State the resource ends in
    pub ensure: Ensure,
    /// Corrective commands that were run, secrets redacted
    pub commands: Vec<String>,
}

/// Decide the transition for `request` given the observed `status`.
pub fn decide(request: &RegistrationRequest, status: &RegistrationStatus) -> Transition {
    match (request.ensure, status.registered) {
        (Ensure::Present, false) => Transition::Register,
        (Ensure::Present, true) if request.force => Transition::Reregister,
        (Ensure::Present, true) => Transition::None,
        (Ensure::Absent, true) => Transition::Unregister,
        (Ensure::Absent, false) => Transition::None,
    }
}

/// Build the register command line for `request`.
pub fn register_command(program: &str, request: &RegistrationRequest) -> CommandLine {
    let mut cmd = CommandLine::new(program)
        .arg("register")
        .flag("--serverurl", request.server_url())
        .flag_opt("--baseurl", request.rhsm_baseurl.as_deref())
        .switch("--insecure", request.server_insecure);

    cmd = match &request.auth {
        Authentication::Credentials { username, password } => cmd
            .flag("--username", username)
            .flag("--password", password),
        Authentication::ActivationKeys(keys) => cmd.flag("--activationkey", keys.join(",")),
        Authentication::None => cmd,
    };

    cmd = cmd
        .flag_opt("--org", request.org.as_deref())
        .flag_opt("--environment", request.environment.as_deref());

    if let Subscription::Auto { servicelevel } = &request.subscription {
        cmd = cmd
            .arg("--auto-attach")
            .flag_opt("--servicelevel", servicelevel.as_deref());
    }

    if let Some(proxy) = &request.proxy {
        let address = match proxy.port {
            Some(port) => format!("{}:{}", proxy.hostname, port),
            None => proxy.hostname.clone(),
        };
        cmd = cmd
            .flag("--proxy", address)
            .flag_opt("--proxyuser", proxy.user.as_deref())
            .flag_opt("--proxypassword", proxy.password.as_deref());
    }

    cmd.switch("--force", request.force)
}

/// Talks to the registration tool through a [`CommandRunner`].
pub struct Provider {
    runner: Box<dyn CommandRunner>,
    settings: ProviderSettings,
    already_registered: Regex,
    not_registered: Regex,
}

impl Provider {
    /// Create a provider that spawns real processes.
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        Self::with_runner(Box::new(SystemRunner::new()), settings)
    }

    /// Create a provider with a custom runner (useful for testing).
    pub fn with_runner(runner: Box<dyn CommandRunner>, settings: ProviderSettings) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Settings(format!("bad pattern '{pattern}': {e}")))
        };
        let already_registered = compile(&settings.already_registered.pattern)?;
        let not_registered = compile(&settings.not_registered_pattern)?;

        Ok(Self {
            runner,
            settings,
            already_registered,
            not_registered,
        })
    }

    /// Query the current registration status.
    pub fn status(&self) -> std::result::Result<RegistrationStatus, ProviderError> {
        let cmd = CommandLine::new(&self.settings.command).arg("identity");
        let output = self.run(&cmd, ProviderErrorKind::StatusQuery)?;

        if output.success() {
            return RegistrationStatus::from_identity_output(&output.stdout).ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::StatusQuery,
                    cmd.redacted(),
                    output.exit_code,
                    format!("unrecognized identity output: {}", output.stdout.trim()),
                )
            });
        }
        if self.not_registered.is_match(&output.combined()) {
            return Ok(RegistrationStatus::unregistered());
        }

        Err(ProviderError::new(
            ProviderErrorKind::StatusQuery,
            cmd.redacted(),
            output.exit_code,
            output.diagnostic(),
        ))
    }

    /// Query status and decide, without changing anything.
    pub fn plan(
        &self,
        request: &RegistrationRequest,
    ) -> std::result::Result<(RegistrationStatus, Transition), ProviderError> {
        let status = self.status()?;
        let transition = decide(request, &status);
        debug!(
            "{}: registered={} ensure={} -> {}",
            request.name(),
            status.registered,
            request.ensure,
            transition
        );
        Ok((status, transition))
    }

    /// Bring the host to the state declared by `request`.
    pub fn reconcile(
        &self,
        request: &RegistrationRequest,
    ) -> std::result::Result<Outcome, ProviderError> {
        let (_, transition) = self.plan(request)?;
        self.apply(request, transition)
    }

    /// Run the commands for a previously decided `transition`.
    pub fn apply(
        &self,
        request: &RegistrationRequest,
        transition: Transition,
    ) -> std::result::Result<Outcome, ProviderError> {
        let mut commands = Vec::new();

        let change = match transition {
            Transition::None => Change::Unchanged,
            Transition::Register | Transition::Reregister => {
                let change = self.register(request, &mut commands)?;
                if change != Change::AlreadyRegistered {
                    self.verify(true, ProviderErrorKind::Registration)?;
                }
                match (change, transition) {
                    (Change::Registered, Transition::Reregister) => Change::Reregistered,
                    (change, _) => change,
                }
            }
            Transition::Unregister => {
                self.unregister(&mut commands)?;
                self.verify(false, ProviderErrorKind::Unregistration)?;
                Change::Unregistered
            }
        };

        let ensure = match change {
            Change::Unregistered => Ensure::Absent,
            Change::Unchanged => request.ensure,
            _ => Ensure::Present,
        };

        if change != Change::Unchanged {
            info!("{}: {:?}", request.name(), change);
        }

        Ok(Outcome {
            transition,
            change,
            ensure,
            commands,
        })
    }

    fn register(
        &self,
        request: &RegistrationRequest,
        commands: &mut Vec<String>,
    ) -> std::result::Result<Change, ProviderError> {
        let program = self.settings.command.as_str();

        if let Some(cacert) = &request.rhsm_cacert {
            let cmd = CommandLine::new(program)
                .arg("config")
                .flag("--rhsm.repo_ca_cert", cacert);
            self.run_checked(&cmd, ProviderErrorKind::Registration, commands)?;
        }

        let cmd = register_command(program, request);
        let output = self.run(&cmd, ProviderErrorKind::Registration)?;
        commands.push(cmd.redacted());

        if !output.success() {
            if !request.force && self.is_already_registered(&output) {
                warn!(
                    "{}: {} reports the host is already registered",
                    request.name(),
                    program
                );
                return Ok(Change::AlreadyRegistered);
            }
            return Err(ProviderError::new(
                ProviderErrorKind::Registration,
                cmd.redacted(),
                output.exit_code,
                output.diagnostic(),
            ));
        }

        if let Some(pool) = request.pool() {
            let cmd = CommandLine::new(program).arg("attach").flag("--pool", pool);
            self.run_checked(&cmd, ProviderErrorKind::Registration, commands)?;
        }

        Ok(Change::Registered)
    }

    fn unregister(&self, commands: &mut Vec<String>) -> std::result::Result<(), ProviderError> {
        let cmd = CommandLine::new(&self.settings.command).arg("unregister");
        self.run_checked(&cmd, ProviderErrorKind::Unregistration, commands)
    }

    fn verify(
        &self,
        expect_registered: bool,
        kind: ProviderErrorKind,
    ) -> std::result::Result<(), ProviderError> {
        if !self.settings.verify_after_apply {
            return Ok(());
        }

        let status = self.status()?;
        if status.registered == expect_registered {
            return Ok(());
        }

        let expected = if expect_registered { "registered" } else { "unregistered" };
        Err(ProviderError::new(
            kind,
            format!("{} identity", self.settings.command),
            Some(0),
            format!("host is not {expected} after the change"),
        ))
    }

    fn is_already_registered(&self, output: &CommandOutput) -> bool {
        let policy = &self.settings.already_registered;
        let code_matches = policy.exit_codes.is_empty()
            || output
                .exit_code
                .is_some_and(|code| policy.exit_codes.contains(&code));
        code_matches && self.already_registered.is_match(&output.combined())
    }

    /// Run a command, mapping spawn failures and timeouts to `kind`.
    fn run(
        &self,
        cmd: &CommandLine,
        kind: ProviderErrorKind,
    ) -> std::result::Result<CommandOutput, ProviderError> {
        debug!("running: {}", cmd.redacted());
        let output = self
            .runner
            .run(cmd, self.settings.timeout)
            .map_err(|e: RunError| ProviderError::new(kind, cmd.redacted(), None, e.to_string()))?;
        debug!("exit code: {:?}", output.exit_code);
        Ok(output)
    }

    /// Run a command that must exit 0.
    fn run_checked(
        &self,
        cmd: &CommandLine,
        kind: ProviderErrorKind,
        commands: &mut Vec<String>,
    ) -> std::result::Result<(), ProviderError> {
        let output = self.run(cmd, kind)?;
        commands.push(cmd.redacted());
        if output.success() {
            Ok(())
        } else {
            Err(ProviderError::new(
                kind,
                cmd.redacted(),
                output.exit_code,
                output.diagnostic(),
            ))
        }
    }
}
