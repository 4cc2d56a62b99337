//! Validated desired state for one `rhsm_register` resource.

use crate::error::{ResourceError, ValidationError};
use crate::params::{self, Ensure, RawValue, Value};
use crate::schema::{self, ATTRIBUTES, NAMEVAR};
use std::collections::BTreeMap;
use std::fmt;

const REDACTED: &str = "[redacted]";

/// How the host authenticates when registering.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// No credentials declared; the tool may prompt or fail on its own
    None,
    /// Username and password
    Credentials { username: String, password: String },
    /// Activation keys, always paired with an org
    ActivationKeys(Vec<String>),
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
            Self::ActivationKeys(keys) => f.debug_tuple("ActivationKeys").field(keys).finish(),
        }
    }
}

/// What to attach after registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Nothing is attached
    None,
    /// Attach a specific pool
    Pool(String),
    /// Let the tool pick subscriptions, optionally for a service level
    Auto { servicelevel: Option<String> },
}

/// HTTP proxy used to reach the entitlement server.
#[derive(Clone, PartialEq, Eq)]
pub struct Proxy {
    pub hostname: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// A fully validated registration request.
///
/// Built once from declared attributes with [`RegistrationRequest::from_attributes`]
/// and immutable afterwards. Mutually exclusive options are encoded in the
/// [`Authentication`] and [`Subscription`] enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub server_hostname: String,
    pub ensure: Ensure,
    pub server_insecure: bool,
    pub server_prefix: Option<String>,
    pub rhsm_baseurl: Option<String>,
    pub rhsm_cacert: Option<String>,
    pub auth: Authentication,
    pub subscription: Subscription,
    pub environment: Option<String>,
    pub org: Option<String>,
    pub force: bool,
    pub proxy: Option<Proxy>,
}

impl RegistrationRequest {
    /// Validate declared attributes and build a request.
    ///
    /// Every violation is collected; the request is only built when there
    /// are none.
    pub fn from_attributes<I, K>(attributes: I) -> Result<Self, ResourceError>
    where
        I: IntoIterator<Item = (K, RawValue)>,
        K: AsRef<str>,
    {
        let mut errors = Vec::new();
        let mut raw: BTreeMap<&'static str, RawValue> = BTreeMap::new();

        for (name, value) in attributes {
            let name = name.as_ref();
            let Some(attr) = schema::attribute(name) else {
                errors.push(ValidationError::UnknownAttribute(name.to_string()));
                continue;
            };
            match raw.get(attr.name) {
                Some(existing) if *existing != value => {
                    errors.push(ValidationError::InvalidValue {
                        attribute: attr.name.to_string(),
                        value: value.to_string(),
                        reason: format!("already declared as '{existing}'"),
                    });
                }
                _ => {
                    raw.insert(attr.name, value);
                }
            }
        }

        let resource = match raw.get(NAMEVAR) {
            Some(value) => value.to_string(),
            None => {
                errors.push(ValidationError::MissingNamevar(NAMEVAR.to_string()));
                "<unnamed>".to_string()
            }
        };

        let mut values: BTreeMap<&'static str, Value> = BTreeMap::new();
        for attr in ATTRIBUTES {
            if let Some(value) = raw.get(attr.name) {
                match params::validate(attr, value) {
                    Ok(valid) => {
                        values.insert(attr.name, valid);
                    }
                    Err(e) => errors.push(e),
                }
            }
        }

        errors.extend(check_relationships(&raw, &values));

        if !errors.is_empty() {
            return Err(ResourceError { resource, errors });
        }

        Ok(Self::assemble(values))
    }

    /// Build from validated values. Relationship rules have already passed.
    fn assemble(mut values: BTreeMap<&'static str, Value>) -> Self {
        let mut text = |name: &str| match values.remove(name) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        };

        let server_hostname = text(NAMEVAR).unwrap_or_default();
        let server_prefix = text("server_prefix");
        let rhsm_baseurl = text("rhsm_baseurl");
        let rhsm_cacert = text("rhsm_cacert");
        let username = text("username");
        let password = text("password");
        let pool = text("pool");
        let environment = text("environment");
        let org = text("org");
        let servicelevel = text("servicelevel");
        let proxy_hostname = text("proxy_hostname");
        let proxy_user = text("proxy_user");
        let proxy_password = text("proxy_password");

        let flag = |name: &str| matches!(values.get(name), Some(Value::Bool(true)));
        let server_insecure = flag("server_insecure");
        let autosubscribe = flag("autosubscribe");
        let force = flag("force");

        let ensure = match values.get("ensure") {
            Some(Value::Ensure(ensure)) => *ensure,
            _ => Ensure::default(),
        };
        let proxy_port = match values.get("proxy_port") {
            Some(Value::Port(port)) => Some(*port),
            _ => None,
        };

        let auth = match (username, password, values.remove("activationkeys")) {
            (Some(username), Some(password), _) => Authentication::Credentials { username, password },
            (_, _, Some(Value::Keys(keys))) => Authentication::ActivationKeys(keys),
            _ => Authentication::None,
        };

        let subscription = match pool {
            Some(pool) => Subscription::Pool(pool),
            None if autosubscribe => Subscription::Auto { servicelevel },
            None => Subscription::None,
        };

        let proxy = proxy_hostname.map(|hostname| Proxy {
            hostname,
            port: proxy_port,
            user: proxy_user,
            password: proxy_password,
        });

        Self {
            server_hostname,
            ensure,
            server_insecure,
            server_prefix,
            rhsm_baseurl,
            rhsm_cacert,
            auth,
            subscription,
            environment,
            org,
            force,
            proxy,
        }
    }

    /// Resource name, i.e. the namevar value.
    pub fn name(&self) -> &str {
        &self.server_hostname
    }

    /// Read an attribute back in its normalized form.
    ///
    /// Booleans and `ensure` always have a value; other attributes return
    /// `None` when they were not declared. Namevar aliases are accepted.
    pub fn get(&self, name: &str) -> Option<RawValue> {
        let text = |s: &Option<String>| s.clone().map(RawValue::String);
        let proxy = self.proxy.as_ref();

        match schema::canonical_name(name) {
            NAMEVAR => Some(RawValue::String(self.server_hostname.clone())),
            "ensure" => Some(RawValue::String(self.ensure.to_string())),
            "server_insecure" => Some(RawValue::Bool(self.server_insecure)),
            "autosubscribe" => Some(RawValue::Bool(self.autosubscribe())),
            "force" => Some(RawValue::Bool(self.force)),
            "server_prefix" => text(&self.server_prefix),
            "rhsm_baseurl" => text(&self.rhsm_baseurl),
            "rhsm_cacert" => text(&self.rhsm_cacert),
            "environment" => text(&self.environment),
            "org" => text(&self.org),
            "username" => match &self.auth {
                Authentication::Credentials { username, .. } => Some(username.as_str().into()),
                _ => None,
            },
            "password" => match &self.auth {
                Authentication::Credentials { password, .. } => Some(password.as_str().into()),
                _ => None,
            },
            "activationkeys" => match &self.auth {
                Authentication::ActivationKeys(keys) => Some(RawValue::String(keys.join(","))),
                _ => None,
            },
            "pool" => match &self.subscription {
                Subscription::Pool(pool) => Some(pool.as_str().into()),
                _ => None,
            },
            "servicelevel" => match &self.subscription {
                Subscription::Auto { servicelevel } => text(servicelevel),
                _ => None,
            },
            "proxy_hostname" => proxy.map(|p| p.hostname.as_str().into()),
            "proxy_port" => proxy.and_then(|p| p.port).map(|p| RawValue::Integer(i64::from(p))),
            "proxy_user" => proxy.and_then(|p| text(&p.user)),
            "proxy_password" => proxy.and_then(|p| text(&p.password)),
            _ => None,
        }
    }

    /// Whether subscriptions are auto-attached.
    pub fn autosubscribe(&self) -> bool {
        matches!(self.subscription, Subscription::Auto { .. })
    }

    /// Pool to attach after registering.
    pub fn pool(&self) -> Option<&str> {
        match &self.subscription {
            Subscription::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    /// Server URL passed to the tool: hostname followed by the prefix.
    pub fn server_url(&self) -> String {
        match &self.server_prefix {
            Some(prefix) if prefix.starts_with('/') => format!("{}{}", self.server_hostname, prefix),
            Some(prefix) => format!("{}/{}", self.server_hostname, prefix),
            None => self.server_hostname.clone(),
        }
    }
}

/// Cross-attribute rules over the whole declared set.
///
/// Presence is judged on raw input so a conflict is reported even when one
/// of the values is also malformed. Booleans count as set only when true.
fn check_relationships(
    raw: &BTreeMap<&'static str, RawValue>,
    values: &BTreeMap<&'static str, Value>,
) -> Vec<ValidationError> {
    let set = |name: &str| match values.get(name) {
        Some(Value::Bool(b)) => *b,
        _ => raw.contains_key(name),
    };
    let mut errors = Vec::new();

    let credentials = set("username") || set("password");
    if credentials && set("activationkeys") {
        let first = if set("username") { "username" } else { "password" };
        errors.push(conflict(first, "activationkeys"));
    }
    errors.extend(require_pair(&set, "username", "password"));
    errors.extend(require_pair(&set, "password", "username"));

    if set("activationkeys") && !set("org") {
        errors.push(missing("activationkeys", "org"));
    }

    if set("pool") && set("autosubscribe") {
        errors.push(conflict("pool", "autosubscribe"));
    }
    if set("servicelevel") && !set("autosubscribe") {
        errors.push(missing("servicelevel", "autosubscribe"));
    }

    for dependent in ["proxy_port", "proxy_user", "proxy_password"] {
        if set(dependent) && !set("proxy_hostname") {
            errors.push(missing(dependent, "proxy_hostname"));
        }
    }
    errors.extend(require_pair(&set, "proxy_user", "proxy_password"));
    errors.extend(require_pair(&set, "proxy_password", "proxy_user"));

    errors
}

fn require_pair(set: &impl Fn(&str) -> bool, present: &str, other: &str) -> Option<ValidationError> {
    (set(present) && !set(other)).then(|| missing(present, other))
}

fn conflict(first: &str, second: &str) -> ValidationError {
    ValidationError::ConflictingParameters {
        first: first.to_string(),
        second: second.to_string(),
    }
}

fn missing(present: &str, other: &str) -> ValidationError {
    ValidationError::MissingRequiredPair {
        present: present.to_string(),
        missing: other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(attrs: &[(&str, RawValue)]) -> Result<RegistrationRequest, ResourceError> {
        RegistrationRequest::from_attributes(attrs.iter().cloned())
    }

    fn has_error(err: &ResourceError, pred: impl Fn(&ValidationError) -> bool) -> bool {
        err.errors.iter().any(pred)
    }

    #[test]
    fn test_namevar_round_trips() {
        let req = build(&[("server_hostname", "foo".into())]).unwrap();
        assert_eq!(req.get("server_hostname"), Some("foo".into()));
        assert_eq!(req.get("name"), Some("foo".into()));
        assert_eq!(req.name(), "foo");
        assert_eq!(req.ensure, Ensure::Present);
    }

    #[test]
    fn test_namevar_aliases() {
        let req = build(&[("name", "example.com".into())]).unwrap();
        assert_eq!(req.server_hostname, "example.com");
        let req = build(&[("identity", "example.com".into())]).unwrap();
        assert_eq!(req.get("name"), Some("example.com".into()));
    }

    #[test]
    fn test_rejects_invalid_namevar() {
        let err = build(&[("server_hostname", "@#$%foooooo^!)".into())]).unwrap_err();
        assert!(has_error(&err, |e| matches!(e, ValidationError::InvalidHostname { .. })));
    }

    #[test]
    fn test_missing_namevar() {
        let err = build(&[("force", true.into())]).unwrap_err();
        assert_eq!(err.resource, "<unnamed>");
        assert!(has_error(&err, |e| matches!(e, ValidationError::MissingNamevar(_))));
    }

    #[test]
    fn test_boolean_parameters_round_trip() {
        for param in ["server_insecure", "autosubscribe", "force"] {
            let req = build(&[("server_hostname", "foo".into()), (param, true.into())]).unwrap();
            assert_eq!(req.get(param), Some(RawValue::Bool(true)), "{param}");
            let req = build(&[("server_hostname", "bar".into()), (param, false.into())]).unwrap();
            assert_eq!(req.get(param), Some(RawValue::Bool(false)), "{param}");
        }
    }

    #[test]
    fn test_boolean_parameters_reject_strings() {
        for param in ["server_insecure", "autosubscribe", "force"] {
            let err = build(&[("server_hostname", "foo".into()), (param, "bad date".into())])
                .unwrap_err();
            assert!(
                has_error(&err, |e| matches!(e, ValidationError::InvalidBoolean { .. })),
                "{param}"
            );
        }
    }

    #[test]
    fn test_baseurl_round_trips() {
        let req = build(&[
            ("server_hostname", "foo".into()),
            ("rhsm_baseurl", "http://foo:123/".into()),
        ])
        .unwrap();
        assert_eq!(req.get("rhsm_baseurl"), Some("http://foo:123/".into()));

        let req = build(&[
            ("server_hostname", "bar".into()),
            ("rhsm_baseurl", "https://a.b.c".into()),
        ])
        .unwrap();
        assert_eq!(req.get("rhsm_baseurl"), Some("https://a.b.c".into()));
    }

    #[test]
    fn test_baseurl_rejects_punctuation() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("rhsm_baseurl", "$%,,_,..!#^@(((,,,...".into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(e, ValidationError::InvalidUrl { .. })));
    }

    #[test]
    fn test_ensure_absent() {
        let req = build(&[("server_hostname", "foo".into()), ("ensure", "absent".into())]).unwrap();
        assert_eq!(req.ensure, Ensure::Absent);
        assert_eq!(req.get("ensure"), Some("absent".into()));
    }

    #[test]
    fn test_credentials_and_activation_keys_conflict() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("username", "doej".into()),
            ("password", "password123".into()),
            ("activationkeys", "1-my-activation-key".into()),
            ("org", "the cool organization".into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(
            e,
            ValidationError::ConflictingParameters { second, .. } if second == "activationkeys"
        )));
    }

    #[test]
    fn test_conflict_reported_even_with_invalid_values() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("username", "".into()),
            ("password", "".into()),
            ("activationkeys", ",,".into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(e, ValidationError::ConflictingParameters { .. })));
    }

    #[test]
    fn test_username_requires_password() {
        let err = build(&[("server_hostname", "foo".into()), ("username", "doej".into())])
            .unwrap_err();
        assert!(has_error(&err, |e| matches!(
            e,
            ValidationError::MissingRequiredPair { present, missing }
                if present == "username" && missing == "password"
        )));
    }

    #[test]
    fn test_activation_keys_require_org() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("activationkeys", "1-key".into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(
            e,
            ValidationError::MissingRequiredPair { missing, .. } if missing == "org"
        )));

        let req = build(&[
            ("server_hostname", "foo".into()),
            ("activationkeys", "1-key,2-key".into()),
            ("org", "acme".into()),
        ])
        .unwrap();
        assert_eq!(
            req.auth,
            Authentication::ActivationKeys(vec!["1-key".to_string(), "2-key".to_string()])
        );
    }

    #[test]
    fn test_pool_and_autosubscribe_conflict() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("pool", "my_awesome_subscription".into()),
            ("autosubscribe", true.into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(e, ValidationError::ConflictingParameters { .. })));

        // autosubscribe = false is not "set"
        let req = build(&[
            ("server_hostname", "foo".into()),
            ("pool", "my_awesome_subscription".into()),
            ("autosubscribe", false.into()),
        ])
        .unwrap();
        assert_eq!(req.pool(), Some("my_awesome_subscription"));
    }

    #[test]
    fn test_servicelevel_requires_autosubscribe() {
        assert!(build(&[
            ("server_hostname", "foo".into()),
            ("servicelevel", "premium".into()),
        ])
        .is_err());

        let req = build(&[
            ("server_hostname", "foo".into()),
            ("servicelevel", "premium".into()),
            ("autosubscribe", "yes".into()),
        ])
        .unwrap();
        assert_eq!(
            req.subscription,
            Subscription::Auto {
                servicelevel: Some("premium".to_string())
            }
        );
    }

    #[test]
    fn test_proxy_rules() {
        let err = build(&[("server_hostname", "foo".into()), ("proxy_port", RawValue::Integer(3128))])
            .unwrap_err();
        assert!(has_error(&err, |e| matches!(
            e,
            ValidationError::MissingRequiredPair { missing, .. } if missing == "proxy_hostname"
        )));

        let req = build(&[
            ("server_hostname", "foo".into()),
            ("proxy_hostname", "proxy.example.com".into()),
            ("proxy_port", "3128".into()),
        ])
        .unwrap();
        assert_eq!(req.get("proxy_port"), Some(RawValue::Integer(3128)));
    }

    #[test]
    fn test_unknown_and_duplicate_attributes() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("name", "bar".into()),
            ("colour", "blue".into()),
        ])
        .unwrap_err();
        assert!(has_error(&err, |e| matches!(e, ValidationError::UnknownAttribute(n) if n == "colour")));
        assert!(has_error(&err, |e| matches!(e, ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_collects_all_violations() {
        let err = build(&[
            ("server_hostname", "foo".into()),
            ("force", "maybe".into()),
            ("rhsm_baseurl", "nope".into()),
        ])
        .unwrap_err();
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn test_full_declaration() {
        let req = build(&[
            ("server_hostname", "example.com".into()),
            ("server_insecure", false.into()),
            ("server_prefix", "/subscription".into()),
            ("rhsm_baseurl", "https://cdn.example.com".into()),
            ("rhsm_cacert", "/path/to/ca.pem".into()),
            ("username", "doej".into()),
            ("password", "password123".into()),
            ("pool", "my_awesome_subscription".into()),
            ("environment", "lab".into()),
            ("force", true.into()),
            ("org", "the cool organization".into()),
        ])
        .unwrap();

        assert_eq!(
            req.auth,
            Authentication::Credentials {
                username: "doej".to_string(),
                password: "password123".to_string()
            }
        );
        assert_eq!(req.server_url(), "example.com/subscription");
        assert!(req.force);
        assert_eq!(req.get("environment"), Some("lab".into()));
        assert_eq!(req.get("activationkeys"), None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let req = build(&[
            ("server_hostname", "example.com".into()),
            ("username", "doej".into()),
            ("password", "password123".into()),
            ("proxy_hostname", "proxy.example.com".into()),
            ("proxy_user", "px".into()),
            ("proxy_password", "pxsecret".into()),
        ])
        .unwrap();

        let shown = format!("{req:?}");
        assert!(shown.contains("doej"));
        assert!(!shown.contains("password123"));
        assert!(!shown.contains("pxsecret"));
    }
}
