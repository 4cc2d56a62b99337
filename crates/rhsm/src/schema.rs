//! Static attribute schema for the `rhsm_register` resource type.
//!
//! The schema is a fixed table built at compile time. Construction of a
//! [`RegistrationRequest`](crate::RegistrationRequest) walks this table to
//! pick the validator for each declared attribute, and the CLI prints it as
//! the resource documentation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource type name as it appears in manifests.
pub const RESOURCE_TYPE: &str = "rhsm_register";

/// Name of the namevar attribute.
pub const NAMEVAR: &str = "server_hostname";

/// Input names accepted as aliases of the namevar.
pub const NAMEVAR_ALIASES: &[&str] = &["name", "identity"];

/// Whether an attribute is compared against observed state or only
/// configures how the change is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Observable and compared against the real system
    Property,
    /// Configures the action only
    Param,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property => write!(f, "property"),
            Self::Param => write!(f, "param"),
        }
    }
}

/// Closed set of value kinds, each with its own validate/normalize rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// `present` or `absent`
    Ensure,
    /// Letters, digits, dots and hyphens
    Hostname,
    /// Absolute http(s) URL with a host
    Url,
    /// true/false or yes/no
    Boolean,
    /// Filesystem path, syntax only
    Path,
    /// Comma separated token list
    KeyList,
    /// TCP port number
    Port,
    /// Any non-empty single-line string
    FreeText,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ensure => "ensure",
            Self::Hostname => "hostname",
            Self::Url => "url",
            Self::Boolean => "boolean",
            Self::Path => "path",
            Self::KeyList => "key_list",
            Self::Port => "port",
            Self::FreeText => "string",
        };
        write!(f, "{name}")
    }
}

/// Describes one attribute of the resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub value_kind: ValueKind,
    pub namevar: bool,
    /// Value must never be logged or echoed
    pub sensitive: bool,
    pub doc: &'static str,
}

const fn param(name: &'static str, value_kind: ValueKind, doc: &'static str) -> AttributeDescriptor {
    AttributeDescriptor {
        name,
        kind: AttributeKind::Param,
        value_kind,
        namevar: false,
        sensitive: false,
        doc,
    }
}

const fn secret(name: &'static str, doc: &'static str) -> AttributeDescriptor {
    AttributeDescriptor {
        sensitive: true,
        ..param(name, ValueKind::FreeText, doc)
    }
}

/// Every attribute of `rhsm_register`, in validation order.
pub const ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor {
        name: NAMEVAR,
        kind: AttributeKind::Param,
        value_kind: ValueKind::Hostname,
        namevar: true,
        sensitive: false,
        doc: "The hostname of the entitlement server. Identifies the resource.",
    },
    AttributeDescriptor {
        name: "ensure",
        kind: AttributeKind::Property,
        value_kind: ValueKind::Ensure,
        namevar: false,
        sensitive: false,
        doc: "Whether the host should be registered (present) or unregistered (absent).",
    },
    param(
        "server_insecure",
        ValueKind::Boolean,
        "Skip SSL certificate verification when talking to the entitlement server.",
    ),
    param(
        "server_prefix",
        ValueKind::FreeText,
        "Path prefix of the entitlement server API, e.g. /subscription.",
    ),
    param(
        "rhsm_baseurl",
        ValueKind::Url,
        "Base URL of the content delivery network serving repositories.",
    ),
    param(
        "rhsm_cacert",
        ValueKind::Path,
        "Path to the CA certificate used to verify the content delivery network.",
    ),
    param(
        "username",
        ValueKind::FreeText,
        "Username used to register. Requires password; excludes activationkeys.",
    ),
    secret(
        "password",
        "Password used to register. Requires username; excludes activationkeys.",
    ),
    param(
        "activationkeys",
        ValueKind::KeyList,
        "Comma separated activation keys. Requires org; excludes username and password.",
    ),
    param(
        "pool",
        ValueKind::FreeText,
        "Subscription pool to attach after registering. Excludes autosubscribe.",
    ),
    param(
        "environment",
        ValueKind::FreeText,
        "Environment within the organization to register into.",
    ),
    param(
        "autosubscribe",
        ValueKind::Boolean,
        "Automatically attach the best matching subscriptions. Excludes pool.",
    ),
    param(
        "force",
        ValueKind::Boolean,
        "Register again even when the host is already registered.",
    ),
    param(
        "org",
        ValueKind::FreeText,
        "Organization to register the host into.",
    ),
    param(
        "servicelevel",
        ValueKind::FreeText,
        "Service level used when auto-attaching subscriptions. Requires autosubscribe.",
    ),
    param(
        "proxy_hostname",
        ValueKind::Hostname,
        "Hostname of the HTTP proxy used to reach the entitlement server.",
    ),
    param(
        "proxy_port",
        ValueKind::Port,
        "Port of the HTTP proxy. Requires proxy_hostname.",
    ),
    param(
        "proxy_user",
        ValueKind::FreeText,
        "User for proxy authentication. Requires proxy_password.",
    ),
    secret(
        "proxy_password",
        "Password for proxy authentication. Requires proxy_user.",
    ),
];

/// Look up an attribute by its declared name or a namevar alias.
pub fn attribute(name: &str) -> Option<&'static AttributeDescriptor> {
    let name = canonical_name(name);
    ATTRIBUTES.iter().find(|a| a.name == name)
}

/// Map namevar aliases to the namevar; other names pass through.
pub fn canonical_name(name: &str) -> &str {
    if NAMEVAR_ALIASES.contains(&name) {
        NAMEVAR
    } else {
        name
    }
}

/// Kind of the named attribute.
pub fn attrtype(name: &str) -> Option<AttributeKind> {
    attribute(name).map(|a| a.kind)
}

/// Attributes that identify a resource instance.
pub fn key_attributes() -> Vec<&'static str> {
    ATTRIBUTES
        .iter()
        .filter(|a| a.namevar)
        .map(|a| a.name)
        .collect()
}
