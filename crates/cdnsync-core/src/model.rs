//! Entity shapes shared by the reconciler, the remote client and the state store
//!
//! Declared state ([`ServiceConfig`]) and observed state ([`ServiceSnapshot`])
//! use the same sub-resource types, so a snapshot can be compared against a
//! declaration field by field.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::{Error, Result};

/// Opaque service identifier assigned by the remote system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Wrap a remote identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as sent on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordinal of a configuration version
///
/// "No version yet" is expressed as `Option<VersionNumber>::None`, never as a
/// sentinel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The draft version every new service starts with
    pub const INITIAL: VersionNumber = VersionNumber(1);

    /// Wrap a remote version number
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// The raw ordinal
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Service record as reported by the remote system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Remote identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Version currently serving traffic, if any
    pub active_version: Option<VersionNumber>,
    /// Highest version number, whether draft, locked or active
    #[serde(default)]
    pub latest_version: Option<VersionNumber>,
}

/// Activation state of one configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version ordinal
    pub number: VersionNumber,
    /// Currently serving traffic
    pub active: bool,
    /// Locked against further edits (every version that was ever activated)
    pub locked: bool,
}

impl VersionInfo {
    /// Whether sub-resource writes are accepted
    pub fn is_writable(&self) -> bool {
        !self.active && !self.locked
    }
}

/// Outcome of remote-side validation of a draft version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    /// Whether the version may be activated
    pub valid: bool,
    /// Human-readable reason when invalid
    pub message: String,
}

impl Validation {
    /// A passing validation
    pub fn ok() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    /// A failing validation with the remote message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// A domain served by a configuration version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Domain {
    /// Fully qualified domain name, unique within a version
    pub name: String,
    /// Free-form comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Domain {
    /// Create a domain without comment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// An origin server of a configuration version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Backend {
    /// Backend name, unique within a version
    pub name: String,
    /// IPv4, IPv6 or hostname
    pub address: String,
    /// Take part in automatic load balancing
    #[serde(default = "default_true")]
    pub auto_loadbalance: bool,
    /// Milliseconds to wait between bytes
    #[serde(default = "default_between_bytes_timeout")]
    pub between_bytes_timeout: u32,
    /// Milliseconds to wait for a connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,
    /// Errors tolerated before the backend is marked down
    #[serde(default)]
    pub error_threshold: u32,
    /// Milliseconds to wait for the first byte
    #[serde(default = "default_first_byte_timeout")]
    pub first_byte_timeout: u32,
    /// Maximum concurrent connections
    #[serde(default = "default_max_conn")]
    pub max_conn: u32,
    /// Highest TLS version allowed; `None` leaves it to the remote default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tls_version: Option<String>,
    /// Lowest TLS version allowed; `None` leaves it to the remote default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tls_version: Option<String>,
    /// Port the backend listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Verify the backend certificate
    #[serde(default = "default_true")]
    pub ssl_check_cert: bool,
    /// Load balancing weight
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl Backend {
    /// Create a backend with the remote defaults for every tunable
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            auto_loadbalance: true,
            between_bytes_timeout: default_between_bytes_timeout(),
            connect_timeout: default_connect_timeout(),
            error_threshold: 0,
            first_byte_timeout: default_first_byte_timeout(),
            max_conn: default_max_conn(),
            max_tls_version: None,
            min_tls_version: None,
            port: default_port(),
            ssl_check_cert: true,
            weight: default_weight(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the TLS version bounds
    pub fn with_tls_versions(
        mut self,
        min: Option<impl Into<String>>,
        max: Option<impl Into<String>>,
    ) -> Self {
        self.min_tls_version = min.map(Into::into);
        self.max_tls_version = max.map(Into::into);
        self
    }

    /// Copy with empty TLS versions collapsed to `None`
    ///
    /// The remote system represents "unset" as an absent field, so an empty
    /// string must never reach a create request.
    pub fn normalized(&self) -> Self {
        let mut backend = self.clone();
        backend.min_tls_version = non_empty(backend.min_tls_version.take());
        backend.max_tls_version = non_empty(backend.max_tls_version.take());
        backend
    }
}

/// Scalar settings of a configuration version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Host header sent to backends; `None` means the service default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_host: Option<String>,
    /// Default cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,
}

impl Settings {
    /// Settings with the given TTL and no default host
    pub fn with_ttl(default_ttl: u32) -> Self {
        Self {
            default_host: None,
            default_ttl,
        }
    }

    /// Copy with an empty default host collapsed to `None`
    pub fn normalized(&self) -> Self {
        Self {
            default_host: non_empty(self.default_host.clone()),
            default_ttl: self.default_ttl,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_ttl(default_ttl())
    }
}

/// Declared configuration of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Display name
    pub name: String,
    /// Domains to serve
    #[serde(default)]
    pub domains: BTreeSet<Domain>,
    /// Origin servers
    #[serde(default)]
    pub backends: BTreeSet<Backend>,
    /// Default host and TTL
    #[serde(flatten)]
    pub settings: Settings,
    /// Deactivate the active version before deleting the service
    #[serde(default)]
    pub force_destroy: bool,
}

impl ServiceConfig {
    /// An empty declaration with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domains: BTreeSet::new(),
            backends: BTreeSet::new(),
            settings: Settings::default(),
            force_destroy: false,
        }
    }

    /// Add a domain
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domains.insert(domain);
        self
    }

    /// Add a backend
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends.insert(backend);
        self
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Check the declaration before any remote call is made
    ///
    /// Domains and backends are keyed by name remotely, so two members that
    /// differ in other fields but share a name are rejected here.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("Service name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name.is_empty() {
                return Err(Error::invalid_input("Domain name cannot be empty"));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(Error::invalid_input(format!(
                    "Domain {} declared more than once",
                    domain.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.name.is_empty() {
                return Err(Error::invalid_input("Backend name cannot be empty"));
            }
            if backend.address.is_empty() {
                return Err(Error::invalid_input(format!(
                    "Backend {} has no address",
                    backend.name
                )));
            }
            if !seen.insert(backend.name.as_str()) {
                return Err(Error::invalid_input(format!(
                    "Backend {} declared more than once",
                    backend.name
                )));
            }
        }

        Ok(())
    }
}

/// Observed state of a service, read back from its active version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// Remote identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Version the sub-resources were read from
    pub active_version: Option<VersionNumber>,
    /// Default host and TTL of the active version
    pub settings: Settings,
    /// Domains of the active version
    pub domains: BTreeSet<Domain>,
    /// Backends of the active version
    pub backends: BTreeSet<Backend>,
}

impl ServiceSnapshot {
    /// The observed state expressed as a declaration
    pub fn to_config(&self) -> ServiceConfig {
        ServiceConfig {
            name: self.name.clone(),
            domains: self.domains.clone(),
            backends: self.backends.clone(),
            settings: self.settings.clone(),
            force_destroy: false,
        }
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn default_true() -> bool {
    true
}

fn default_between_bytes_timeout() -> u32 {
    10_000
}

fn default_connect_timeout() -> u32 {
    1_000
}

fn default_first_byte_timeout() -> u32 {
    15_000
}

fn default_max_conn() -> u32 {
    200
}

fn default_port() -> u16 {
    80
}

fn default_weight() -> u32 {
    100
}

fn default_ttl() -> u32 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_defaults_match_remote_schema() {
        let backend: Backend =
            serde_json::from_str(r#"{"name":"origin","address":"10.0.0.1"}"#).unwrap();
        assert_eq!(backend, Backend::new("origin", "10.0.0.1"));
        assert_eq!(backend.port, 80);
        assert_eq!(backend.first_byte_timeout, 15_000);
        assert!(backend.ssl_check_cert);
    }

    #[test]
    fn normalized_backend_drops_empty_tls_versions() {
        let backend = Backend::new("origin", "10.0.0.1").with_tls_versions(Some(""), Some("1.3"));
        let normalized = backend.normalized();
        assert_eq!(normalized.min_tls_version, None);
        assert_eq!(normalized.max_tls_version.as_deref(), Some("1.3"));
    }

    #[test]
    fn service_config_reads_flat_settings() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{
                "name": "web",
                "default_ttl": 7200,
                "domains": [{"name": "www.example.com"}],
                "backends": [{"name": "origin", "address": "10.0.0.1", "port": 8080}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.settings.default_ttl, 7200);
        assert_eq!(config.settings.default_host, None);
        assert_eq!(config.domains.len(), 1);
        assert_eq!(config.backends.iter().next().unwrap().port, 8080);
        assert!(!config.force_destroy);
    }

    #[test]
    fn duplicate_backend_names_are_rejected() {
        let config = ServiceConfig::new("web")
            .with_backend(Backend::new("origin", "10.0.0.1"))
            .with_backend(Backend::new("origin", "10.0.0.1").with_port(8080));

        let err = config.validate().err().unwrap();
        assert!(err.to_string().contains("origin"));
    }

    #[test]
    fn empty_service_name_is_rejected() {
        assert!(ServiceConfig::new("  ").validate().is_err());
        assert!(ServiceConfig::new("web").validate().is_ok());
    }

    #[test]
    fn version_info_writability() {
        let draft = VersionInfo {
            number: VersionNumber::new(2),
            active: false,
            locked: false,
        };
        let locked = VersionInfo {
            locked: true,
            ..draft
        };
        assert!(draft.is_writable());
        assert!(!locked.is_writable());
    }
}
