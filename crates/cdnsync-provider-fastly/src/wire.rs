//! Fastly API v1 request bodies and response shapes
//!
//! Writes are form-encoded; reads are JSON. Fastly is inconsistent about
//! booleans (`true`, `1`, `"1"` and `null` all occur), so boolean fields go
//! through [`flexible_bool`].

use cdnsync_core::{
    Backend, Domain, ServiceId, ServiceRecord, Settings, Validation, VersionInfo, VersionNumber,
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Form fields, in request order
pub type Form = Vec<(&'static str, String)>;

fn form_bool(value: bool) -> String {
    let flag = if value { "1" } else { "0" };
    flag.to_string()
}

fn push_non_empty(form: &mut Form, key: &'static str, value: Option<&String>) {
    if let Some(value) = value
        && !value.is_empty()
    {
        form.push((key, value.clone()));
    }
}

/// Body of `POST /service`
pub fn service_form(name: &str, comment: &str) -> Form {
    vec![("name", name.to_string()), ("comment", comment.to_string())]
}

/// Body of `PUT .../settings`
///
/// The TTL is always sent. The default host is sent only when non-empty, so
/// an unset host leaves the remote value alone.
pub fn settings_form(settings: &Settings) -> Form {
    let mut form = vec![("general.default_ttl", settings.default_ttl.to_string())];
    push_non_empty(&mut form, "general.default_host", settings.default_host.as_ref());
    form
}

/// Body of `POST .../domain`
pub fn domain_form(domain: &Domain) -> Form {
    let mut form = vec![("name", domain.name.clone())];
    push_non_empty(&mut form, "comment", domain.comment.as_ref());
    form
}

/// Body of `POST .../backend`
///
/// Unset TLS versions are omitted entirely; Fastly rejects an empty string.
pub fn backend_form(backend: &Backend) -> Form {
    let mut form = vec![
        ("name", backend.name.clone()),
        ("address", backend.address.clone()),
        ("auto_loadbalance", form_bool(backend.auto_loadbalance)),
        (
            "between_bytes_timeout",
            backend.between_bytes_timeout.to_string(),
        ),
        ("connect_timeout", backend.connect_timeout.to_string()),
        ("error_threshold", backend.error_threshold.to_string()),
        ("first_byte_timeout", backend.first_byte_timeout.to_string()),
        ("max_conn", backend.max_conn.to_string()),
        ("port", backend.port.to_string()),
        ("ssl_check_cert", form_bool(backend.ssl_check_cert)),
        ("weight", backend.weight.to_string()),
    ];
    push_non_empty(&mut form, "min_tls_version", backend.min_tls_version.as_ref());
    push_non_empty(&mut form, "max_tls_version", backend.max_tls_version.as_ref());
    form
}

/// Accepts `true`/`false`, `0`/`1`, `"0"`/`"1"`/`"true"`/`"false"` and `null`
pub fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_u64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

fn flexible_opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_u64().is_some_and(|n| n != 0)),
        Value::String(s) => Some(matches!(s.as_str(), "1" | "true")),
        _ => None,
    })
}

/// Item of `GET /service` and body of `POST /service` / `PUT /service/{id}`
#[derive(Debug, Deserialize)]
pub struct ServiceResponse {
    pub id: String,
    pub name: String,
    /// Active version number; absent or 0 when nothing is active
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub versions: Vec<VersionResponse>,
}

fn highest(versions: &[VersionResponse]) -> Option<VersionNumber> {
    versions
        .iter()
        .map(|v| v.number)
        .filter(|n| *n > 0)
        .max()
        .map(VersionNumber::new)
}

impl From<ServiceResponse> for ServiceRecord {
    fn from(response: ServiceResponse) -> Self {
        ServiceRecord {
            id: ServiceId::new(response.id),
            name: response.name,
            active_version: response
                .version
                .filter(|v| *v > 0)
                .map(VersionNumber::new),
            latest_version: highest(&response.versions),
        }
    }
}

/// Body of `GET /service/{id}/details`
#[derive(Debug, Deserialize)]
pub struct ServiceDetailsResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active_version: Option<VersionResponse>,
    /// Latest version, active or not
    #[serde(default)]
    pub version: Option<VersionResponse>,
    #[serde(default)]
    pub versions: Vec<VersionResponse>,
}

impl From<ServiceDetailsResponse> for ServiceRecord {
    fn from(response: ServiceDetailsResponse) -> Self {
        ServiceRecord {
            id: ServiceId::new(response.id),
            name: response.name,
            active_version: response
                .active_version
                .map(|v| VersionNumber::new(v.number)),
            latest_version: highest(&response.versions).or_else(|| {
                response
                    .version
                    .filter(|v| v.number > 0)
                    .map(|v| VersionNumber::new(v.number))
            }),
        }
    }
}

/// A configuration version
#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub number: u32,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub active: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub locked: bool,
}

impl From<VersionResponse> for VersionInfo {
    fn from(response: VersionResponse) -> Self {
        VersionInfo {
            number: VersionNumber::new(response.number),
            active: response.active,
            locked: response.locked,
        }
    }
}

/// Body of `GET .../validate`
#[derive(Debug, Deserialize)]
pub struct ValidationResponse {
    pub status: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl From<ValidationResponse> for Validation {
    fn from(response: ValidationResponse) -> Self {
        if response.status == "ok" {
            return Validation::ok();
        }
        let message = match response.msg {
            Some(msg) if !msg.is_empty() => msg,
            _ => response.errors.join("; "),
        };
        Validation::failed(message)
    }
}

/// Body of `GET .../settings`
#[derive(Debug, Deserialize)]
pub struct SettingsResponse {
    #[serde(rename = "general.default_host", default)]
    pub default_host: Option<String>,
    #[serde(rename = "general.default_ttl", default)]
    pub default_ttl: Option<u32>,
}

impl From<SettingsResponse> for Settings {
    fn from(response: SettingsResponse) -> Self {
        let defaults = Settings::default();
        Settings {
            default_host: response.default_host,
            default_ttl: response.default_ttl.unwrap_or(defaults.default_ttl),
        }
    }
}

/// Item of `GET .../domain`
#[derive(Debug, Deserialize)]
pub struct DomainResponse {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl From<DomainResponse> for Domain {
    fn from(response: DomainResponse) -> Self {
        Domain {
            name: response.name,
            comment: response.comment,
        }
    }
}

/// Item of `GET .../backend`
///
/// Missing or null fields fall back to the defaults of [`Backend::new`].
#[derive(Debug, Deserialize)]
pub struct BackendResponse {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "flexible_opt_bool")]
    pub auto_loadbalance: Option<bool>,
    #[serde(default)]
    pub between_bytes_timeout: Option<u32>,
    #[serde(default)]
    pub connect_timeout: Option<u32>,
    #[serde(default)]
    pub error_threshold: Option<u32>,
    #[serde(default)]
    pub first_byte_timeout: Option<u32>,
    #[serde(default)]
    pub max_conn: Option<u32>,
    #[serde(default)]
    pub max_tls_version: Option<String>,
    #[serde(default)]
    pub min_tls_version: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "flexible_opt_bool")]
    pub ssl_check_cert: Option<bool>,
    #[serde(default)]
    pub weight: Option<u32>,
}

impl From<BackendResponse> for Backend {
    fn from(response: BackendResponse) -> Self {
        let defaults = Backend::new(response.name, response.address.unwrap_or_default());
        Backend {
            auto_loadbalance: response
                .auto_loadbalance
                .unwrap_or(defaults.auto_loadbalance),
            between_bytes_timeout: response
                .between_bytes_timeout
                .unwrap_or(defaults.between_bytes_timeout),
            connect_timeout: response.connect_timeout.unwrap_or(defaults.connect_timeout),
            error_threshold: response.error_threshold.unwrap_or(defaults.error_threshold),
            first_byte_timeout: response
                .first_byte_timeout
                .unwrap_or(defaults.first_byte_timeout),
            max_conn: response.max_conn.unwrap_or(defaults.max_conn),
            max_tls_version: response.max_tls_version,
            min_tls_version: response.min_tls_version,
            port: response.port.unwrap_or(defaults.port),
            ssl_check_cert: response.ssl_check_cert.unwrap_or(defaults.ssl_check_cert),
            weight: response.weight.unwrap_or(defaults.weight),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(form: &Form) -> Vec<&'static str> {
        form.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn backend_form_omits_unset_tls_versions() {
        let backend = Backend::new("origin", "10.0.0.1").with_tls_versions(Some(""), None::<&str>);
        let form = backend_form(&backend);

        assert!(!keys(&form).contains(&"min_tls_version"));
        assert!(!keys(&form).contains(&"max_tls_version"));
        assert!(form.contains(&("port", "80".to_string())));
        assert!(form.contains(&("ssl_check_cert", "1".to_string())));
    }

    #[test]
    fn backend_form_sends_set_tls_versions() {
        let backend = Backend::new("origin", "10.0.0.1").with_tls_versions(Some("1.2"), Some("1.3"));
        let form = backend_form(&backend);

        assert!(form.contains(&("min_tls_version", "1.2".to_string())));
        assert!(form.contains(&("max_tls_version", "1.3".to_string())));
    }

    #[test]
    fn settings_form_always_sends_ttl() {
        let form = settings_form(&Settings::with_ttl(60));
        assert_eq!(form, vec![("general.default_ttl", "60".to_string())]);

        let form = settings_form(&Settings {
            default_host: Some("origin.example.com".to_string()),
            default_ttl: 60,
        });
        assert_eq!(
            keys(&form),
            vec!["general.default_ttl", "general.default_host"]
        );
    }

    #[test]
    fn version_accepts_numeric_and_string_booleans() {
        let version: VersionResponse =
            serde_json::from_value(json!({"number": 4, "active": 1, "locked": "1"})).unwrap();
        assert!(version.active);
        assert!(version.locked);

        let version: VersionResponse =
            serde_json::from_value(json!({"number": 5, "active": false, "locked": null})).unwrap();
        assert!(!version.active);
        assert!(!version.locked);
    }

    #[test]
    fn failed_validation_prefers_msg_over_errors() {
        let validation: Validation = serde_json::from_value::<ValidationResponse>(
            json!({"status": "error", "msg": "missing origin", "errors": ["a", "b"]}),
        )
        .unwrap()
        .into();
        assert_eq!(validation, Validation::failed("missing origin"));

        let validation: Validation = serde_json::from_value::<ValidationResponse>(
            json!({"status": "error", "errors": ["no backends", "no domains"]}),
        )
        .unwrap()
        .into();
        assert_eq!(validation.message, "no backends; no domains");
    }

    #[test]
    fn backend_response_fills_missing_fields_with_defaults() {
        let backend: Backend = serde_json::from_value::<BackendResponse>(json!({
            "name": "origin",
            "address": "10.0.0.1",
            "port": 443,
            "ssl_check_cert": null,
            "min_tls_version": ""
        }))
        .unwrap()
        .into();

        assert_eq!(backend.port, 443);
        assert!(backend.ssl_check_cert);
        assert_eq!(backend.first_byte_timeout, 15_000);
        assert_eq!(backend.min_tls_version.as_deref(), Some(""));
    }

    #[test]
    fn service_list_item_without_active_version() {
        let record: ServiceRecord =
            serde_json::from_value::<ServiceResponse>(json!({"id": "abc", "name": "web", "version": 0}))
                .unwrap()
                .into();
        assert_eq!(record.active_version, None);
    }

    #[test]
    fn service_details_report_latest_version() {
        let record: ServiceRecord = serde_json::from_value::<ServiceDetailsResponse>(json!({
            "id": "abc",
            "name": "web",
            "active_version": null,
            "version": {"number": 3, "active": false, "locked": true},
            "versions": [
                {"number": 1, "locked": true},
                {"number": 2, "locked": true},
                {"number": 3, "locked": true}
            ]
        }))
        .unwrap()
        .into();

        assert_eq!(record.active_version, None);
        assert_eq!(record.latest_version, Some(VersionNumber::new(3)));
    }
}
