//! Test doubles and common utilities for contract tests
//!
//! `FakeCdn` models the remote versioning rules closely enough to catch
//! ordering mistakes: active versions are locked, clones start out unready
//! for a configurable number of polls, and a service with an active version
//! cannot be deleted. Every call is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use cdnsync_core::error::{Error, Result};
use cdnsync_core::{
    Backend, CdnApi, Domain, EngineConfig, ServiceConfig, ServiceId, ServiceRecord, Settings,
    Validation, VersionInfo, VersionNumber,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateService { name: String },
    GetService,
    UpdateService { name: String },
    DeleteService,
    ListServices,
    CloneVersion { from: u32 },
    GetVersion { version: u32 },
    ValidateVersion { version: u32 },
    ActivateVersion { version: u32 },
    DeactivateVersion { version: u32 },
    GetSettings { version: u32 },
    UpdateSettings { version: u32, settings: Settings },
    ListDomains { version: u32 },
    CreateDomain { version: u32, domain: Domain },
    DeleteDomain { version: u32, name: String },
    ListBackends { version: u32 },
    CreateBackend { version: u32, backend: Backend },
    DeleteBackend { version: u32, name: String },
}

impl Call {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::GetService
                | Call::ListServices
                | Call::GetVersion { .. }
                | Call::ValidateVersion { .. }
                | Call::GetSettings { .. }
                | Call::ListDomains { .. }
                | Call::ListBackends { .. }
        )
    }

    /// Whether the call touches a domain or backend
    pub fn is_subresource_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateDomain { .. }
                | Call::DeleteDomain { .. }
                | Call::CreateBackend { .. }
                | Call::DeleteBackend { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct FakeVersion {
    active: bool,
    locked: bool,
    settings: Settings,
    domains: BTreeMap<String, Domain>,
    backends: BTreeMap<String, Backend>,
}

impl FakeVersion {
    fn draft() -> Self {
        Self {
            active: false,
            locked: false,
            settings: Settings::default(),
            domains: BTreeMap::new(),
            backends: BTreeMap::new(),
        }
    }

    fn from_config(config: &ServiceConfig) -> Self {
        Self {
            active: false,
            locked: true,
            settings: config.settings.clone(),
            domains: config
                .domains
                .iter()
                .map(|d| (d.name.clone(), d.clone()))
                .collect(),
            backends: config
                .backends
                .iter()
                .map(|b| (b.name.clone(), b.clone()))
                .collect(),
        }
    }
}

#[derive(Debug)]
struct FakeService {
    name: String,
    active: Option<u32>,
    versions: BTreeMap<u32, FakeVersion>,
}

impl FakeService {
    fn record(&self, id: &str) -> ServiceRecord {
        ServiceRecord {
            id: ServiceId::new(id),
            name: self.name.clone(),
            active_version: self.active.map(VersionNumber::new),
            latest_version: self.versions.keys().max().copied().map(VersionNumber::new),
        }
    }
}

type FailurePredicate = Box<dyn Fn(&Call) -> bool + Send>;

#[derive(Default)]
struct Inner {
    services: BTreeMap<String, FakeService>,
    next_id: usize,
    calls: Vec<Call>,
    validation_error: Option<String>,
    unready_polls: usize,
    pending_polls: usize,
    keep_deleted: bool,
    fail_on: Option<FailurePredicate>,
}

impl Inner {
    fn service(&mut self, id: &ServiceId) -> Result<&mut FakeService> {
        self.services
            .get_mut(id.as_str())
            .ok_or_else(|| Error::not_found(format!("service {}", id)))
    }

    fn version(&mut self, id: &ServiceId, version: VersionNumber) -> Result<&mut FakeVersion> {
        self.service(id)?
            .versions
            .get_mut(&version.get())
            .ok_or_else(|| Error::not_found(format!("version {} of {}", version, id)))
    }

    fn writable(&mut self, id: &ServiceId, version: VersionNumber) -> Result<&mut FakeVersion> {
        if self.pending_polls > 0 {
            return Err(Error::provider("fake", format!("version {} not ready", version)));
        }
        let v = self.version(id, version)?;
        if v.active || v.locked {
            return Err(Error::provider("fake", format!("version {} is locked", version)));
        }
        Ok(v)
    }
}

/// In-memory remote CDN
#[derive(Default)]
pub struct FakeCdn {
    inner: Mutex<Inner>,
}

impl FakeCdn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service whose versions 1..=active_version all carry `config`,
    /// with the last one active. `0` leaves an empty, never-activated draft.
    pub fn seed_service(&self, config: &ServiceConfig, active_version: u32) -> ServiceId {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("svc-{}", inner.next_id);

        let mut versions = BTreeMap::new();
        if active_version == 0 {
            versions.insert(1, FakeVersion::draft());
        } else {
            for number in 1..=active_version {
                versions.insert(number, FakeVersion::from_config(config));
            }
            if let Some(last) = versions.get_mut(&active_version) {
                last.active = true;
            }
        }

        inner.services.insert(
            id.clone(),
            FakeService {
                name: config.name.clone(),
                active: (active_version > 0).then_some(active_version),
                versions,
            },
        );
        ServiceId::new(id)
    }

    /// Make every validation fail with `message`
    pub fn fail_validation(&self, message: &str) {
        self.inner.lock().unwrap().validation_error = Some(message.to_string());
    }

    /// Let validation succeed again
    pub fn pass_validation(&self) {
        self.inner.lock().unwrap().validation_error = None;
    }

    /// Report each fresh clone as locked for the first `polls` reads
    pub fn unready_polls(&self, polls: usize) {
        self.inner.lock().unwrap().unready_polls = polls;
    }

    /// Keep listing services after they were deleted
    pub fn keep_deleted_services(&self) {
        self.inner.lock().unwrap().keep_deleted = true;
    }

    /// Fail the first call matching `predicate` (and every later one)
    pub fn fail_on(&self, predicate: impl Fn(&Call) -> bool + Send + 'static) {
        self.inner.lock().unwrap().fail_on = Some(Box::new(predicate));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn subresource_mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(Call::is_subresource_mutation)
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Active version number as the fake sees it
    pub fn active_version(&self, id: &ServiceId) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .services
            .get(id.as_str())
            .and_then(|s| s.active)
    }

    pub fn service_exists(&self, id: &ServiceId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .services
            .contains_key(id.as_str())
    }

    fn call<T>(&self, call: Call, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.lock().unwrap();
        let injected = inner.fail_on.as_ref().is_some_and(|p| p(&call));
        inner.calls.push(call);
        if injected {
            return Err(Error::provider("fake", "injected failure"));
        }
        f(&mut inner)
    }
}

#[async_trait]
impl CdnApi for FakeCdn {
    async fn create_service(&self, name: &str, _comment: &str) -> Result<ServiceRecord> {
        self.call(
            Call::CreateService {
                name: name.to_string(),
            },
            |inner| {
                inner.next_id += 1;
                let id = format!("svc-{}", inner.next_id);
                let service = FakeService {
                    name: name.to_string(),
                    active: None,
                    versions: BTreeMap::from([(1, FakeVersion::draft())]),
                };
                let record = service.record(&id);
                inner.services.insert(id, service);
                Ok(record)
            },
        )
    }

    async fn get_service(&self, service: &ServiceId) -> Result<ServiceRecord> {
        self.call(Call::GetService, |inner| {
            Ok(inner.service(service)?.record(service.as_str()))
        })
    }

    async fn update_service(&self, service: &ServiceId, name: &str) -> Result<ServiceRecord> {
        self.call(
            Call::UpdateService {
                name: name.to_string(),
            },
            |inner| {
                let s = inner.service(service)?;
                s.name = name.to_string();
                Ok(s.record(service.as_str()))
            },
        )
    }

    async fn delete_service(&self, service: &ServiceId) -> Result<()> {
        self.call(Call::DeleteService, |inner| {
            if inner.service(service)?.active.is_some() {
                return Err(Error::provider(
                    "fake",
                    "cannot delete a service with an active version",
                ));
            }
            if !inner.keep_deleted {
                inner.services.remove(service.as_str());
            }
            Ok(())
        })
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        self.call(Call::ListServices, |inner| {
            Ok(inner
                .services
                .iter()
                .map(|(id, s)| s.record(id))
                .collect())
        })
    }

    async fn clone_version(
        &self,
        service: &ServiceId,
        from: VersionNumber,
    ) -> Result<VersionNumber> {
        self.call(Call::CloneVersion { from: from.get() }, |inner| {
            let unready = inner.unready_polls;
            let s = inner.service(service)?;
            let source = s
                .versions
                .get(&from.get())
                .cloned()
                .ok_or_else(|| Error::not_found(format!("version {}", from)))?;
            let number = s.versions.keys().max().copied().unwrap_or(0) + 1;
            s.versions.insert(
                number,
                FakeVersion {
                    active: false,
                    locked: false,
                    ..source
                },
            );
            inner.pending_polls = unready;
            Ok(VersionNumber::new(number))
        })
    }

    async fn get_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<VersionInfo> {
        self.call(
            Call::GetVersion {
                version: version.get(),
            },
            |inner| {
                let settling = inner.pending_polls > 0;
                if settling {
                    inner.pending_polls -= 1;
                }
                let v = inner.version(service, version)?;
                Ok(VersionInfo {
                    number: version,
                    active: v.active,
                    locked: v.locked || settling,
                })
            },
        )
    }

    async fn validate_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Validation> {
        self.call(
            Call::ValidateVersion {
                version: version.get(),
            },
            |inner| {
                inner.version(service, version)?;
                Ok(match &inner.validation_error {
                    Some(message) => Validation::failed(message.clone()),
                    None => Validation::ok(),
                })
            },
        )
    }

    async fn activate_version(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        self.call(
            Call::ActivateVersion {
                version: version.get(),
            },
            |inner| {
                let s = inner.service(service)?;
                if !s.versions.contains_key(&version.get()) {
                    return Err(Error::not_found(format!("version {}", version)));
                }
                for (number, v) in s.versions.iter_mut() {
                    v.active = *number == version.get();
                }
                if let Some(v) = s.versions.get_mut(&version.get()) {
                    v.locked = true;
                }
                s.active = Some(version.get());
                Ok(())
            },
        )
    }

    async fn deactivate_version(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        self.call(
            Call::DeactivateVersion {
                version: version.get(),
            },
            |inner| {
                inner.version(service, version)?.active = false;
                inner.service(service)?.active = None;
                Ok(())
            },
        )
    }

    async fn get_settings(&self, service: &ServiceId, version: VersionNumber) -> Result<Settings> {
        self.call(
            Call::GetSettings {
                version: version.get(),
            },
            |inner| Ok(inner.version(service, version)?.settings.clone()),
        )
    }

    async fn update_settings(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        settings: &Settings,
    ) -> Result<()> {
        self.call(
            Call::UpdateSettings {
                version: version.get(),
                settings: settings.clone(),
            },
            |inner| {
                let v = inner.writable(service, version)?;
                if let Some(host) = &settings.default_host {
                    v.settings.default_host = Some(host.clone());
                }
                v.settings.default_ttl = settings.default_ttl;
                Ok(())
            },
        )
    }

    async fn list_domains(&self, service: &ServiceId, version: VersionNumber) -> Result<Vec<Domain>> {
        self.call(
            Call::ListDomains {
                version: version.get(),
            },
            |inner| {
                Ok(inner
                    .version(service, version)?
                    .domains
                    .values()
                    .cloned()
                    .collect())
            },
        )
    }

    async fn create_domain(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        domain: &Domain,
    ) -> Result<()> {
        self.call(
            Call::CreateDomain {
                version: version.get(),
                domain: domain.clone(),
            },
            |inner| {
                let v = inner.writable(service, version)?;
                if v.domains.contains_key(&domain.name) {
                    return Err(Error::provider(
                        "fake",
                        format!("duplicate domain {}", domain.name),
                    ));
                }
                v.domains.insert(domain.name.clone(), domain.clone());
                Ok(())
            },
        )
    }

    async fn delete_domain(&self, service: &ServiceId, version: VersionNumber, name: &str) -> Result<()> {
        self.call(
            Call::DeleteDomain {
                version: version.get(),
                name: name.to_string(),
            },
            |inner| {
                inner
                    .writable(service, version)?
                    .domains
                    .remove(name)
                    .map(|_| ())
                    .ok_or_else(|| Error::not_found(format!("domain {}", name)))
            },
        )
    }

    async fn list_backends(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Vec<Backend>> {
        self.call(
            Call::ListBackends {
                version: version.get(),
            },
            |inner| {
                Ok(inner
                    .version(service, version)?
                    .backends
                    .values()
                    .cloned()
                    .collect())
            },
        )
    }

    async fn create_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        backend: &Backend,
    ) -> Result<()> {
        self.call(
            Call::CreateBackend {
                version: version.get(),
                backend: backend.clone(),
            },
            |inner| {
                let v = inner.writable(service, version)?;
                if v.backends.contains_key(&backend.name) {
                    return Err(Error::provider(
                        "fake",
                        format!("duplicate backend {}", backend.name),
                    ));
                }
                v.backends.insert(backend.name.clone(), backend.clone());
                Ok(())
            },
        )
    }

    async fn delete_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        name: &str,
    ) -> Result<()> {
        self.call(
            Call::DeleteBackend {
                version: version.get(),
                name: name.to_string(),
            },
            |inner| {
                inner
                    .writable(service, version)?
                    .backends
                    .remove(name)
                    .map(|_| ())
                    .ok_or_else(|| Error::not_found(format!("backend {}", name)))
            },
        )
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Engine settings for tests: poll quickly, give up quickly
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        settle_delay_ms: 0,
        settle_poll_attempts: 3,
        settle_poll_interval_ms: 1,
        event_channel_capacity: 100,
    }
}

/// A small but complete declaration
pub fn sample_config() -> ServiceConfig {
    ServiceConfig::new("web")
        .with_domain(Domain::new("www.example.com"))
        .with_backend(Backend::new("origin", "10.0.0.1"))
}
