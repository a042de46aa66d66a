// Lifecycle commands
//
// Each command maps onto one reconciler operation. The state file decides
// between create and update for `apply`: a resource with a stored record is
// updated against the declaration stored with it.

use anyhow::{Context as _, Result};
use cdnsync_core::{
    ProviderRegistry, ReconcileEvent, Reconciler, ServiceConfig, ServiceId, ServiceSnapshot,
    StateRecord, StateStore, SyncConfig,
};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything a command needs
pub struct Context {
    reconciler: Reconciler,
    state: Box<dyn StateStore>,
}

impl Context {
    /// Build the API client, reconciler and state store from configuration
    pub async fn build(config: &SyncConfig) -> Result<Self> {
        let registry = ProviderRegistry::new();

        #[cfg(feature = "fastly")]
        cdnsync_provider_fastly::register(&registry);

        let api = registry
            .create_provider(&config.provider)
            .context("Failed to create API client")?;
        let (reconciler, events) = Reconciler::new(api, &config.engine)?;
        tokio::spawn(log_events(events));

        let state = cdnsync_core::state::open(&config.state_store)
            .await
            .context("Failed to open state store")?;

        info!("Using provider {}", reconciler.provider_name());

        Ok(Self { reconciler, state })
    }
}

async fn log_events(mut events: mpsc::Receiver<ReconcileEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcileEvent::PhaseChanged { service_id, phase } => {
                debug!("{}: {:?}", service_id, phase);
            }
            ReconcileEvent::VersionResolved {
                service_id,
                version,
                cloned_from: Some(from),
            } => info!("{}: cloned version {} into {}", service_id, from, version),
            ReconcileEvent::VersionResolved {
                service_id,
                version,
                cloned_from: None,
            } => info!("{}: writing to draft version {}", service_id, version),
            ReconcileEvent::SubresourceRemoved {
                service_id,
                version,
                kind,
                name,
            } => info!("{}: removed {} {} from version {}", service_id, kind, name, version),
            ReconcileEvent::SubresourceAdded {
                service_id,
                version,
                kind,
                name,
            } => info!("{}: added {} {} to version {}", service_id, kind, name, version),
            ReconcileEvent::ValidationFailed {
                service_id,
                version,
                message,
            } => warn!("{}: version {} rejected: {}", service_id, version, message),
            other => debug!("{:?}", other),
        }
    }
}

/// Read a JSON declaration from disk
pub async fn load_declaration(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Create or update the service declared in `file`
pub async fn apply(ctx: &Context, file: &Path, resource: Option<&str>) -> Result<()> {
    let desired = load_declaration(file).await?;
    let resource = resource.unwrap_or(&desired.name).to_string();

    let result = match ctx.state.get_record(&resource).await? {
        Some(record) => {
            info!("Updating {} ({})", resource, record.service_id);
            ctx.reconciler
                .update(&record.service_id, &record.declared, &desired)
                .await
                .with_context(|| format!("Failed to update {}", resource))?
        }
        None => {
            info!("Creating {}", resource);
            let created = ctx
                .reconciler
                .create_service(&desired)
                .await
                .with_context(|| format!("Failed to create {}", resource))?;

            // Recorded before the first rollout so that a failed rollout is
            // retried in the same service
            let pending = StateRecord::new(
                created.id.clone(),
                ServiceConfig::new(desired.name.clone()),
                None,
            );
            ctx.state.set_record(&resource, &pending).await?;
            ctx.state.flush().await?;

            ctx.reconciler
                .configure_new(&created.id, &desired)
                .await
                .with_context(|| format!("Failed to configure {} ({})", resource, created.id))?
        }
    };

    let observed = result.observed;
    let record = StateRecord::new(observed.id.clone(), desired, observed.active_version);
    ctx.state.set_record(&resource, &record).await?;
    ctx.state.flush().await?;

    info!("{}: {:?}", resource, result.outcome);
    print_snapshot(&observed)
}

/// Print the observed state of a service
pub async fn show(ctx: &Context, service_id: &str) -> Result<()> {
    let observed = ctx
        .reconciler
        .read(&ServiceId::new(service_id))
        .await
        .with_context(|| format!("Failed to read service {}", service_id))?;
    print_snapshot(&observed)
}

/// Delete a managed service and forget it
pub async fn destroy(ctx: &Context, resource: &str, force: bool) -> Result<()> {
    let record = ctx
        .state
        .get_record(resource)
        .await?
        .with_context(|| format!("{} is not managed by this state file", resource))?;

    let force = force || record.declared.force_destroy;
    match ctx.reconciler.delete(&record.service_id, force).await {
        Ok(()) => info!("Deleted {} ({})", resource, record.service_id),
        Err(e) if e.is_not_found() => {
            warn!("Service {} is already gone", record.service_id);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", resource)),
    }

    ctx.state.delete_record(resource).await?;
    ctx.state.flush().await?;
    Ok(())
}

fn print_snapshot(snapshot: &ServiceSnapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
