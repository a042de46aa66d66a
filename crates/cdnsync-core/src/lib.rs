// # cdnsync-core
//
// Core library for declarative, versioned CDN service configuration.
//
// ## Architecture Overview
//
// - **CdnApi**: Trait for the typed operations of the remote configuration API
// - **StateStore**: Trait for remembering the last declared configuration
// - **Reconciler**: Converges a remote service onto a declared configuration
//   through clone → edit → validate → activate
// - **ProviderRegistry**: Plugin-based registry for API clients
//
// ## Design Principles
//
// 1. **Active versions are immutable**: edits only ever go to a draft
// 2. **Declarative**: callers state what they want, the engine computes the
//    remote calls
// 3. **Fail-fast**: the first failing remote call aborts the attempt
// 4. **Plugin-Based**: providers are registered dynamically
// 5. **Library-First**: the CLI is a thin layer over this crate

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, SettlePolicy, StateStoreConfig, SyncConfig};
pub use engine::{
    ChangeSet, ReconcileEvent, ReconcileOutcome, ReconcilePhase, Reconciler, Reconciliation,
};
pub use error::{Error, Result, ResultExt};
pub use model::{
    Backend, Domain, ServiceConfig, ServiceId, ServiceRecord, ServiceSnapshot, Settings,
    Validation, VersionInfo, VersionNumber,
};
pub use registry::ProviderRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{CdnApi, CdnApiFactory, StateRecord, StateStore};
