//! Core traits for cdnsync
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`CdnApi`]: Typed operations of the remote CDN configuration API
//! - [`StateStore`]: Persistence of the last declared configuration

pub mod cdn_api;
pub mod state_store;

pub use cdn_api::{CdnApi, CdnApiFactory};
pub use state_store::{StateRecord, StateStore};
