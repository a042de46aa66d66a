//! Contract Test: Settling of cloned versions
//!
//! Constraints verified:
//! - No write reaches a clone before it reports writable
//! - Readiness polling is bounded and fails with a typed error
//! - Polling can be disabled in favour of a fixed delay

mod common;

use cdnsync_core::error::Error;
use cdnsync_core::{EngineConfig, ReconcileOutcome, Reconciler, Settings, VersionNumber};
use common::*;
use std::sync::Arc;

#[tokio::test]
async fn clone_is_polled_until_writable() {
    let api = Arc::new(FakeCdn::new());
    let config = EngineConfig {
        settle_poll_attempts: 5,
        ..fast_engine_config()
    };
    let (reconciler, _events) = Reconciler::new(api.clone(), &config).expect("valid config");
    let previous = sample_config();
    let id = api.seed_service(&previous, 1);
    api.unready_polls(2);

    let result = reconciler
        .update(&id, &previous, &previous.clone().with_settings(Settings::with_ttl(10)))
        .await
        .expect("update succeeds once the clone settles");

    assert_eq!(
        result.outcome,
        ReconcileOutcome::Activated {
            version: VersionNumber::new(2)
        }
    );
    assert_eq!(api.count(|c| matches!(c, Call::GetVersion { version: 2 })), 3);
}

#[tokio::test]
async fn polling_gives_up_after_configured_attempts() {
    let api = Arc::new(FakeCdn::new());
    let (reconciler, _events) =
        Reconciler::new(api.clone(), &fast_engine_config()).expect("valid config");
    let previous = sample_config();
    let id = api.seed_service(&previous, 1);
    api.unready_polls(100);

    let err = reconciler
        .update(&id, &previous, &previous.clone().with_settings(Settings::with_ttl(10)))
        .await
        .err()
        .expect("unsettled clone must fail the update");

    assert!(
        matches!(
            err.root(),
            Error::VersionNotReady { attempts: 3, version, .. } if *version == VersionNumber::new(2)
        ),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(api.count(|c| matches!(c, Call::GetVersion { .. })), 3);
    assert_eq!(api.count(|c| matches!(c, Call::UpdateSettings { .. })), 0);
    assert_eq!(api.active_version(&id), Some(1));
}

#[tokio::test]
async fn fixed_delay_without_polling() {
    let api = Arc::new(FakeCdn::new());
    let config = EngineConfig {
        settle_delay_ms: 5,
        settle_poll_attempts: 0,
        ..fast_engine_config()
    };
    let (reconciler, _events) = Reconciler::new(api.clone(), &config).expect("valid config");
    let previous = sample_config();
    let id = api.seed_service(&previous, 1);

    reconciler
        .update(&id, &previous, &previous.clone().with_settings(Settings::with_ttl(10)))
        .await
        .expect("update succeeds");

    assert_eq!(api.count(|c| matches!(c, Call::GetVersion { .. })), 0);
    assert_eq!(api.active_version(&id), Some(2));
}

#[tokio::test]
async fn fresh_service_needs_no_settling() {
    let api = Arc::new(FakeCdn::new());
    let (reconciler, _events) =
        Reconciler::new(api.clone(), &fast_engine_config()).expect("valid config");
    api.unready_polls(100);

    reconciler
        .create(&sample_config())
        .await
        .expect("create succeeds without a clone");

    assert_eq!(api.count(|c| matches!(c, Call::GetVersion { .. })), 0);
}
