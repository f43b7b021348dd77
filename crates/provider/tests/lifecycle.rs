//! Lifecycle integration tests
//!
//! Drive whole create/read/update/delete flows against the simulated
//! backend. Time is paused so waits with real-looking intervals finish
//! instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use gcompute_common::{ApiError, AttrValue, Error, OperationErrorItem, OperationKind, OperationStatus, ResourcePhase, Scope};
use gcompute_provider::lifecycle::{DeleteOutcome, Lifecycle, PlanAction, ReadOutcome};
use gcompute_provider::sim::SimulatedCompute;
use gcompute_provider::state::{make_attrs, ResourceState};
use gcompute_provider::waiter::WaitConfig;
use gcompute_provider::{ProviderConfig, ProviderContext, ResourceKind};

fn setup() -> (Arc<SimulatedCompute>, ProviderContext) {
    let sim = Arc::new(SimulatedCompute::new("test-project"));
    let config = ProviderConfig {
        project: "test-project".to_string(),
        ..ProviderConfig::default()
    };
    let ctx = ProviderContext::new(sim.clone(), config);
    (sim, ctx)
}

fn quota_exceeded() -> Vec<OperationErrorItem> {
    vec![OperationErrorItem {
        code: "QUOTA_EXCEEDED".to_string(),
        message: "Quota 'HEALTH_CHECKS' exceeded".to_string(),
        location: None,
    }]
}

fn submitted_kinds(sim: &SimulatedCompute) -> Vec<OperationKind> {
    sim.submissions().into_iter().map(|s| s.kind).collect()
}

/// Create "terraform-test" with the default port, observe pending, running,
/// done, then read it back from a fresh state.
async fn create_terraform_test_with_default_port(kind: ResourceKind, collection: &str) {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, kind);
    let config = make_attrs(vec![("name", "terraform-test".into())]);

    let started = tokio::time::Instant::now();
    let mut state = ResourceState::absent();
    lifecycle.create(&mut state, &config).await.unwrap();

    assert_eq!(sim.poll_count("operation-000001"), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(state.id(), Some("terraform-test"));
    assert_eq!(state.phase, ResourcePhase::Present);

    let mut fresh = ResourceState::with_id("terraform-test");
    assert_eq!(lifecycle.read(&mut fresh).await.unwrap(), ReadOutcome::Refreshed);
    let suffix = format!("/global/{}/terraform-test", collection);
    assert!(fresh.self_link().is_some_and(|link| link.ends_with(&suffix)));
    assert_eq!(fresh.get("port"), Some(&AttrValue::Int(80)));
    assert_eq!(fresh, state);
}

#[tokio::test(start_paused = true)]
async fn create_then_read_populates_self_link_and_default_port() {
    create_terraform_test_with_default_port(ResourceKind::HttpHealthCheck, "httpHealthChecks").await;
}

#[tokio::test(start_paused = true)]
async fn https_health_check_defaults_to_port_80() {
    create_terraform_test_with_default_port(ResourceKind::HttpsHealthCheck, "httpsHealthChecks").await;
}

#[tokio::test(start_paused = true)]
async fn created_state_matches_configuration() {
    let (_sim, ctx) = setup();
    let cases = vec![
        (
            ResourceKind::HttpsHealthCheck,
            make_attrs(vec![
                ("name", "hc".into()),
                ("host", "example.com".into()),
                ("healthy_threshold", 3i64.into()),
                ("unhealthy_threshold", 5i64.into()),
            ]),
        ),
        (
            ResourceKind::TargetPool,
            make_attrs(vec![
                ("name", "pool".into()),
                ("instances", vec!["us-central1-a/foo", "us-central1-b/bar"].into()),
                ("failover_ratio", 0.5.into()),
            ]),
        ),
        (
            ResourceKind::Disk,
            make_attrs(vec![("name", "data".into()), ("size_gb", 50i64.into()), ("type", "pd-ssd".into())]),
        ),
    ];

    for (kind, config) in cases {
        let lifecycle = Lifecycle::new(&ctx, kind);
        let mut state = ResourceState::absent();
        lifecycle.create(&mut state, &config).await.unwrap();

        let prepared = kind.handler().descriptor().prepare(&config).unwrap();
        for (field, value) in &prepared {
            assert_eq!(state.get(field), Some(value), "{} field {}", kind, field);
        }
        assert!(state.self_link().is_some(), "{} self_link", kind);
    }
}

#[tokio::test(start_paused = true)]
async fn delete_then_read_is_absent() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::TargetPool);
    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "pool".into())]))
        .await
        .unwrap();

    assert_eq!(lifecycle.delete(&mut state).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(state, ResourceState::absent());
    assert_eq!(sim.entity_count(), 0);

    let mut stale = ResourceState::with_id("pool");
    assert_eq!(lifecycle.read(&mut stale).await.unwrap(), ReadOutcome::Vanished);
    assert!(!stale.exists());
    assert_eq!(lifecycle.read(&mut stale).await.unwrap(), ReadOutcome::Absent);
}

#[tokio::test(start_paused = true)]
async fn missing_entity_converges_to_absent_without_error() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::Disk);

    let mut state = ResourceState::with_id("ghost");
    assert_eq!(lifecycle.delete(&mut state).await.unwrap(), DeleteOutcome::AlreadyAbsent);
    assert!(!state.exists());

    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "d".into())]))
        .await
        .unwrap();
    assert!(sim.remove_entity("disks", &Scope::Zonal("us-central1-a".into()), "d"));

    assert_eq!(lifecycle.read(&mut state).await.unwrap(), ReadOutcome::Vanished);
    assert_eq!(state, ResourceState::absent());
}

#[tokio::test(start_paused = true)]
async fn in_place_change_is_patched() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap();

    let changed = make_attrs(vec![("name", "hc".into()), ("port", 8080i64.into())]);
    let plan = lifecycle.apply(&mut state, Some(&changed)).await.unwrap();

    assert_eq!(plan.action, PlanAction::Update);
    assert_eq!(submitted_kinds(&sim), vec![OperationKind::Insert, OperationKind::Patch]);
    assert_eq!(state.get("port"), Some(&AttrValue::Int(8080)));
    assert_eq!(state.id(), Some("hc"));

    let again = lifecycle.apply(&mut state, Some(&changed)).await.unwrap();
    assert_eq!(again.action, PlanAction::NoOp);
    assert_eq!(sim.submissions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_new_change_is_never_patched() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::Disk);
    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "d".into())]))
        .await
        .unwrap();
    assert_eq!(state.get("type"), Some(&AttrValue::from("pd-standard")));

    let ssd = make_attrs(vec![("name", "d".into()), ("type", "pd-ssd".into())]);
    let err = lifecycle.update(&mut state, &ssd).await.unwrap_err();
    match err {
        Error::RequiresReplacement { fields, .. } => assert_eq!(fields, vec!["type".to_string()]),
        other => panic!("expected RequiresReplacement, got {:?}", other),
    }
    assert_eq!(submitted_kinds(&sim), vec![OperationKind::Insert]);
    assert_eq!(state.phase, ResourcePhase::Present);

    let plan = lifecycle.apply(&mut state, Some(&ssd)).await.unwrap();
    assert_eq!(plan.action, PlanAction::Replace);
    assert_eq!(plan.requires_replace, vec!["type".to_string()]);
    assert_eq!(
        submitted_kinds(&sim),
        vec![OperationKind::Insert, OperationKind::Delete, OperationKind::Insert]
    );
    assert_eq!(state.get("type"), Some(&AttrValue::from("pd-ssd")));
}

#[tokio::test(start_paused = true)]
async fn failed_create_clears_identifier() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpsHealthCheck);
    sim.fail_next_operation(quota_exceeded());

    let mut state = ResourceState::absent();
    let err = lifecycle
        .create(&mut state, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap_err();

    assert_eq!(err.operation_errors().unwrap()[0].code, "QUOTA_EXCEEDED");
    assert_eq!(state, ResourceState::absent());
    assert_eq!(sim.entity_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_update_keeps_identifier() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap();

    sim.fail_next_operation(quota_exceeded());
    let err = lifecycle
        .update(&mut state, &make_attrs(vec![("name", "hc".into()), ("timeout_sec", 10i64.into())]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Operation { kind: OperationKind::Patch, .. }));
    assert_eq!(state.id(), Some("hc"));
    assert_eq!(state.phase, ResourcePhase::Present);
    let remote = sim.entity("httpHealthChecks", &Scope::Global, "hc").unwrap();
    assert_eq!(remote["timeoutSec"], 5);
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_leaves_state_untouched() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::TargetPool);

    sim.fail_next_submission(ApiError::http(403, "Required 'compute.targetPools.create' permission"));
    let mut state = ResourceState::absent();
    let err = lifecycle
        .create(&mut state, &make_attrs(vec![("name", "pool".into())]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Submission { kind: OperationKind::Insert, .. }));
    assert!(err.to_string().contains("google_compute_target_pool.pool"));
    assert_eq!(state, ResourceState::absent());

    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "pool".into())]))
        .await
        .unwrap();
    let before = state.clone();

    sim.fail_next_submission(ApiError::transport("connection reset"));
    let err = lifecycle.delete(&mut state).await.unwrap_err();
    assert!(matches!(err, Error::Submission { kind: OperationKind::Delete, .. }));
    assert_eq!(state, before);
}

/// A timeout leaves the instance in its in-flight phase; mutations are
/// refused until a read reconciles it.
#[tokio::test(start_paused = true)]
async fn timeout_leaves_state_indeterminate_until_read() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck)
        .with_wait(WaitConfig::default().with_timeout(Duration::from_secs(30)));
    sim.set_status_script(vec![OperationStatus::Running]);

    let config = make_attrs(vec![("name", "slow".into())]);
    let mut state = ResourceState::absent();
    let err = lifecycle.create(&mut state, &config).await.unwrap_err();

    match &err {
        Error::Timeout {
            last_status, elapsed, ..
        } => {
            assert_eq!(*last_status, Some(OperationStatus::Running));
            assert!(*elapsed >= Duration::from_secs(30));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(err.is_indeterminate());
    assert_eq!(state.id(), Some("slow"));
    assert_eq!(state.phase, ResourcePhase::Creating);

    let err = lifecycle.update(&mut state, &config).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
    let err = lifecycle.delete(&mut state).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
    assert_eq!(submitted_kinds(&sim), vec![OperationKind::Insert]);

    // The operation never settled, so the entity does not exist
    assert_eq!(lifecycle.read(&mut state).await.unwrap(), ReadOutcome::Vanished);
    assert_eq!(state.phase, ResourcePhase::Absent);
}

#[tokio::test(start_paused = true)]
async fn lost_operation_is_indeterminate() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::Disk);
    sim.inject_poll_errors(vec![ApiError::not_found("operation not found")]);

    let mut state = ResourceState::absent();
    let err = lifecycle
        .create(&mut state, &make_attrs(vec![("name", "d".into())]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Poll { .. }));
    assert!(err.is_indeterminate());
    assert_eq!(state.phase, ResourcePhase::Creating);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_retried() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    sim.inject_poll_errors(vec![ApiError::transport("timeout"), ApiError::http(503, "backend unavailable")]);

    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap();
    assert_eq!(sim.poll_count("operation-000001"), 5);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_wait() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::TargetPool);
    sim.set_status_script(vec![OperationStatus::Running]);

    let mut state = ResourceState::absent();
    let config = make_attrs(vec![("name", "pool".into())]);
    let (result, _) = futures::join!(lifecycle.create(&mut state, &config), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        ctx.cancel();
    });

    assert!(matches!(result, Err(Error::Cancelled { .. })));
    assert_eq!(state.phase, ResourcePhase::Creating);

    let polls = sim.poll_count("operation-000001");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sim.poll_count("operation-000001"), polls);
    assert_eq!(ctx.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_context_submits_nothing() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    let mut existing = ResourceState::absent();
    lifecycle
        .create(&mut existing, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap();
    let submitted = sim.submissions().len();

    ctx.cancel();

    let mut fresh = ResourceState::absent();
    let err = lifecycle
        .create(&mut fresh, &make_attrs(vec![("name", "other".into())]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { operation: None, .. }));
    assert!(!err.is_indeterminate());
    assert_eq!(fresh, ResourceState::absent());

    let before = existing.clone();
    let changed = make_attrs(vec![("name", "hc".into()), ("port", 8080i64.into())]);
    let err = lifecycle.update(&mut existing, &changed).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { operation: None, .. }));
    let err = lifecycle.delete(&mut existing).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled { operation: None, .. }));
    assert_eq!(existing, before);

    assert_eq!(sim.submissions().len(), submitted);
    assert_eq!(sim.entity_count(), 1);
    assert_eq!(ctx.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mutation_of_one_instance_is_rejected() {
    let (sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    let config = make_attrs(vec![("name", "hc".into())]);

    let mut first = ResourceState::absent();
    let mut second = ResourceState::absent();
    let (a, b) = futures::join!(
        lifecycle.create(&mut first, &config),
        lifecycle.create(&mut second, &config)
    );

    assert!(a.is_ok());
    assert!(matches!(b, Err(Error::ConcurrentMutation { .. })));
    assert_eq!(second, ResourceState::absent());
    assert_eq!(sim.submissions().len(), 1);
    assert_eq!(ctx.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn different_instances_run_concurrently() {
    let (sim, ctx) = setup();
    let health_checks = Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck);
    let disks = Lifecycle::new(&ctx, ResourceKind::Disk);

    let mut hc = ResourceState::absent();
    let mut d1 = ResourceState::absent();
    let mut d2 = ResourceState::absent();
    let hc_config = make_attrs(vec![("name", "hc".into())]);
    let d1_config = make_attrs(vec![("name", "d1".into())]);
    let d2_config = make_attrs(vec![("name", "d2".into())]);

    let started = tokio::time::Instant::now();
    let (a, b, c) = futures::join!(
        health_checks.create(&mut hc, &hc_config),
        disks.create(&mut d1, &d1_config),
        disks.create(&mut d2, &d2_config)
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(sim.entity_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn target_pool_references_health_check_and_instances() {
    let (sim, ctx) = setup();
    let mut hc = ResourceState::absent();
    Lifecycle::new(&ctx, ResourceKind::HttpHealthCheck)
        .create(&mut hc, &make_attrs(vec![("name", "hc".into())]))
        .await
        .unwrap();
    let hc_link = hc.self_link().unwrap().to_string();

    let pools = Lifecycle::new(&ctx, ResourceKind::TargetPool);
    let mut pool = ResourceState::absent();
    pools
        .create(
            &mut pool,
            &make_attrs(vec![
                ("name", "pool".into()),
                ("instances", vec!["us-central1-a/foo"].into()),
                ("health_checks", vec![hc_link.clone()].into()),
                ("session_affinity", "CLIENT_IP".into()),
            ]),
        )
        .await
        .unwrap();

    let remote = sim
        .entity("targetPools", &Scope::Regional("us-central1".into()), "pool")
        .unwrap();
    assert_eq!(
        remote["instances"][0],
        "https://www.googleapis.com/compute/v1/projects/test-project/zones/us-central1-a/instances/foo"
    );
    assert_eq!(
        pool.get("instances").and_then(AttrValue::as_string_list),
        Some(vec!["us-central1-a/foo".to_string()])
    );
    assert_eq!(pool.get("health_checks").and_then(AttrValue::as_string_list), Some(vec![hc_link]));
    assert_eq!(pool.get("session_affinity"), Some(&AttrValue::from("CLIENT_IP")));
}

#[tokio::test(start_paused = true)]
async fn import_adopts_existing_entity() {
    let (_sim, ctx) = setup();
    let lifecycle = Lifecycle::new(&ctx, ResourceKind::HttpsHealthCheck);
    let mut state = ResourceState::absent();
    lifecycle
        .create(&mut state, &make_attrs(vec![("name", "hc".into()), ("port", 8443i64.into())]))
        .await
        .unwrap();

    let imported = lifecycle.import("hc").await.unwrap();
    assert_eq!(imported, state);

    let err = lifecycle.import("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
