//! End-to-end release runs driven under paused tokio time

mod common;

use common::{engine, id, params};
use release_core::models::{EntityId, Query, QueryResponse};
use release_core::orchestration::{EntityTransition, FailScenario};
use release_core::{EntityState, ReleaseError, ReleaseState};
use std::time::Duration;
use tokio::time::Instant;

fn position(log: &[EntityTransition], entity: &str, to: &str) -> u64 {
    log.iter()
        .find(|t| t.entity_id.as_str() == entity && t.to == to)
        .map(|t| t.sequence)
        .unwrap_or_else(|| panic!("no {to} transition for {entity}"))
}

#[tokio::test(start_paused = true)]
async fn successful_release_takes_nine_seconds() {
    let engine = engine("rel-nine", params(2, 2, 3, 1.0));
    let start = Instant::now();

    let released = engine.run().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(released.as_str(), "release:rel-nine");
    assert!(
        elapsed >= Duration::from_secs(9) && elapsed < Duration::from_millis(9_100),
        "took {elapsed:?}"
    );

    let listing = engine.list_all_entities();
    assert_eq!(listing.release.state, ReleaseState::Completed);
    assert_eq!(listing.waves.len(), 2);
    assert_eq!(listing.clusters.len(), 4);
    assert_eq!(listing.bundles.len(), 4);
    assert_eq!(listing.apps.len(), 12);
    assert!(listing.apps.iter().all(|a| a.state == EntityState::Completed));
    assert!(listing.release.workflow_id.starts_with("release-wf-"));
}

#[tokio::test(start_paused = true)]
async fn app_failure_fails_every_ancestor() {
    let engine = engine(
        "rel-fail",
        params(2, 2, 3, 1.0).with_fail_scenario(FailScenario::AppFailure),
    );

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, ReleaseError::DeploymentFailed { .. }));

    let failed_app = engine
        .get_app_state(&id("app:cluster-1-1-bundle-app-2"))
        .unwrap()
        .unwrap();
    assert_eq!(failed_app.state, EntityState::Failed);
    assert_eq!(
        engine.get_bundle_state(&id("bundle:cluster-1-1-bundle")).unwrap().unwrap().state,
        EntityState::Failed
    );
    assert_eq!(
        engine.get_cluster_state(&id("cluster:cluster-1-1")).unwrap().unwrap().state,
        EntityState::Failed
    );
    assert_eq!(
        engine.get_wave_state(&id("wave:wave-1")).unwrap().unwrap().state,
        EntityState::Failed
    );

    let release = engine.get_release_state();
    assert_eq!(release.state, ReleaseState::Failed);
    let message = release.error_message.unwrap();
    assert!(!message.is_empty());
    assert_eq!(message, err.to_string());
}

#[tokio::test(start_paused = true)]
async fn failing_wave_waits_for_every_sibling_cluster() {
    let engine = engine(
        "rel-siblings",
        params(2, 3, 3, 1.0).with_fail_scenario(FailScenario::AppFailure),
    );

    let err = engine.run().await.unwrap_err();
    // first failure in cluster order wins
    assert!(err.to_string().contains("app:cluster-1-1-bundle-app-2"));

    let log = engine.transitions();
    let wave_failed = position(&log, "wave:wave-1", "failed");
    for cluster in ["cluster:cluster-1-1", "cluster:cluster-1-2", "cluster:cluster-1-3"] {
        assert!(
            position(&log, cluster, "failed") < wave_failed,
            "{cluster} settled after its wave failed"
        );
    }

    let listing = engine.list_all_entities();
    assert!(listing.clusters.iter().all(|c| c.state != EntityState::Deploying));
    assert!(listing.bundles.iter().all(|b| b.state != EntityState::Deploying));
    assert!(listing.apps.iter().all(|a| a.state != EntityState::Deploying));
    assert!(listing
        .clusters
        .iter()
        .filter(|c| c.wave_id.as_str() == "wave:wave-1")
        .all(|c| c.state.is_terminal()));
}

#[tokio::test(start_paused = true)]
async fn apps_in_a_bundle_deploy_one_at_a_time_in_order() {
    let engine = engine("rel-order", params(1, 2, 4, 1.0));
    engine.run().await.unwrap();
    let log = engine.transitions();

    for bundle in engine.list_all_entities().bundles {
        let mut previous_completed = None;
        for app_id in &bundle.app_ids {
            let started = position(&log, app_id.as_str(), "deploying");
            let finished = position(&log, app_id.as_str(), "completed");
            if let Some(prev) = previous_completed {
                assert!(started > prev, "{app_id} started before its predecessor finished");
            }
            previous_completed = Some(finished);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn clusters_in_a_wave_overlap_and_wave_waits_for_all() {
    let engine = engine("rel-overlap", params(1, 3, 2, 1.0));
    engine.run().await.unwrap();
    let log = engine.transitions();

    let starts: Vec<u64> = (1..=3)
        .map(|j| position(&log, &format!("cluster:cluster-1-{j}"), "deploying"))
        .collect();
    let ends: Vec<u64> = (1..=3)
        .map(|j| position(&log, &format!("cluster:cluster-1-{j}"), "completed"))
        .collect();

    // every cluster started before any of them finished
    assert!(starts.iter().max() < ends.iter().min());

    let wave_done = position(&log, "wave:wave-1", "completed");
    assert!(ends.iter().all(|&end| end < wave_done));
}

#[tokio::test(start_paused = true)]
async fn cancellation_between_waves_keeps_completed_wave() {
    let engine = engine("rel-cancel", params(2, 2, 1, 1.0));
    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // wave 1 apps are mid-deploy between 1.5s and 2.5s
    tokio::time::sleep(Duration::from_secs(2)).await;
    engine.cancel_release();
    assert!(engine.is_cancel_requested());

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.unwrap().as_str(), "release:rel-cancel");

    let wave1 = engine.get_wave_state(&id("wave:wave-1")).unwrap().unwrap();
    let wave2 = engine.get_wave_state(&id("wave:wave-2")).unwrap().unwrap();
    assert_eq!(wave1.state, EntityState::Completed);
    assert_eq!(wave2.state, EntityState::Cancelled);

    let listing = engine.list_all_entities();
    for app in &listing.apps {
        let expected = if app.id.as_str().contains("cluster-1-") {
            EntityState::Completed
        } else {
            EntityState::Cancelled
        };
        assert_eq!(app.state, expected, "{}", app.id);
    }

    let release = engine.get_release_state();
    assert_eq!(release.state, ReleaseState::Cancelled);
    assert_eq!(release.error_message.as_deref(), Some("Release cancelled by user"));
}

#[tokio::test(start_paused = true)]
async fn hierarchy_flattens_to_listing() {
    let engine = engine("rel-tree", params(3, 2, 2, 0.1));
    engine.run().await.unwrap();

    let hierarchy = engine.get_hierarchy();
    let listing = engine.list_all_entities();
    assert_eq!(hierarchy.flatten_ids(), listing.flatten_ids());
    assert_eq!(hierarchy.release.wave_ids, listing.flatten_ids().waves);

    let json = serde_json::to_value(&hierarchy).unwrap();
    assert_eq!(json["id"], "release:rel-tree");
    assert_eq!(json["waves"][0]["clusters"][1]["bundle"]["apps"][0]["version"], "v1.1.0");
}

#[tokio::test(start_paused = true)]
async fn queries_mid_run_see_a_consistent_snapshot() {
    let engine = engine("rel-live", params(1, 2, 2, 2.0));
    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let hierarchy = engine.get_hierarchy();
    assert_eq!(hierarchy.release.state, ReleaseState::InProgress);

    let wave = &hierarchy.waves[0];
    assert_eq!(wave.wave.state, EntityState::Deploying);
    for cluster in &wave.clusters {
        let bundle = cluster.bundle.as_ref().unwrap();
        assert_eq!(bundle.apps[0].state, EntityState::Deploying);
        assert_eq!(bundle.apps[1].state, EntityState::Pending);
    }

    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn named_queries_dispatch_and_validate() {
    let engine = engine("rel-named", params(1, 1, 1, 0.1));
    engine.run().await.unwrap();

    let query = Query::parse("get_cluster_state", &["cluster:cluster-1-1".to_string()]).unwrap();
    match engine.answer(&query).unwrap() {
        QueryResponse::Cluster(Some(cluster)) => {
            assert_eq!(cluster.state, EntityState::Completed);
            assert_eq!(cluster.bundle_id, EntityId::parse("bundle:cluster-1-1-bundle").unwrap());
        }
        other => panic!("unexpected response {other:?}"),
    }

    let unknown = engine.answer(&Query::AppState(id("app:nowhere-app-1"))).unwrap();
    assert!(!unknown.is_found());

    assert!(Query::parse("get_app_state", &["wave:wave-1".to_string()]).is_err());
}
