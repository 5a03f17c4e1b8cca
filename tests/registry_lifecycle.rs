//! Lifecycle scenarios for the session registry and pipeline arbiter.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{client_offer, test_registry, AudioMode, MediaStats};
use deskcast::session::Role;
use deskcast::AppError;

#[tokio::test(flavor = "multi_thread")]
async fn controller_join_disconnect_rejoin() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc1, offer1) = client_offer(true).await;
    let (id1, answer1) = registry.attach_controller(offer1).await.unwrap();
    assert!(answer1.contains("m=video"));
    assert!(answer1.contains("m=audio"));

    let status = registry.status().await;
    assert_eq!(status.controller.as_deref(), Some(id1.as_str()));
    assert!(status.pipeline_running);

    registry.detach(&id1, Role::Controller).await.unwrap();
    let status = registry.status().await;
    assert!(status.controller.is_none());
    assert!(!status.pipeline_running);

    // Re-join starts a fresh pipeline; ensure waits out the previous
    // teardown internally.
    let (pc2, offer2) = client_offer(true).await;
    let (id2, _) = registry.attach_controller(offer2).await.unwrap();
    assert_ne!(id1, id2);
    assert!(registry.status().await.pipeline_running);
    assert_eq!(stats.capturers_built.load(Ordering::SeqCst), 2);

    registry.teardown().await;
    let _ = pc1.close().await;
    let _ = pc2.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn viewer_fanout_survives_controller_departure() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc1, ctrl_offer) = client_offer(true).await;
    let (ctrl_id, _) = registry.attach_controller(ctrl_offer).await.unwrap();

    let (pc2, view_offer) = client_offer(false).await;
    let (view_id, view_answer) = registry.attach_viewer(view_offer).await.unwrap();
    assert!(view_answer.contains("m=video"));

    // Controller leaves; the pipeline keeps running for the viewer.
    registry.detach(&ctrl_id, Role::Controller).await.unwrap();
    let status = registry.status().await;
    assert!(status.controller.is_none());
    assert_eq!(status.viewers, 1);
    assert!(status.pipeline_running);

    // Last viewer leaves; the pipeline goes idle.
    registry.detach(&view_id, Role::Viewer).await.unwrap();
    assert!(!registry.status().await.pipeline_running);

    // One pipeline run served both sessions.
    assert_eq!(stats.capturers_built.load(Ordering::SeqCst), 1);

    let _ = pc1.close().await;
    let _ = pc2.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn replace_on_reconnect_keeps_pipeline() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc1, offer1) = client_offer(true).await;
    let (id1, _) = registry.attach_controller(offer1).await.unwrap();

    let (pc2, offer2) = client_offer(true).await;
    let (id2, _) = registry.attach_controller(offer2).await.unwrap();
    assert_ne!(id1, id2);

    // The first controller is closed and unreachable.
    let status = registry.status().await;
    assert_eq!(status.controller.as_deref(), Some(id2.as_str()));
    let err = registry
        .trickle(&id1, Role::Controller, "a=candidate:x\r\n")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // No pipeline restart happened.
    assert!(status.pipeline_running);
    assert_eq!(stats.capturers_built.load(Ordering::SeqCst), 1);

    registry.teardown().await;
    let _ = pc1.close().await;
    let _ = pc2.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn detach_is_single_fire() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc, offer) = client_offer(true).await;
    let (id, _) = registry.attach_controller(offer).await.unwrap();

    registry.detach(&id, Role::Controller).await.unwrap();
    let err = registry.detach(&id, Role::Controller).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(!registry.status().await.pipeline_running);

    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_trickle_is_tolerated() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc, offer) = client_offer(true).await;
    let (id, _) = registry.attach_controller(offer).await.unwrap();

    registry
        .trickle(
            &id,
            Role::Controller,
            "a=candidate:garbage\r\nnon-candidate-line\r\n",
        )
        .await
        .unwrap();

    // The session is still live and addressable.
    registry.trickle(&id, Role::Controller, "").await.unwrap();
    assert!(registry.status().await.controller.is_some());

    registry.teardown().await;
    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn audio_failure_is_non_fatal() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::Failing);

    let (pc, offer) = client_offer(true).await;
    let (_, answer) = registry.attach_controller(offer).await.unwrap();

    // The answer still carries the audio m-line; video keeps flowing.
    assert!(answer.contains("m=audio"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(stats.units_encoded.load(Ordering::SeqCst) > 0);

    registry.teardown().await;
    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn audio_packets_are_forwarded() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::Working);

    let (pc, offer) = client_offer(true).await;
    registry.attach_controller(offer).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(stats.audio_packets_sent.load(Ordering::SeqCst) > 0);

    registry.teardown().await;
    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_flow_while_running() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let (pc, offer) = client_offer(false).await;
    let (id, _) = registry.attach_viewer(offer).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(stats.units_encoded.load(Ordering::SeqCst) > 0);

    registry.detach(&id, Role::Viewer).await.unwrap();

    // After idle, production settles and every grabbed frame has reached
    // the encoder (the loop is lossless between grab and encode).
    tokio::time::sleep(Duration::from_millis(100)).await;
    let grabbed = stats.frames_grabbed.load(Ordering::SeqCst);
    let encoded = stats.units_encoded.load(Ordering::SeqCst);
    assert_eq!(grabbed, encoded);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(grabbed, stats.frames_grabbed.load(Ordering::SeqCst));

    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn final_state_depends_only_on_live_multiset() {
    let stats = Arc::new(MediaStats::default());
    let registry = test_registry(&stats, AudioMode::None);

    let mut client_pcs = Vec::new();

    // Interleaved history: controller joins, viewers churn, controller is
    // replaced, one viewer stays.
    let (pc, offer) = client_offer(true).await;
    client_pcs.push(pc);
    let (c1, _) = registry.attach_controller(offer).await.unwrap();

    let (pc, offer) = client_offer(false).await;
    client_pcs.push(pc);
    let (v1, _) = registry.attach_viewer(offer).await.unwrap();

    let (pc, offer) = client_offer(false).await;
    client_pcs.push(pc);
    let (v2, _) = registry.attach_viewer(offer).await.unwrap();

    registry.detach(&v1, Role::Viewer).await.unwrap();

    let (pc, offer) = client_offer(true).await;
    client_pcs.push(pc);
    let (c2, _) = registry.attach_controller(offer).await.unwrap();
    assert_ne!(c1, c2);

    let status = registry.status().await;
    assert_eq!(status.controller.as_deref(), Some(c2.as_str()));
    assert_eq!(status.viewers, 1);
    assert!(status.pipeline_running);

    // Drain everything; the registry converges to empty + idle.
    registry.detach(&c2, Role::Controller).await.unwrap();
    registry.detach(&v2, Role::Viewer).await.unwrap();
    let status = registry.status().await;
    assert!(status.controller.is_none());
    assert_eq!(status.viewers, 0);
    assert!(!status.pipeline_running);

    for pc in client_pcs {
        let _ = pc.close().await;
    }
}
