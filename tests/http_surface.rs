//! WHEP HTTP surface tests driven through the router.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{client_offer, test_registry, AudioMode, MediaStats};
use deskcast::config::GuestInfo;
use deskcast::state::AppState;
use deskcast::web;

const TOKEN: &str = "SECRET";

fn test_app(stats: &Arc<MediaStats>) -> (Router, Arc<AppState>) {
    let registry = test_registry(stats, AudioMode::None);
    let state = Arc::new(AppState {
        registry,
        token: TOKEN.to_owned(),
        guest: GuestInfo::detect(false, false),
    });
    (web::create_router(state.clone()), state)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn index_serves_embedded_client() {
    let stats = Arc::new(MediaStats::default());
    let (app, _) = test_app(&stats);

    let resp = app.oneshot(request("GET", "/", None, "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(std::str::from_utf8(&body).unwrap().contains("<video"));
}

#[tokio::test(flavor = "multi_thread")]
async fn mode_and_config_report_guest() {
    let stats = Arc::new(MediaStats::default());
    let (app, _) = test_app(&stats);

    let resp = app
        .clone()
        .oneshot(request("GET", "/mode", None, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["mode"], "desktop");

    let resp = app
        .oneshot(request("GET", "/config", None, ""))
        .await
        .unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["guest"]["type"], "desktop");
    assert_eq!(json["guest"]["clipboard"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_rejection_leaves_state_unchanged() {
    let stats = Arc::new(MediaStats::default());
    let (app, state) = test_app(&stats);

    let (_pc, offer) = client_offer(true).await;

    let resp = app
        .clone()
        .oneshot(request("POST", "/whep", Some("WRONG"), &offer))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(request("POST", "/whep", None, &offer))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let status = state.registry.status().await;
    assert!(status.controller.is_none());
    assert!(!status.pipeline_running);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_session_yields_404() {
    let stats = Arc::new(MediaStats::default());
    let (app, _) = test_app(&stats);

    let resp = app
        .clone()
        .oneshot(request(
            "PATCH",
            "/whep/no-such-id",
            Some(TOKEN),
            "a=candidate:1 1 UDP 1 198.51.100.1 9 typ host\r\n",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(request("DELETE", "/whep/no-such-id", Some(TOKEN), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(request("DELETE", "/whep/view/no-such-id", Some(TOKEN), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn options_preflight_is_open() {
    let stats = Arc::new(MediaStats::default());
    let (app, _) = test_app(&stats);

    for uri in ["/whep", "/whep/some-id", "/whep/view", "/whep/view/some-id"] {
        let resp = app
            .clone()
            .oneshot(request("OPTIONS", uri, None, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT, "uri {uri}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn controller_whep_flow() {
    let stats = Arc::new(MediaStats::default());
    let (app, state) = test_app(&stats);

    let (pc, offer) = client_offer(true).await;
    let resp = app
        .clone()
        .oneshot(request("POST", "/whep", Some(TOKEN), &offer))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/sdp"
    );

    let location = resp
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(location.starts_with("/whep/"));

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let answer = std::str::from_utf8(&body).unwrap();
    assert!(answer.contains("m=video"));

    // Trickle a candidate fragment, then a malformed one; both 204.
    let resp = app
        .clone()
        .oneshot(request(
            "PATCH",
            &location,
            Some(TOKEN),
            "a=candidate:1 1 UDP 2122252543 198.51.100.7 49170 typ host\r\n",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(request(
            "PATCH",
            &location,
            Some(TOKEN),
            "a=candidate:garbage\r\nnon-candidate-line\r\n",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert!(state.registry.status().await.pipeline_running);

    let resp = app
        .oneshot(request("DELETE", &location, Some(TOKEN), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!state.registry.status().await.pipeline_running);

    let _ = pc.close().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn viewer_whep_flow() {
    let stats = Arc::new(MediaStats::default());
    let (app, state) = test_app(&stats);

    let (pc, offer) = client_offer(false).await;
    let resp = app
        .clone()
        .oneshot(request("POST", "/whep/view", Some(TOKEN), &offer))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let location = resp
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(location.starts_with("/whep/view/"));

    let resp = app
        .oneshot(request("DELETE", &location, Some(TOKEN), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!state.registry.status().await.pipeline_running);

    let _ = pc.close().await;
}
