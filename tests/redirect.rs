mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{http::StatusCode, routing::get, Json, Router};
use greenhouse_monitor::{api::redirect::RedirectReason, ApiError};
use serde_json::{json, Value};

use common::{closed_url, harness, serve};

fn unauthorized_backend(hits: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/api/rooms",
        get(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "status": "error", "message": "Unauthorized" })),
                )
            }
        }),
    )
}

#[tokio::test]
async fn concurrent_401s_redirect_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = harness(&serve(unauthorized_backend(hits.clone())).await);
    h.log_in().await;
    h.client.set_view("/rooms/1");

    let (a, b, c) = tokio::join!(
        h.client.get_json::<Value>("/api/rooms"),
        h.client.get_json::<Value>("/api/rooms"),
        h.client.get_json::<Value>("/api/rooms"),
    );

    assert!(matches!(a, Err(ApiError::Unauthorized)));
    assert!(matches!(b, Err(ApiError::Unauthorized)));
    assert!(matches!(c, Err(ApiError::Unauthorized)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    assert_eq!(h.navigator.count(), 1);
    let redirect = h.navigator.last().unwrap();
    assert_eq!(redirect.from, "/rooms/1");
    assert_eq!(redirect.reason, RedirectReason::SessionExpired);
    assert_eq!(redirect.location(), "/login?redirect=%2Frooms%2F1");

    assert!(h.store.load().await.is_none());
}

#[tokio::test]
async fn second_401_after_hold_redirects_again() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = harness(&serve(unauthorized_backend(hits)).await);
    h.client.set_view("/dashboard");

    let _ = h.client.get_json::<Value>("/api/rooms").await;
    assert_eq!(h.navigator.count(), 1);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let _ = h.client.get_json::<Value>("/api/rooms").await;
    assert_eq!(h.navigator.count(), 2);
}

#[tokio::test]
async fn no_redirect_from_auth_views() {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = harness(&serve(unauthorized_backend(hits)).await);
    h.log_in().await;
    h.client.set_view("/login");

    let result = h.client.get_json::<Value>("/api/rooms").await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(h.navigator.count(), 0);
    assert!(!h.client.controller().is_redirecting());
    assert!(h.store.load().await.is_some());
}

#[tokio::test]
async fn network_failure_is_not_a_logout() {
    let h = harness(&closed_url().await);
    h.log_in().await;
    h.client.set_view("/rooms/1");

    let err = h.client.get_json::<Value>("/api/rooms").await.unwrap_err();

    assert!(err.is_network());
    assert_eq!(
        err.user_message(),
        "Cannot reach the server. Check your internet connection."
    );
    assert_eq!(h.navigator.count(), 0);
    assert!(h.store.load().await.is_some());
}

#[tokio::test]
async fn non_2xx_carries_server_message() {
    let router = Router::new().route(
        "/api/rooms",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "database offline" })),
            )
        }),
    );
    let h = harness(&serve(router).await);

    match h.client.rooms().await {
        Err(ApiError::Rejected { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database offline");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn health_reports_reachability() {
    let router = Router::new().route("/api/test", get(|| async { Json(json!({ "ok": true })) }));
    let h = harness(&serve(router).await);
    let report = h.client.health().await;
    assert!(report.healthy);
    assert!(report.url.ends_with("/api/test"));

    let down = harness(&closed_url().await).client.health().await;
    assert!(!down.healthy);
    assert!(down.error.is_some());
}
