mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{http::StatusCode, routing::get, Json, Router};
use greenhouse_monitor::session::{GuardState, GuardView, SessionGuard};
use serde_json::{json, Value};

use common::{harness, serve, user};

fn profile_backend(
    hits: Arc<AtomicUsize>,
    status: StatusCode,
    body: Value,
    delay: Duration,
) -> Router {
    Router::new().route(
        "/auth/profile",
        get(move || {
            let hits = hits.clone();
            let body = body.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                (status, Json(body))
            }
        }),
    )
}

fn profile_body(name: &str) -> Value {
    json!({
        "status": "success",
        "data": { "id": 5, "username": "rina", "name": name, "email": "rina@example.com" }
    })
}

#[tokio::test]
async fn valid_session_is_checked_once_per_window() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits.clone(),
        StatusCode::OK,
        profile_body("Rina S."),
        Duration::ZERO,
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    let guard =
        SessionGuard::new(h.client.clone()).with_recheck_after(Duration::from_millis(300));

    assert_eq!(guard.visit("/rooms/1").await, GuardView::Protected);
    assert_eq!(guard.visit("/dashboard").await, GuardView::Protected);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.current_view(), "/dashboard");

    // Mirror refreshed, cookies kept.
    let record = h.store.load().await.unwrap();
    assert_eq!(record.user.name, "Rina S.");
    assert_eq!(record.cookies.as_deref(), Some("PHPSESSID=abc"));

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(guard.needs_check());
    assert_eq!(guard.visit("/rooms/1").await, GuardView::Protected);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn success_without_profile_still_authenticates() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits,
        StatusCode::OK,
        json!({ "status": "success", "message": "ok" }),
        Duration::ZERO,
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    let guard = SessionGuard::new(h.client.clone());

    assert_eq!(guard.visit("/rooms/1").await, GuardView::Protected);
    assert_eq!(h.store.user().await, Some(user()));
}

#[tokio::test]
async fn rejected_session_redirects_and_clears_mirror() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits,
        StatusCode::OK,
        json!({ "status": "error", "message": "Not logged in" }),
        Duration::ZERO,
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    let guard = SessionGuard::new(h.client.clone());

    match guard.visit("/rooms/2").await {
        GuardView::RedirectToLogin(redirect) => {
            assert_eq!(redirect.location(), "/login?redirect=%2Frooms%2F2");
        }
        other => panic!("unexpected view: {other:?}"),
    }
    assert_eq!(guard.state(), GuardState::Unauthenticated);
    assert!(h.store.load().await.is_none());
}

#[tokio::test]
async fn unmounted_guard_discards_late_result() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits.clone(),
        StatusCode::UNAUTHORIZED,
        json!({ "status": "error" }),
        Duration::from_millis(200),
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    h.client.set_view("/login");
    let guard = Arc::new(SessionGuard::new(h.client.clone()));

    let check = tokio::spawn({
        let guard = guard.clone();
        async move { guard.check().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    guard.unmount();
    check.await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(guard.state(), GuardState::Checking);
    assert!(h.store.load().await.is_some());
}

#[tokio::test]
async fn guard_redirect_after_unauthorized_navigates_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits,
        StatusCode::UNAUTHORIZED,
        json!({ "status": "error", "message": "Unauthorized" }),
        Duration::ZERO,
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    let guard = SessionGuard::new(h.client.clone());

    let GuardView::RedirectToLogin(redirect) = guard.visit("/rooms/1").await else {
        panic!("expected a login redirect");
    };
    assert_eq!(h.navigator.count(), 1);

    assert!(!h.client.redirect_to_login(&redirect));
    assert_eq!(h.navigator.count(), 1);
}

#[tokio::test]
async fn guard_redirect_without_unauthorized_navigates() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = profile_backend(
        hits,
        StatusCode::OK,
        json!({ "status": "error", "message": "Not logged in" }),
        Duration::ZERO,
    );
    let h = harness(&serve(router).await);
    h.log_in().await;
    let guard = SessionGuard::new(h.client.clone());

    let GuardView::RedirectToLogin(redirect) = guard.visit("/rooms/1").await else {
        panic!("expected a login redirect");
    };
    assert_eq!(h.navigator.count(), 0);

    assert!(h.client.redirect_to_login(&redirect));
    assert!(!h.client.redirect_to_login(&redirect));
    assert_eq!(h.navigator.count(), 1);
    assert_eq!(
        h.navigator.last().unwrap().location(),
        "/login?redirect=%2Frooms%2F1"
    );
}
