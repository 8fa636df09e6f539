#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::Router;
use greenhouse_monitor::{
    api::redirect::{LoginRedirect, Navigator},
    models::UserProfile,
    session::{SessionRecord, SessionStore},
    ApiClient,
};
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Base URL of a port nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<LoginRedirect>>,
}

impl RecordingNavigator {
    pub fn count(&self) -> usize {
        self.redirects.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<LoginRedirect> {
        self.redirects.lock().unwrap().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, redirect: &LoginRedirect) {
        self.redirects.lock().unwrap().push(redirect.clone());
    }
}

pub fn temp_store() -> SessionStore {
    SessionStore::new(std::env::temp_dir().join(format!("greenhouse-it-{}", uuid::Uuid::new_v4())))
}

pub struct Harness {
    pub client: ApiClient,
    pub navigator: Arc<RecordingNavigator>,
    pub store: SessionStore,
}

pub fn harness(base_url: &str) -> Harness {
    let navigator = Arc::new(RecordingNavigator::default());
    let store = temp_store();
    let client = ApiClient::new(
        base_url,
        Duration::from_secs(5),
        store.clone(),
        navigator.clone(),
    )
    .unwrap();
    Harness {
        client,
        navigator,
        store,
    }
}

pub fn user() -> UserProfile {
    UserProfile {
        id: "5".into(),
        username: "rina".into(),
        name: "Rina".into(),
        email: "rina@example.com".into(),
        profile_photo: None,
    }
}

impl Harness {
    /// Seed the store with a logged-in session.
    pub async fn log_in(&self) {
        self.store
            .save(&SessionRecord::new(user(), Some("PHPSESSID=abc".into())))
            .await
            .unwrap();
    }
}
