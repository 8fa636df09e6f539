use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    api::{
        endpoints,
        models::{extract_profile, SUCCESS},
        redirect::{LoginRedirect, RedirectReason},
        ApiClient,
    },
    error::ApiError,
};

/// An authenticated session is re-confirmed with the backend at most this often.
pub const RECHECK_AFTER: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authenticated,
    Unauthenticated,
}

/// What the front end should show for a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Blocking loading indicator.
    Loading,
    Protected,
    RedirectToLogin(LoginRedirect),
}

#[derive(Debug)]
struct GuardInner {
    state: GuardState,
    last_checked: Option<Instant>,
    path: String,
}

/// Gates protected views behind a periodic `GET /auth/profile`.
#[derive(Debug)]
pub struct SessionGuard {
    client: ApiClient,
    inner: Mutex<GuardInner>,
    mounted: AtomicBool,
    recheck_after: Duration,
}

impl SessionGuard {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            inner: Mutex::new(GuardInner {
                state: GuardState::Checking,
                last_checked: None,
                path: "/".to_owned(),
            }),
            mounted: AtomicBool::new(true),
            recheck_after: RECHECK_AFTER,
        }
    }

    pub fn with_recheck_after(mut self, recheck_after: Duration) -> Self {
        self.recheck_after = recheck_after;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuardInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> GuardState {
        self.lock().state
    }

    /// Still checking, or the last check is older than the recheck window.
    pub fn needs_check(&self) -> bool {
        let inner = self.lock();
        inner.state == GuardState::Checking
            || inner
                .last_checked
                .map_or(true, |at| at.elapsed() > self.recheck_after)
    }

    /// Enter `path`: re-check the session if due, then report what to show.
    pub async fn visit(&self, path: &str) -> GuardView {
        self.lock().path = path.to_owned();
        self.client.set_view(path);

        if self.needs_check() {
            self.check().await;
        }
        self.view()
    }

    /// Ask the backend whether the session is still valid and update state.
    ///
    /// The result is dropped if the guard was unmounted meanwhile.
    pub async fn check(&self) {
        debug!("Checking session with backend");
        let outcome = self.fetch_profile().await;

        if !self.mounted.load(Ordering::SeqCst) {
            debug!("Session guard unmounted; discarding check result");
            return;
        }

        let state = match outcome {
            Ok(profile) => {
                if let Some(user) = profile {
                    if let Err(e) = self.client.store().save_user(user).await {
                        warn!(error = %e, "Failed to refresh session mirror");
                    }
                }
                GuardState::Authenticated
            }
            Err(e) => {
                info!(error = %e, "Session check failed; treating as logged out");
                self.client.store().clear().await;
                GuardState::Unauthenticated
            }
        };

        let mut inner = self.lock();
        inner.state = state;
        inner.last_checked = Some(Instant::now());
    }

    /// `Ok(None)` means the backend confirmed the session without a usable profile.
    async fn fetch_profile(&self) -> Result<Option<crate::models::UserProfile>, ApiError> {
        let body: serde_json::Value = self.client.get_json(endpoints::auth::PROFILE).await?;
        match body.get("status").and_then(|s| s.as_str()) {
            Some(SUCCESS) => Ok(extract_profile(&body)),
            _ => Err(ApiError::Failed(
                body.get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("not authenticated")
                    .to_owned(),
            )),
        }
    }

    pub fn view(&self) -> GuardView {
        let inner = self.lock();
        match inner.state {
            GuardState::Checking => GuardView::Loading,
            GuardState::Authenticated => GuardView::Protected,
            GuardState::Unauthenticated => GuardView::RedirectToLogin(LoginRedirect::new(
                inner.path.clone(),
                RedirectReason::Unauthenticated,
            )),
        }
    }

    /// Detach the guard; in-flight checks complete without touching state.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }
}
