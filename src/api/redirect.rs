use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::warn;

/// How long a started redirect blocks further redirects.
pub const REDIRECT_HOLD: Duration = Duration::from_secs(1);

pub const LOGIN_PATH: &str = "/login";

/// Why the user is being sent to the login view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// A request came back 401.
    SessionExpired,
    /// The session guard could not confirm the session.
    Unauthenticated,
}

/// Target handed to the [`Navigator`] when the user must log in again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// View the user was on; login returns here.
    pub from: String,
    pub reason: RedirectReason,
    /// When the redirect was issued.
    pub timestamp: DateTime<Utc>,
}

impl LoginRedirect {
    pub fn new(from: impl Into<String>, reason: RedirectReason) -> Self {
        Self {
            from: from.into(),
            reason,
            timestamp: Utc::now(),
        }
    }

    /// `/login?redirect=<encoded path>`
    pub fn location(&self) -> String {
        format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(&self.from))
    }
}

/// True for login and register views, where a 401 must not bounce the user.
pub fn is_auth_view(path: &str) -> bool {
    path.contains("/login") || path.contains("/register")
}

/// Front-end seam: moves the user to the login view.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, redirect: &LoginRedirect);
}

/// Navigator for headless use; only records the redirect in the log.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to_login(&self, redirect: &LoginRedirect) {
        warn!(
            from = %redirect.from,
            location = %redirect.location(),
            "Session is no longer valid; login required"
        );
    }
}

/// Owns the "redirect in progress" flag for one client.
///
/// The flag is taken by [`begin_redirect`](Self::begin_redirect) and released
/// either explicitly or once `hold` has elapsed.
#[derive(Debug)]
pub struct SessionController {
    started_at: Mutex<Option<Instant>>,
    hold: Duration,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(REDIRECT_HOLD)
    }
}

impl SessionController {
    pub fn new(hold: Duration) -> Self {
        Self {
            started_at: Mutex::new(None),
            hold,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the flag. Returns `false` while another redirect holds it.
    pub fn begin_redirect(&self) -> bool {
        let mut started = self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        match *started {
            Some(at) if now.duration_since(at) < self.hold => false,
            _ => {
                *started = Some(now);
                true
            }
        }
    }

    pub fn end_redirect(&self) {
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_redirecting(&self) -> bool {
        let started = self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        started.is_some_and(|at| at.elapsed() < self.hold)
    }
}
