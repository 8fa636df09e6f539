pub mod endpoints;
pub mod models;
pub mod redirect;

use std::{
    fmt,
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::Context;
use bytes::Bytes;
use reqwest::{
    cookie::{CookieStore, Jar},
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Method, RequestBuilder, StatusCode, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

use crate::{
    config::Config,
    error::ApiError,
    models::{ActuatorState, IdealRange},
    session::store::SessionStore,
};

use self::{
    models::{
        extract_message, ActuatorPayload, ApiResponse, ControlRequest, DashboardPayload,
        HealthReport, Room, SensorPayload, SettingsPayload,
    },
    redirect::{is_auth_view, LoginRedirect, Navigator, RedirectReason, SessionController},
};

/// HTTP client for the greenhouse backend.
///
/// Cheap to clone; all clones share one cookie jar, one redirect guard and
/// one notion of the current view.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    base: Url,
    jar: Arc<Jar>,
    store: SessionStore,
    navigator: Arc<dyn Navigator>,
    controller: SessionController,
    current_view: RwLock<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("current_view", &self.current_view())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let base = Url::parse(&base_url)
            .with_context(|| format!("invalid API base URL: {base_url:?}"))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(jar.clone())
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                base,
                jar,
                store,
                navigator,
                controller: SessionController::default(),
                current_view: RwLock::new("/".to_owned()),
            }),
        })
    }

    pub fn from_config(
        config: &Config,
        store: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let client = Self::new(&config.base_url, config.request_timeout, store, navigator)?;
        info!(
            base_url = %config.base_url,
            development = config.development,
            environment = %config.environment,
            timeout_ms = config.request_timeout.as_millis() as u64,
            "API client configured"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn controller(&self) -> &SessionController {
        &self.inner.controller
    }

    /// Record the view the user is on. Used as the return target of a login redirect.
    pub fn set_view(&self, path: impl Into<String>) {
        *self.inner.current_view.write().unwrap_or_else(|e| e.into_inner()) = path.into();
    }

    pub fn current_view(&self) -> String {
        self.inner
            .current_view
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    // -----------------------------------------------------------------------
    // Cookies
    // -----------------------------------------------------------------------

    /// Cookie header the jar would send to the backend, if any.
    pub fn session_cookies(&self) -> Option<String> {
        self.inner
            .jar
            .cookies(&self.inner.base)
            .and_then(|v| v.to_str().ok().map(str::to_owned))
    }

    /// Load a previously exported cookie header back into the jar.
    pub fn restore_cookies(&self, header: &str) {
        for pair in header.split(';').map(str::trim).filter(|p| p.contains('=')) {
            self.inner
                .jar
                .add_cookie_str(&format!("{pair}; Path=/"), &self.inner.base);
        }
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// Send a request and return the body of a 2xx response.
    ///
    /// A 401 triggers the login redirect (see [`handle_unauthorized`](Self::handle_unauthorized))
    /// before `Unauthorized` is returned.
    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<Bytes, ApiError> {
        debug!(path = %path, "API request");

        let response = request.send().await.map_err(|e| {
            error!(path = %path, error = %e, "Network error: no response from backend");
            ApiError::Network(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            error!(path = %path, error = %e, "Network error: failed to read response body");
            ApiError::Network(e)
        })?;
        debug!(path = %path, status = status.as_u16(), bytes = bytes.len(), "API response");

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized().await;
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let message = extract_message(&bytes).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_owned()
            });
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(bytes)
    }

    /// Clear the session mirror and send the user to the login view, unless
    /// they are already on an auth view or a redirect is in progress.
    async fn handle_unauthorized(&self) {
        let view = self.current_view();
        if is_auth_view(&view) {
            debug!(view = %view, "401 on an auth view; not redirecting");
            return;
        }
        if !self.inner.controller.begin_redirect() {
            debug!(view = %view, "401 while a redirect is in progress; ignoring");
            return;
        }

        self.inner.store.clear().await;

        let redirect = LoginRedirect::new(view, RedirectReason::SessionExpired);
        info!(location = %redirect.location(), "Session rejected by backend; redirecting to login");
        self.inner.navigator.redirect_to_login(&redirect);
    }

    /// Send the user to the login view unless a redirect is already under way.
    ///
    /// A guard that sees a rejected session after a 401 must not navigate a
    /// second time. Returns whether the navigator was called.
    pub fn redirect_to_login(&self, redirect: &LoginRedirect) -> bool {
        if !self.inner.controller.begin_redirect() {
            debug!(location = %redirect.location(), "Redirect already in progress; skipping");
            return false;
        }
        info!(location = %redirect.location(), "Redirecting to login");
        self.inner.navigator.redirect_to_login(redirect);
        true
    }

    pub async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.inner.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let bytes = self.execute(request, path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request_json::<(), T>(Method::GET, path, None).await
    }

    pub async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        let request = self.inner.http.request(method, self.url(path)).multipart(form);
        let bytes = self.execute(request, path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // -----------------------------------------------------------------------
    // Sensors & actuators
    // -----------------------------------------------------------------------

    pub async fn latest_reading(&self, room_id: u32) -> Result<SensorPayload, ApiError> {
        self.get_json::<ApiResponse<SensorPayload>>(&endpoints::sensor::latest(room_id))
            .await?
            .into_result()
    }

    /// Most recent `limit` readings, newest first as the backend returns them.
    pub async fn reading_history(
        &self,
        room_id: u32,
        limit: usize,
    ) -> Result<Vec<SensorPayload>, ApiError> {
        self.get_json::<ApiResponse<Vec<SensorPayload>>>(&endpoints::sensor::history(
            room_id, limit,
        ))
        .await?
        .into_result()
    }

    pub async fn actuator_status(&self, room_id: u32) -> Result<ActuatorState, ApiError> {
        let payload = self
            .get_json::<ApiResponse<ActuatorPayload>>(&endpoints::sensor::actuators(room_id))
            .await?
            .into_result()?;
        Ok(ActuatorState::from(&payload))
    }

    /// Send the full desired actuator vector for a room.
    pub async fn control_actuators(
        &self,
        room_id: u32,
        desired: ActuatorState,
    ) -> Result<(), ApiError> {
        let body = ControlRequest::new(room_id, desired);
        self.request_json::<_, ApiResponse<serde_json::Value>>(
            Method::PUT,
            &endpoints::sensor::control(room_id),
            Some(&body),
        )
        .await?
        .into_message()
        .map(|_| ())
    }

    pub async fn room_settings(&self, room_id: u32) -> Result<IdealRange, ApiError> {
        let payload = self
            .get_json::<ApiResponse<SettingsPayload>>(&endpoints::settings::for_room(room_id))
            .await?
            .into_result()?;
        Ok(IdealRange::from(&payload))
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json::<ApiResponse<Vec<Room>>>(endpoints::rooms::LIST)
            .await?
            .into_result()
    }

    pub async fn dashboard(&self) -> Result<Vec<models::RoomOverview>, ApiError> {
        Ok(self
            .get_json::<ApiResponse<DashboardPayload>>(endpoints::rooms::DASHBOARD)
            .await?
            .into_result()?
            .into_rooms())
    }

    /// Call the backend's test endpoint. Never fails; the outcome is in the report.
    pub async fn health(&self) -> HealthReport {
        let url = self.url(endpoints::HEALTH);
        match self.get_json::<serde_json::Value>(endpoints::HEALTH).await {
            Ok(_) => HealthReport {
                healthy: true,
                url,
                error: None,
            },
            Err(e) => HealthReport {
                healthy: false,
                url,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::redirect::LogNavigator;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            base,
            Duration::from_secs(1),
            SessionStore::new(std::env::temp_dir().join("greenhouse-api-unit")),
            Arc::new(LogNavigator),
        )
        .unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = client("https://api-iot.wibudev.moe/");
        assert_eq!(c.base_url(), "https://api-iot.wibudev.moe");
        assert_eq!(c.url("/auth/profile"), "https://api-iot.wibudev.moe/auth/profile");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::new(
            "not a url",
            Duration::from_secs(1),
            SessionStore::new(std::env::temp_dir()),
            Arc::new(LogNavigator),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid API base URL"));
    }

    #[test]
    fn cookies_round_trip_through_the_jar() {
        let c = client("http://localhost:8000/TA/backend");
        assert!(c.session_cookies().is_none());

        c.restore_cookies("PHPSESSID=abc123; theme=dark");
        let header = c.session_cookies().unwrap();
        assert!(header.contains("PHPSESSID=abc123"));
        assert!(header.contains("theme=dark"));
    }

    #[test]
    fn view_defaults_to_root() {
        let c = client("http://localhost");
        assert_eq!(c.current_view(), "/");
        c.set_view("/rooms/2");
        assert_eq!(c.clone().current_view(), "/rooms/2");
    }
}
