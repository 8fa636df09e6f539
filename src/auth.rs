use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Method, Url,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    api::{
        endpoints,
        models::{
            extract_profile, failure, ApiResponse, AuthResponse, Credentials, PasswordChange,
            PhotoResponse, Registration, SUCCESS,
        },
        ApiClient,
    },
    error::{ApiError, AuthError},
    models::{ProfileChanges, UserProfile},
    session::SessionRecord,
};

/// Directory the backend serves uploaded profile pictures from.
pub const PROFILE_PICTURE_DIR: &str = "/uploads/profile_pictures";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The backend ended the session.
    Complete,
    /// The backend was unreachable; only the local session was cleared.
    ClientOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Remote,
    /// Backend fetch failed; this is the locally mirrored copy.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Synced,
    /// Saved to the local mirror only.
    LocalOnly,
}

/// Account operations: login, registration, logout and profile management.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn session_user(&self) -> Result<UserProfile, AuthError> {
        self.client.store().user().await.ok_or(AuthError::NoSession)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, AuthError> {
        let response: AuthResponse = self
            .client
            .request_json(Method::POST, endpoints::auth::LOGIN, Some(credentials))
            .await?;
        if response.status != SUCCESS {
            return Err(failure(response.message).into());
        }

        let mut user = response
            .user
            .and_then(|v| serde_json::from_value::<UserProfile>(v).ok())
            .filter(|u| !u.id.trim().is_empty())
            .ok_or_else(|| ApiError::Failed("login response carried no user".to_owned()))?;
        if user.username.trim().is_empty() {
            user.username = credentials.username.clone();
        }

        let cookies = self.client.session_cookies();
        self.client
            .store()
            .save(&SessionRecord::new(user.clone(), cookies))
            .await?;
        self.client.controller().end_redirect();

        info!(user_id = %user.id, username = %user.username, "Logged in");
        Ok(user)
    }

    /// Returns the server's confirmation message.
    pub async fn register(&self, registration: &Registration) -> Result<String, AuthError> {
        let message = self
            .client
            .request_json::<_, ApiResponse<Value>>(
                Method::POST,
                endpoints::auth::REGISTER,
                Some(registration),
            )
            .await?
            .into_message()?;
        info!(username = %registration.username, "Registered");
        Ok(message.unwrap_or_else(|| "Registration successful".to_owned()))
    }

    /// End the session. The local record is cleared whatever the backend says.
    pub async fn logout(&self) -> Result<LogoutOutcome, AuthError> {
        let result = self
            .client
            .request_json::<(), ApiResponse<Value>>(Method::POST, endpoints::auth::LOGOUT, None)
            .await
            .and_then(ApiResponse::into_message);
        self.client.store().clear().await;

        match result {
            Ok(_) | Err(ApiError::Unauthorized) => {
                info!("Logged out");
                Ok(LogoutOutcome::Complete)
            }
            Err(e) if e.is_network() => {
                warn!(error = %e, "Backend unreachable during logout; cleared local session only");
                Ok(LogoutOutcome::ClientOnly)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch the profile, falling back to the local mirror when the backend
    /// cannot be used.
    pub async fn profile(&self) -> Result<(UserProfile, ProfileSource), AuthError> {
        let mirror = self.session_user().await?;
        let result: Result<Value, ApiError> = self
            .client
            .get_json(&endpoints::auth::profile_for(&mirror.id))
            .await;

        let remote = match result {
            Ok(body) if body.get("status").and_then(Value::as_str) == Some(SUCCESS) => {
                extract_profile(&body)
            }
            Ok(body) => {
                warn!(message = ?body.get("message"), "Profile fetch refused; using local copy");
                None
            }
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(error = %e, "Profile fetch failed; using local copy");
                None
            }
        };

        match remote {
            Some(user) => {
                self.client.store().save_user(user.clone()).await?;
                Ok((user, ProfileSource::Remote))
            }
            None => Ok((mirror, ProfileSource::Local)),
        }
    }

    /// Push profile edits. When the backend fails for any reason other than
    /// an expired session, the edits are kept locally.
    pub async fn update_profile(
        &self,
        changes: &ProfileChanges,
    ) -> Result<(UserProfile, UpdateOutcome), AuthError> {
        let mirror = self.session_user().await?;
        let result = self
            .client
            .request_json::<_, Value>(
                Method::PUT,
                &endpoints::auth::profile_for(&mirror.id),
                Some(changes),
            )
            .await
            .and_then(|body| {
                if body.get("status").and_then(Value::as_str) == Some(SUCCESS) {
                    Ok(body)
                } else {
                    Err(failure(
                        body.get("message").and_then(Value::as_str).map(str::to_owned),
                    ))
                }
            });

        match result {
            Ok(body) => {
                let user = extract_profile(&body).unwrap_or_else(|| {
                    let mut user = mirror;
                    user.apply(changes);
                    user
                });
                self.client.store().save_user(user.clone()).await?;
                info!(user_id = %user.id, "Profile updated");
                Ok((user, UpdateOutcome::Synced))
            }
            Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(error = %e, "Profile update failed; keeping changes locally");
                let user = self
                    .client
                    .store()
                    .update_user(|u| u.apply(changes))
                    .await?
                    .ok_or(AuthError::NoSession)?;
                Ok((user, UpdateOutcome::LocalOnly))
            }
        }
    }

    pub async fn update_password(&self, change: &PasswordChange) -> Result<(), AuthError> {
        let user = self.session_user().await?;
        self.client
            .request_json::<_, ApiResponse<Value>>(
                Method::PATCH,
                &endpoints::auth::profile_for(&user.id),
                Some(change),
            )
            .await?
            .into_message()?;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Upload a new profile picture. If the upload fails for any reason other
    /// than an expired session, the mirror points at the local file instead.
    pub async fn upload_photo(
        &self,
        path: &Path,
    ) -> Result<(UserProfile, UpdateOutcome), AuthError> {
        let user = self.session_user().await?;
        let bytes = tokio::fs::read(path).await.map_err(|source| AuthError::Photo {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_owned());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path))
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        let form = Form::new()
            .text("user_id", user.id.clone())
            .part("photo", part);

        let result = self
            .client
            .send_multipart::<PhotoResponse>(Method::POST, endpoints::auth::PROFILE_PHOTO, form)
            .await
            .and_then(|r| {
                if r.status == SUCCESS {
                    Ok(r.profile_photo)
                } else {
                    Err(failure(r.message))
                }
            });

        let (photo, outcome) = match result {
            Ok(photo) => (photo, UpdateOutcome::Synced),
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Photo upload failed; keeping local file");
                (Some(local_photo_ref(path).await), UpdateOutcome::LocalOnly)
            }
        };

        let user = self
            .client
            .store()
            .update_user(|u| {
                if photo.is_some() {
                    u.profile_photo = photo;
                }
            })
            .await?
            .ok_or(AuthError::NoSession)?;
        Ok((user, outcome))
    }

    /// Remove the profile picture. The backend tells this apart from an
    /// upload by the missing multipart body.
    pub async fn delete_photo(&self) -> Result<UserProfile, AuthError> {
        self.session_user().await?;
        self.client
            .request_json::<(), ApiResponse<Value>>(
                Method::POST,
                endpoints::auth::PROFILE_PHOTO,
                None,
            )
            .await?
            .into_message()?;
        let user = self
            .client
            .store()
            .update_user(|u| u.profile_photo = None)
            .await?
            .ok_or(AuthError::NoSession)?;
        info!(user_id = %user.id, "Profile photo removed");
        Ok(user)
    }

    /// Displayable URL of the user's photo, with a cache-busting stamp.
    pub fn photo_url(&self, user: &UserProfile) -> Option<String> {
        let photo = user.profile_photo.as_deref()?;
        resolve_photo_url(self.client.base_url(), photo)
            .map(|url| with_cache_bust(&url, Utc::now().timestamp_millis()))
    }
}

/// Absolute URLs pass through; `/path` is joined to the base URL; a bare
/// file name lives under [`PROFILE_PICTURE_DIR`].
pub fn resolve_photo_url(base_url: &str, photo: &str) -> Option<String> {
    let photo = photo.trim();
    if photo.is_empty() {
        return None;
    }
    if photo.contains("://") {
        return Some(photo.to_owned());
    }
    let base = base_url.trim_end_matches('/');
    if photo.starts_with('/') {
        Some(format!("{base}{photo}"))
    } else {
        Some(format!("{base}{PROFILE_PICTURE_DIR}/{photo}"))
    }
}

/// Append `t=<millis>` so the image is re-fetched after a change.
pub fn with_cache_bust(url: &str, millis: i64) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={millis}")
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// `file://` URL of a local photo, so it is never mistaken for a server path.
async fn local_photo_ref(path: &Path) -> String {
    let absolute: PathBuf = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(String::from)
        .unwrap_or_else(|()| absolute.display().to_string())
}
