//! File-backed client storage: one JSON file per fixed key under the state directory.
//!
//! Only two keys exist: the session record (`user`) and the dark-mode flag
//! (`darkMode`). The session record is parsed through [`parse_record`], which
//! fails closed: anything malformed reads as "no session".
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::models::UserProfile;

pub const USER_KEY: &str = "user";
pub const DARK_MODE_KEY: &str = "darkMode";

/// Current layout of [`SessionRecord`]. Records of any other version are discarded.
pub const RECORD_VERSION: u32 = 1;

/// Locally mirrored session: the last known profile plus the cookie header
/// that identifies the server-side session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub user: UserProfile,
    #[serde(default)]
    pub cookies: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(user: UserProfile, cookies: Option<String>) -> Self {
        Self {
            version: RECORD_VERSION,
            user,
            cookies,
            saved_at: Utc::now(),
        }
    }
}

/// Validate raw bytes as a session record.
pub fn parse_record(bytes: &[u8]) -> Result<SessionRecord> {
    let record: SessionRecord =
        serde_json::from_slice(bytes).context("session record is not valid JSON")?;
    if record.version != RECORD_VERSION {
        bail!("unsupported session record version {}", record.version);
    }
    if !record.user.is_valid() {
        bail!("session record has no user id or username");
    }
    Ok(record)
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: Arc<PathBuf>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Arc::new(dir.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the session record. A missing file is `None`; an invalid one is
    /// removed and also reads as `None`.
    pub async fn load(&self) -> Option<SessionRecord> {
        let path = self.path(USER_KEY);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session store: failed to read record");
                return None;
            }
        };

        match parse_record(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session store: discarding invalid record");
                self.clear().await;
                None
            }
        }
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.load().await.map(|r| r.user)
    }

    pub async fn save(&self, record: &SessionRecord) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(record).context("failed to serialize session record")?;
        self.write(USER_KEY, &bytes).await
    }

    /// Replace the mirrored profile, keeping the stored cookies.
    pub async fn save_user(&self, user: UserProfile) -> Result<()> {
        let cookies = self.load().await.and_then(|r| r.cookies);
        self.save(&SessionRecord::new(user, cookies)).await
    }

    /// Edit the mirrored profile in place. Returns the new profile, or `None`
    /// when there is no session to edit.
    pub async fn update_user<F>(&self, edit: F) -> Result<Option<UserProfile>>
    where
        F: FnOnce(&mut UserProfile),
    {
        let Some(mut record) = self.load().await else {
            return Ok(None);
        };
        edit(&mut record.user);
        record.saved_at = Utc::now();
        self.save(&record).await?;
        Ok(Some(record.user))
    }

    /// Remove the session record. Best-effort: failures are logged and swallowed.
    pub async fn clear(&self) {
        let path = self.path(USER_KEY);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "session store: record cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session store: failed to clear record")
            }
        }
    }

    pub async fn dark_mode(&self) -> bool {
        match fs::read(self.path(DARK_MODE_KEY)).await {
            Ok(bytes) => serde_json::from_slice::<bool>(&bytes).unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn set_dark_mode(&self, on: bool) -> Result<()> {
        let bytes = serde_json::to_vec(&on).context("failed to serialize dark mode flag")?;
        self.write(DARK_MODE_KEY, &bytes).await
    }

    /// Write through a temporary file so a crash never leaves half a record.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(self.dir.as_path())
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "session store: saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile {
            id: "1".into(),
            username: "rina".into(),
            name: "Rina".into(),
            email: "rina@example.com".into(),
            profile_photo: None,
        }
    }

    fn temp_store() -> SessionStore {
        let dir = std::env::temp_dir().join(format!(
            "greenhouse-store-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        SessionStore::new(dir)
    }

    #[test]
    fn parse_record_accepts_current_version() {
        let bytes = serde_json::to_vec(&SessionRecord::new(user(), None)).unwrap();
        assert_eq!(parse_record(&bytes).unwrap().user.username, "rina");
    }

    #[test]
    fn parse_record_rejects_other_versions() {
        let mut record = SessionRecord::new(user(), None);
        record.version = 0;
        let bytes = serde_json::to_vec(&record).unwrap();
        assert!(parse_record(&bytes).unwrap_err().to_string().contains("version"));
    }

    #[test]
    fn parse_record_rejects_legacy_bare_profile() {
        let bytes = serde_json::to_vec(&user()).unwrap();
        assert!(parse_record(&bytes).is_err());
    }

    #[test]
    fn parse_record_rejects_blank_user() {
        let mut record = SessionRecord::new(user(), None);
        record.user.id = String::new();
        let bytes = serde_json::to_vec(&record).unwrap();
        assert!(parse_record(&bytes).is_err());
    }

    #[tokio::test]
    async fn save_load_clear() {
        let store = temp_store();
        assert!(store.load().await.is_none());

        store
            .save(&SessionRecord::new(user(), Some("PHPSESSID=abc".into())))
            .await
            .unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.user, user());
        assert_eq!(loaded.cookies.as_deref(), Some("PHPSESSID=abc"));

        store.clear().await;
        assert!(store.load().await.is_none());
        // Clearing twice is fine.
        store.clear().await;
    }

    #[tokio::test]
    async fn corrupt_record_fails_closed_and_is_removed() {
        let store = temp_store();
        fs::create_dir_all(store.dir()).await.unwrap();
        fs::write(store.path(USER_KEY), b"{\"id\": 1").await.unwrap();

        assert!(store.load().await.is_none());
        assert!(!store.path(USER_KEY).exists());
    }

    #[tokio::test]
    async fn save_user_keeps_cookies() {
        let store = temp_store();
        store
            .save(&SessionRecord::new(user(), Some("sid=1".into())))
            .await
            .unwrap();

        let mut changed = user();
        changed.name = "Rina S.".into();
        store.save_user(changed).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.user.name, "Rina S.");
        assert_eq!(loaded.cookies.as_deref(), Some("sid=1"));
    }

    #[tokio::test]
    async fn update_user_without_session_is_none() {
        let store = temp_store();
        let result = store.update_user(|u| u.name = "x".into()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn dark_mode_defaults_off() {
        let store = temp_store();
        assert!(!store.dark_mode().await);
        store.set_dark_mode(true).await.unwrap();
        assert!(store.dark_mode().await);
        store.set_dark_mode(false).await.unwrap();
        assert!(!store.dark_mode().await);
    }
}
