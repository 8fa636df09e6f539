use thiserror::Error;

/// Failures surfaced by [`crate::api::ApiClient`] and the services built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The backend answered 401. The global redirect has already been handled.
    #[error("not authenticated")]
    Unauthorized,

    /// Non-2xx response carrying a body.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 2xx response whose `status` field is not the success marker.
    #[error("backend reported failure: {0}")]
    Failed(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures of account operations, which also touch the local session mirror.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The operation needs a logged-in user and the mirror has none.
    #[error("not logged in")]
    NoSession,

    #[error("failed to read photo {path}: {source}")]
    Photo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Api(e) if e.is_unauthorized())
    }
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// Text suitable for showing inline to the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Cannot reach the server. Check your internet connection.".to_owned()
            }
            ApiError::Unauthorized => "Your session has expired. Please log in again.".to_owned(),
            ApiError::Rejected { message, .. } | ApiError::Failed(message) => message.clone(),
            ApiError::Unexpected(_) | ApiError::Decode(_) => {
                "Something went wrong. Please try again.".to_owned()
            }
        }
    }
}
