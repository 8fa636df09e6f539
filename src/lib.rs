//! Terminal client for the greenhouse monitoring backend: session handling,
//! live sensor polling and actuator control for one room at a time.
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod render;
pub mod session;
pub mod status;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ApiError, AuthError};
