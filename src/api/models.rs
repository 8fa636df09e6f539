use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::ApiError,
    models::{ActuatorState, ChartPoint, IdealRange, UserProfile},
};

/// Value of the `status` field on every successful response.
pub const SUCCESS: &str = "success";

// ---------------------------------------------------------------------------
// Generic response envelope
//
// Success:
//   { "status": "success", "data": <T> }
//
// Failure (often still HTTP 200):
//   { "status": "error", "message": "..." }
//
// Auth endpoints put the payload under `user` instead of `data`, and photo
// endpoints return their fields at the top level.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub message: Option<String>,

    /// Present on success.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS
    }

    /// Convert into the payload, mapping a missing success marker to `Failed`.
    pub fn into_result(self) -> Result<T, ApiError> {
        if self.is_success() {
            self.data.ok_or_else(|| {
                ApiError::Unexpected("status=success but data field is missing".to_owned())
            })
        } else {
            Err(failure(self.message))
        }
    }

    /// For endpoints whose success carries no payload; returns the server message.
    pub fn into_message(self) -> Result<Option<String>, ApiError> {
        if self.is_success() {
            Ok(self.message)
        } else {
            Err(failure(self.message))
        }
    }
}

pub(crate) fn failure(message: Option<String>) -> ApiError {
    ApiError::Failed(message.unwrap_or_else(|| "(no message)".to_owned()))
}

/// Response of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response of `POST /auth/profile-photo`.
#[derive(Debug, Deserialize)]
pub struct PhotoResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

/// Resolve a profile from any of the shapes the backend has been seen to
/// return: `data` first, then `user`, then the raw body.
pub fn extract_profile(body: &serde_json::Value) -> Option<UserProfile> {
    ["data", "user"]
        .iter()
        .filter_map(|key| body.get(key))
        .chain(std::iter::once(body))
        .find_map(|v| {
            serde_json::from_value::<UserProfile>(v.clone())
                .ok()
                .filter(UserProfile::is_valid)
        })
}

/// Pull a human-readable message out of an error body.
pub fn extract_message(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key)?.as_str().map(str::to_owned))
}

// ---------------------------------------------------------------------------
// LooseValue: numbers that may arrive as JSON numbers, numeric strings or
// booleans. Bool MUST come before Number in the untagged enum.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LooseValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl LooseValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LooseValue::Number(v) if v.is_finite() => Some(*v),
            LooseValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Integer part, so `"80.7"` reads as 80.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LooseValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| self.as_f64().map(|v| v.trunc() as i64)),
            _ => self.as_f64().map(|v| v.trunc() as i64),
        }
    }

    /// `true`, or any non-zero integer.
    pub fn as_flag(&self) -> bool {
        match self {
            LooseValue::Bool(v) => *v,
            _ => self.as_i64().is_some_and(|v| v != 0),
        }
    }
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseValue::deserialize(deserializer)? {
        LooseValue::Text(s) => Ok(s),
        LooseValue::Number(n) if n.fract() == 0.0 => Ok(format!("{}", n as i64)),
        other => Err(serde::de::Error::custom(format!("invalid user id: {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Sensor: GET /api/sensor?action=sensor|history
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SensorPayload {
    #[serde(default)]
    pub temp: Option<LooseValue>,
    #[serde(default)]
    pub humy: Option<LooseValue>,
    /// Only present on history rows.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl SensorPayload {
    /// Unparsable values read as zero.
    pub fn temperature(&self) -> f64 {
        self.temp.as_ref().and_then(LooseValue::as_f64).unwrap_or(0.0)
    }

    pub fn humidity(&self) -> i64 {
        self.humy.as_ref().and_then(LooseValue::as_i64).unwrap_or(0)
    }

    /// Chart point for a history row; rows without a parsable timestamp use `fallback`.
    pub fn to_point(&self, fallback: DateTime<Utc>) -> ChartPoint {
        ChartPoint {
            recorded_at: self
                .timestamp
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(fallback),
            temperature: self.temperature(),
            humidity: self.humidity(),
        }
    }
}

/// RFC 3339, or the backend's `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
}

// ---------------------------------------------------------------------------
// Actuators: GET /api/sensor?action=fan, PUT /api/sensor?action=control
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ActuatorPayload {
    #[serde(default)]
    pub fan1: Option<LooseValue>,
    #[serde(default)]
    pub lamp1: Option<LooseValue>,
}

impl From<&ActuatorPayload> for ActuatorState {
    fn from(p: &ActuatorPayload) -> Self {
        Self {
            fan: p.fan1.as_ref().is_some_and(LooseValue::as_flag),
            lamp: p.lamp1.as_ref().is_some_and(LooseValue::as_flag),
        }
    }
}

/// Body of the control request. Always carries the full actuator vector.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ControlRequest {
    pub room_id: u32,
    pub fan1: u8,
    pub lamp1: u8,
}

impl ControlRequest {
    pub fn new(room_id: u32, desired: ActuatorState) -> Self {
        Self {
            room_id,
            fan1: u8::from(desired.fan),
            lamp1: u8::from(desired.lamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings: GET /api/settings?room_id=
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub ideal_temp_min: Option<LooseValue>,
    #[serde(default)]
    pub ideal_temp_max: Option<LooseValue>,
    #[serde(default)]
    pub ideal_humy_min: Option<LooseValue>,
    #[serde(default)]
    pub ideal_humy_max: Option<LooseValue>,
}

impl From<&SettingsPayload> for IdealRange {
    fn from(p: &SettingsPayload) -> Self {
        IdealRange::from_loose(
            p.ideal_temp_min.as_ref(),
            p.ideal_temp_max.as_ref(),
            p.ideal_humy_min.as_ref(),
            p.ideal_humy_max.as_ref(),
        )
    }
}

// ---------------------------------------------------------------------------
// Rooms: GET /api/rooms, GET /api/dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Room {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<LooseValue>,
}

impl Room {
    /// Rooms without an explicit flag are active.
    pub fn active(&self) -> bool {
        self.is_active.as_ref().map_or(true, LooseValue::as_flag)
    }
}

/// One room's row on the overview dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomOverview {
    #[serde(alias = "id", deserialize_with = "deserialize_id")]
    pub room_id: String,
    #[serde(default, alias = "room_name")]
    pub name: String,
    #[serde(default)]
    pub temp: Option<LooseValue>,
    #[serde(default)]
    pub humy: Option<LooseValue>,
    #[serde(default)]
    pub fan1: Option<LooseValue>,
    #[serde(default)]
    pub lamp1: Option<LooseValue>,
}

/// Payload of the dashboard endpoint; older backends return a bare list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DashboardPayload {
    Rooms { rooms: Vec<RoomOverview> },
    List(Vec<RoomOverview>),
}

impl DashboardPayload {
    pub fn into_rooms(self) -> Vec<RoomOverview> {
        match self {
            DashboardPayload::Rooms { rooms } | DashboardPayload::List(rooms) => rooms,
        }
    }
}

// ---------------------------------------------------------------------------
// Auth requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Health: GET /api/test
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
