use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::models::LooseValue;

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// Profile of the logged-in user, as mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The backend sends numeric ids; they are kept as text.
    #[serde(deserialize_with = "crate::api::models::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Server path, bare file name, absolute URL, or a local file path after
    /// an offline photo change.
    #[serde(default)]
    pub profile_photo: Option<String>,
}

impl UserProfile {
    /// A profile without an id or username cannot identify a session.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.username.trim().is_empty()
    }

    /// Merge non-empty fields of `changes` into this profile.
    pub fn apply(&mut self, changes: &ProfileChanges) {
        if let Some(name) = changes.name.as_ref().filter(|v| !v.is_empty()) {
            self.name = name.clone();
        }
        if let Some(email) = changes.email.as_ref().filter(|v| !v.is_empty()) {
            self.email = email.clone();
        }
        if let Some(username) = changes.username.as_ref().filter(|v| !v.is_empty()) {
            self.username = username.clone();
        }
    }
}

/// Editable profile fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Fan,
    Lamp,
}

impl Actuator {
    /// Field name used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Actuator::Fan => "fan1",
            Actuator::Lamp => "lamp1",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Actuator::Fan => "fan",
            Actuator::Lamp => "lamp",
        })
    }
}

impl std::str::FromStr for Actuator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "fan" | "fan1" => Ok(Self::Fan),
            "lamp" | "lamp1" => Ok(Self::Lamp),
            other => Err(anyhow::anyhow!("unknown actuator: {other:?}")),
        }
    }
}

/// Full on/off vector of a room's actuators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorState {
    pub fan: bool,
    pub lamp: bool,
}

impl ActuatorState {
    pub fn get(&self, actuator: Actuator) -> bool {
        match actuator {
            Actuator::Fan => self.fan,
            Actuator::Lamp => self.lamp,
        }
    }

    pub fn set(&mut self, actuator: Actuator, on: bool) {
        match actuator {
            Actuator::Fan => self.fan = on,
            Actuator::Lamp => self.lamp = on,
        }
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Latest values shown on the room cards.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorData {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: i64,
    pub actuators: ActuatorState,
    /// Client-side time of the last successful reading.
    pub last_update: DateTime<Utc>,
}

impl Default for SensorData {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            humidity: 0,
            actuators: ActuatorState::default(),
            last_update: Utc::now(),
        }
    }
}

/// One point of the chart series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub recorded_at: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: i64,
}

// ---------------------------------------------------------------------------
// Ideal range
// ---------------------------------------------------------------------------

/// Acceptable band per metric, used only for status classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealRange {
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity_min: i64,
    pub humidity_max: i64,
}

impl Default for IdealRange {
    fn default() -> Self {
        Self {
            temp_min: 21.0,
            temp_max: 27.0,
            humidity_min: 60,
            humidity_max: 70,
        }
    }
}

impl IdealRange {
    /// Build from loosely typed fields, falling back to the default per field.
    pub fn from_loose(
        temp_min: Option<&LooseValue>,
        temp_max: Option<&LooseValue>,
        humidity_min: Option<&LooseValue>,
        humidity_max: Option<&LooseValue>,
    ) -> Self {
        let d = Self::default();
        Self {
            temp_min: temp_min.and_then(LooseValue::as_f64).unwrap_or(d.temp_min),
            temp_max: temp_max.and_then(LooseValue::as_f64).unwrap_or(d.temp_max),
            humidity_min: humidity_min.and_then(LooseValue::as_i64).unwrap_or(d.humidity_min),
            humidity_max: humidity_max.and_then(LooseValue::as_i64).unwrap_or(d.humidity_max),
        }
    }
}
