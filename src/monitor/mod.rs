pub mod command;
pub mod rolling;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    error::ApiError,
    models::{Actuator, ActuatorState, ChartPoint, IdealRange, SensorData},
};

use self::{
    command::ActuatorCommand,
    rolling::{RollingSeries, SERIES_CAPACITY},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Everything a room view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    pub room_id: u32,
    pub data: SensorData,
    pub series: RollingSeries,
    pub settings: IdealRange,
    /// Set once the backend has reported the actuator vector.
    pub actuators_known: bool,
    /// User-visible message from the last failed reading fetch.
    pub error: Option<String>,
}

impl MonitorState {
    pub fn new(room_id: u32) -> Self {
        Self {
            room_id,
            data: SensorData::default(),
            series: RollingSeries::new(),
            settings: IdealRange::default(),
            actuators_known: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// Fill the chart from the history endpoint before the first poll.
    pub seed_history: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            seed_history: false,
        }
    }
}

/// Polls one room's readings and actuator state into a watchable [`MonitorState`].
#[derive(Debug, Clone)]
pub struct SensorMonitor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    client: ApiClient,
    room_id: u32,
    options: MonitorOptions,
    state: watch::Sender<MonitorState>,
}

impl SensorMonitor {
    pub fn new(client: ApiClient, room_id: u32, options: MonitorOptions) -> Self {
        let (state, _) = watch::channel(MonitorState::new(room_id));
        Self {
            inner: Arc::new(Inner {
                client,
                room_id,
                options,
                state,
            }),
        }
    }

    pub fn room_id(&self) -> u32 {
        self.inner.room_id
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> MonitorState {
        self.inner.state.borrow().clone()
    }

    /// Fetch the ideal range once. Failures keep the defaults.
    pub async fn load_settings(&self) {
        match self.inner.client.room_settings(self.inner.room_id).await {
            Ok(settings) => self.inner.state.send_modify(|s| s.settings = settings),
            Err(ApiError::Unauthorized) => {}
            Err(e) => {
                warn!(room_id = self.inner.room_id, error = %e, "Failed to fetch room settings; using defaults")
            }
        }
    }

    /// Replace the chart with the backend's recent history.
    pub async fn load_history(&self) {
        let room_id = self.inner.room_id;
        match self.inner.client.reading_history(room_id, SERIES_CAPACITY).await {
            Ok(rows) => {
                let now = Utc::now();
                let points: Vec<ChartPoint> =
                    rows.iter().rev().map(|row| row.to_point(now)).collect();
                debug!(room_id, points = points.len(), "Chart seeded from history");
                self.inner.state.send_modify(|s| s.series.replace(points));
            }
            Err(ApiError::Unauthorized) => {}
            Err(e) => warn!(room_id, error = %e, "Failed to fetch reading history"),
        }
    }

    /// One scheduler tick: fetch the reading and actuator status together and
    /// apply both in a single state update.
    pub async fn poll_once(&self) {
        let client = &self.inner.client;
        let room_id = self.inner.room_id;
        let (reading, actuators) = tokio::join!(
            client.latest_reading(room_id),
            client.actuator_status(room_id)
        );

        let error = match &reading {
            Ok(_) | Err(ApiError::Unauthorized) => None,
            Err(e @ (ApiError::Failed(_) | ApiError::Unexpected(_))) => {
                warn!(room_id, error = %e, "Backend returned no sensor data");
                None
            }
            Err(e) => {
                warn!(room_id, error = %e, "Failed to fetch sensor data");
                Some(format!("Failed to fetch sensor data: {e}"))
            }
        };
        if let Err(e) = &actuators {
            if !e.is_unauthorized() {
                warn!(room_id, error = %e, "Failed to fetch actuator status");
            }
        }

        let now = Utc::now();
        self.inner.state.send_modify(|s| {
            if let Ok(payload) = &reading {
                s.data.temperature = payload.temperature();
                s.data.humidity = payload.humidity();
                s.data.last_update = now;
                s.series.push(ChartPoint {
                    recorded_at: now,
                    temperature: s.data.temperature,
                    humidity: s.data.humidity,
                });
                s.error = None;
            } else if error.is_some() {
                s.error = error;
            }
            if let Ok(state) = actuators {
                s.data.actuators = state;
                s.actuators_known = true;
            }
        });
    }

    /// Flip `actuator` locally, then ask the backend to apply the full vector.
    ///
    /// The other actuator's value is sent as-is, so the vector is fetched first
    /// when no poll has reported it yet. On failure the local value is restored
    /// and the error returned; the next poll reconciles anything else with the
    /// backend.
    pub async fn toggle(&self, actuator: Actuator) -> Result<ActuatorState, ApiError> {
        let room_id = self.inner.room_id;
        let known = self.inner.state.borrow().actuators_known;
        if !known {
            let current = self.inner.client.actuator_status(room_id).await?;
            self.inner.state.send_modify(|s| {
                s.data.actuators = current;
                s.actuators_known = true;
            });
        }
        let mut command = ActuatorCommand::toggle(actuator, ActuatorState::default());
        self.inner.state.send_modify(|s| {
            command = ActuatorCommand::toggle(actuator, s.data.actuators);
            command.apply(&mut s.data.actuators);
        });
        info!(
            room_id,
            actuator = %actuator,
            on = command.desired.get(actuator),
            "Sending actuator command"
        );

        match self
            .inner
            .client
            .control_actuators(room_id, command.desired)
            .await
        {
            Ok(()) => Ok(command.desired),
            Err(e) => {
                warn!(room_id, actuator = %actuator, error = %e, "Actuator command failed; reverting");
                self.inner
                    .state
                    .send_modify(|s| command.revert(&mut s.data.actuators));
                Err(e)
            }
        }
    }

    /// Start polling. Dropping or unmounting the handle stops it.
    pub fn mount(&self) -> MonitorHandle {
        let task = tokio::spawn(self.clone().run());
        MonitorHandle {
            monitor: self.clone(),
            task,
        }
    }

    async fn run(self) {
        let interval = self.inner.options.interval;
        info!(
            room_id = self.inner.room_id,
            interval_ms = interval.as_millis() as u64,
            "Sensor polling started"
        );

        self.load_settings().await;
        if self.inner.options.seed_history {
            self.load_history().await;
        }

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }
}

/// Owns the polling task of a mounted [`SensorMonitor`].
#[derive(Debug)]
pub struct MonitorHandle {
    monitor: SensorMonitor,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn monitor(&self) -> &SensorMonitor {
        &self.monitor
    }

    pub fn unmount(self) {}
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
        info!(room_id = self.monitor.room_id(), "Sensor polling stopped");
    }
}
