use crate::models::{Actuator, ActuatorState};

/// An optimistic actuator change: applied locally before the control request
/// is sent, reverted with [`revert`](Self::revert) if the request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommand {
    pub actuator: Actuator,
    /// Value of `actuator` before the command.
    pub previous: bool,
    /// Full vector to send to the backend.
    pub desired: ActuatorState,
}

impl ActuatorCommand {
    /// Flip `actuator` relative to `current`.
    pub fn toggle(actuator: Actuator, current: ActuatorState) -> Self {
        let previous = current.get(actuator);
        let mut desired = current;
        desired.set(actuator, !previous);
        Self {
            actuator,
            previous,
            desired,
        }
    }

    pub fn apply(&self, state: &mut ActuatorState) {
        state.set(self.actuator, self.desired.get(self.actuator));
    }

    /// Restore the recorded previous value. Other actuators are left alone,
    /// since a poll may have updated them meanwhile.
    pub fn revert(&self, state: &mut ActuatorState) {
        state.set(self.actuator, self.previous);
    }
}
