pub mod backend;
pub mod doctor;
pub mod drive;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod pins;
pub mod state;

use serde::Deserialize;

pub use backend::{SignalBackend, SimulatedBackend};
pub use drive::{Drive, DriveHandle, DriveStatus};
pub use pins::{Line, PinMap};
pub use state::{ActuatorState, Gear};

/// Reference PWM frequency for the duty-cycle lines.
pub const DEFAULT_PWM_HZ: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// GPIO when compiled in and it opens, simulation otherwise.
    #[default]
    Auto,
    Gpio,
    Sim,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub backend: BackendChoice,

    /// Frequency of the five duty-cycle lines.
    pub pwm_hz: f64,

    pub pins: PinMap,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            pwm_hz: DEFAULT_PWM_HZ,
            pins: PinMap::default(),
        }
    }
}
