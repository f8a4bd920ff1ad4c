use serde::Serialize;

/// Discrete throttle multiplier stage, always 1, 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gear(u8);

impl Gear {
    pub const FIRST: Gear = Gear(1);
    pub const TOP: Gear = Gear(3);

    /// `None` for anything outside 1..=3.
    pub fn new(n: i64) -> Option<Self> {
        (1..=3).contains(&n).then(|| Gear(n as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Fraction of the commanded throttle that reaches the line.
    pub fn scale(self) -> f64 {
        f64::from(self.0) / f64::from(Self::TOP.0)
    }
}

impl Default for Gear {
    fn default() -> Self {
        Gear::FIRST
    }
}

/// Clamp a commanded percentage into [0, 100]. Non-finite input is 0.
pub fn clamp_percent(p: f64) -> f64 {
    if p.is_finite() {
        p.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Duty cycle (percent) emitted for a throttle command in the given gear.
pub fn throttle_duty(percent: f64, gear: Gear) -> f64 {
    clamp_percent(percent) * gear.scale()
}

/// Commanded level of every output. Percent fields hold the emitted duty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuatorState {
    pub throttle_forward: f64,
    pub throttle_backward: f64,
    pub steering_right: f64,
    pub steering_left: f64,
    pub brake: f64,
    pub lights: bool,
    pub auto_mode: bool,
    pub horn: bool,
    pub gear: Gear,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self {
            throttle_forward: 0.0,
            throttle_backward: 0.0,
            steering_right: 0.0,
            steering_left: 0.0,
            brake: 0.0,
            lights: false,
            auto_mode: false,
            horn: false,
            gear: Gear::FIRST,
        }
    }
}

impl ActuatorState {
    /// True when every motion channel is at rest. Lights, auto-mode and gear
    /// are not motion channels.
    pub fn is_neutral(&self) -> bool {
        self.throttle_forward == 0.0
            && self.throttle_backward == 0.0
            && self.steering_right == 0.0
            && self.steering_left == 0.0
            && self.brake == 0.0
            && !self.horn
    }
}
