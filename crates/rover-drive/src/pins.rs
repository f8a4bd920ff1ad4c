use serde::Deserialize;

/// Physical output lines of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    ThrottleForward,
    ThrottleBackward,
    SteeringRight,
    SteeringLeft,
    Lights,
    AutoMode,
    Brake,
    Horn,
    Gear1,
    Gear2,
    Gear3,
}

impl Line {
    /// Whether the line carries a duty-cycle signal rather than a plain level.
    pub fn is_pwm(self) -> bool {
        matches!(
            self,
            Line::ThrottleForward | Line::ThrottleBackward | Line::SteeringRight | Line::SteeringLeft | Line::Brake
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Line::ThrottleForward => "Throttle Forward PWM (0-100%)",
            Line::ThrottleBackward => "Throttle Backward PWM (0-100%)",
            Line::SteeringRight => "Steering Right PWM (0-100%)",
            Line::SteeringLeft => "Steering Left PWM (0-100%)",
            Line::Lights => "Lights (on/off)",
            Line::AutoMode => "Auto Mode (on/off)",
            Line::Brake => "Brake PWM (0-100%)",
            Line::Horn => "Horn (on while pressed)",
            Line::Gear1 => "Gear 1 (on when selected)",
            Line::Gear2 => "Gear 2 (on when selected)",
            Line::Gear3 => "Gear 3 (on when selected)",
        }
    }
}

/// BCM line numbers for each output. Defaults match the reference wiring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinMap {
    pub throttle_forward: u8,
    pub throttle_backward: u8,
    pub steering_right: u8,
    pub steering_left: u8,
    pub lights: u8,
    pub auto_mode: u8,
    pub brake: u8,
    pub horn: u8,
    pub gear_1: u8,
    pub gear_2: u8,
    pub gear_3: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            throttle_forward: 18,
            throttle_backward: 19,
            steering_right: 20,
            steering_left: 21,
            lights: 17,
            auto_mode: 27,
            brake: 22,
            horn: 23,
            gear_1: 24,
            gear_2: 25,
            gear_3: 26,
        }
    }
}

impl PinMap {
    pub fn pin(&self, line: Line) -> u8 {
        match line {
            Line::ThrottleForward => self.throttle_forward,
            Line::ThrottleBackward => self.throttle_backward,
            Line::SteeringRight => self.steering_right,
            Line::SteeringLeft => self.steering_left,
            Line::Lights => self.lights,
            Line::AutoMode => self.auto_mode,
            Line::Brake => self.brake,
            Line::Horn => self.horn,
            Line::Gear1 => self.gear_1,
            Line::Gear2 => self.gear_2,
            Line::Gear3 => self.gear_3,
        }
    }

    /// All lines in wiring-table order.
    pub fn lines(&self) -> [(Line, u8); 11] {
        [
            Line::ThrottleForward,
            Line::ThrottleBackward,
            Line::SteeringRight,
            Line::SteeringLeft,
            Line::Lights,
            Line::AutoMode,
            Line::Brake,
            Line::Horn,
            Line::Gear1,
            Line::Gear2,
            Line::Gear3,
        ]
        .map(|l| (l, self.pin(l)))
    }

    /// Pin numbers assigned to more than one line.
    pub fn duplicates(&self) -> Vec<u8> {
        let mut seen = Vec::new();
        let mut dup = Vec::new();
        for (_, pin) in self.lines() {
            if seen.contains(&pin) {
                if !dup.contains(&pin) {
                    dup.push(pin);
                }
            } else {
                seen.push(pin);
            }
        }
        dup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_wiring_is_distinct() {
        let map = PinMap::default();
        assert!(map.duplicates().is_empty());
        assert_eq!(map.pin(Line::ThrottleForward), 18);
        assert_eq!(map.pin(Line::Gear3), 26);
    }

    #[test]
    fn five_pwm_lines() {
        let n = PinMap::default().lines().iter().filter(|(l, _)| l.is_pwm()).count();
        assert_eq!(n, 5);
    }

    #[test]
    fn duplicates_reported_once() {
        let map = PinMap { horn: 17, gear_1: 17, ..PinMap::default() };
        assert_eq!(map.duplicates(), vec![17]);
    }
}
