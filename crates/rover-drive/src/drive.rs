use anyhow::{Context, Result};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::backend::{SignalBackend, SimulatedBackend};
use crate::pins::{Line, PinMap};
use crate::state::{clamp_percent, throttle_duty, ActuatorState, Gear};
use crate::{BackendChoice, DriveConfig};

const GEAR_LINES: [(Line, u8); 3] = [(Line::Gear1, 1), (Line::Gear2, 2), (Line::Gear3, 3)];

/// Actuator state plus the backend that turns it into signals.
///
/// Every setter updates the in-memory record first and then writes the line.
/// A failed write is logged; the record keeps the commanded value.
pub struct Drive {
    backend: Box<dyn SignalBackend>,
    pins: PinMap,
    pwm_hz: f64,
    state: ActuatorState,
    last_command_at: Option<OffsetDateTime>,
    closed: bool,
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive")
            .field("backend", &self.backend.name())
            .field("pwm_hz", &self.pwm_hz)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Point-in-time view for status reporting.
#[derive(Debug, Clone)]
pub struct DriveStatus {
    pub state: ActuatorState,
    pub backend: &'static str,
    pub physical: bool,
    pub last_command_at: Option<OffsetDateTime>,
}

impl Drive {
    /// Pick the backend once, according to `cfg.backend` and the compiled
    /// features. Never fails: anything short of working hardware ends up in
    /// simulation mode.
    pub fn open(cfg: &DriveConfig) -> Self {
        Self::with_backend(select_backend(cfg.backend), cfg)
    }

    pub fn with_backend(backend: Box<dyn SignalBackend>, cfg: &DriveConfig) -> Self {
        let mut drive = Self {
            backend,
            pins: cfg.pins.clone(),
            pwm_hz: cfg.pwm_hz,
            state: ActuatorState::default(),
            last_command_at: None,
            closed: false,
        };

        if let Err(e) = drive.init_lines() {
            error!("drive: failed to initialise {} backend: {:#}", drive.backend.name(), e);
            error!("  1. check /dev/gpiochip* permissions (user in the `gpio` group?)");
            error!("  2. stop other programs holding these lines");
            error!("  3. verify the [drive.pins] assignment matches the wiring");
            if let Err(e) = drive.backend.close() {
                warn!("drive: closing failed backend: {:#}", e);
            }
            drive.backend = Box::new(SimulatedBackend);
            let _ = drive.init_lines();
        }

        if drive.backend.is_physical() {
            info!("drive: {} backend ready ({} Hz PWM)", drive.backend.name(), drive.pwm_hz);
        } else {
            warn!("drive: running in SIMULATION mode (no hardware output)");
        }
        drive
    }

    fn init_lines(&mut self) -> Result<()> {
        for (line, pin) in self.pins.lines() {
            self.backend
                .claim_output(pin)
                .with_context(|| format!("claim line {} ({:?})", pin, line))?;
        }
        for (line, pin) in self.pins.lines() {
            if line.is_pwm() {
                self.backend.write_duty(pin, self.pwm_hz, 0.0)?;
            } else {
                self.backend.write_level(pin, line == Line::Gear1)?;
            }
        }
        Ok(())
    }

    pub fn state(&self) -> &ActuatorState {
        &self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn status(&self) -> DriveStatus {
        DriveStatus {
            state: self.state.clone(),
            backend: self.backend.name(),
            physical: self.backend.is_physical(),
            last_command_at: self.last_command_at,
        }
    }

    /// Stamp the time of the latest accepted client command.
    pub fn record_command(&mut self) {
        self.last_command_at = Some(OffsetDateTime::now_utc());
    }

    pub fn set_throttle_forward(&mut self, percent: f64) {
        let duty = throttle_duty(percent, self.state.gear);
        info!("drive: THROTTLE FORWARD {:.1}% (gear {}) duty {:.1}%", clamp_percent(percent), self.state.gear.get(), duty);
        self.set_duty(Line::ThrottleForward, duty);
    }

    pub fn set_throttle_backward(&mut self, percent: f64) {
        let duty = throttle_duty(percent, self.state.gear);
        info!("drive: THROTTLE BACKWARD {:.1}% (gear {}) duty {:.1}%", clamp_percent(percent), self.state.gear.get(), duty);
        self.set_duty(Line::ThrottleBackward, duty);
    }

    pub fn set_steering_right(&mut self, percent: f64) {
        let duty = clamp_percent(percent);
        info!("drive: STEERING RIGHT {:.1}%", duty);
        self.set_duty(Line::SteeringRight, duty);
    }

    pub fn set_steering_left(&mut self, percent: f64) {
        let duty = clamp_percent(percent);
        info!("drive: STEERING LEFT {:.1}%", duty);
        self.set_duty(Line::SteeringLeft, duty);
    }

    pub fn set_brake(&mut self, percent: f64) {
        let duty = clamp_percent(percent);
        info!("drive: BRAKE {:.1}%", duty);
        self.set_duty(Line::Brake, duty);
    }

    /// Returns false (and changes nothing) for gears outside 1..=3.
    pub fn set_gear(&mut self, gear: i64) -> bool {
        let Some(g) = Gear::new(gear) else {
            debug!("drive: ignoring gear {} (valid 1-3)", gear);
            return false;
        };
        self.state.gear = g;
        for (line, n) in GEAR_LINES {
            self.emit_level(line, g.get() == n);
        }
        info!("drive: GEAR {}", g.get());
        true
    }

    pub fn set_lights(&mut self, on: bool) {
        self.state.lights = on;
        self.emit_level(Line::Lights, on);
        info!("drive: LIGHTS {}", on_off(on));
    }

    pub fn set_auto_mode(&mut self, on: bool) {
        self.state.auto_mode = on;
        self.emit_level(Line::AutoMode, on);
        info!("drive: AUTO MODE {}", on_off(on));
    }

    pub fn set_horn(&mut self, on: bool) {
        self.state.horn = on;
        self.emit_level(Line::Horn, on);
        info!("drive: HORN {}", on_off(on));
    }

    /// Motion channels to rest and horn off. Lights, auto-mode and gear are
    /// left as they are.
    pub fn neutral(&mut self) {
        self.set_throttle_forward(0.0);
        self.set_throttle_backward(0.0);
        self.set_steering_right(0.0);
        self.set_steering_left(0.0);
        self.set_brake(0.0);
        self.set_horn(false);
    }

    /// De-energise every output and release the backend. Idempotent.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        info!("drive: shutting down {} backend", self.backend.name());
        self.neutral();
        self.set_lights(false);
        self.set_auto_mode(false);
        for (line, _) in GEAR_LINES {
            self.emit_level(line, false);
        }
        for (_, pin) in self.pins.lines() {
            if let Err(e) = self.backend.release(pin) {
                warn!("drive: release line {}: {:#}", pin, e);
            }
        }
        if let Err(e) = self.backend.close() {
            warn!("drive: close backend: {:#}", e);
        }
        self.closed = true;
    }

    fn set_duty(&mut self, line: Line, duty: f64) {
        let slot = match line {
            Line::ThrottleForward => &mut self.state.throttle_forward,
            Line::ThrottleBackward => &mut self.state.throttle_backward,
            Line::SteeringRight => &mut self.state.steering_right,
            Line::SteeringLeft => &mut self.state.steering_left,
            Line::Brake => &mut self.state.brake,
            _ => return,
        };
        *slot = duty;
        if self.closed {
            return;
        }
        let pin = self.pins.pin(line);
        if let Err(e) = self.backend.write_duty(pin, self.pwm_hz, duty) {
            warn!("drive: write duty {:.1}% to line {}: {:#}", duty, pin, e);
        }
    }

    fn emit_level(&mut self, line: Line, high: bool) {
        if self.closed {
            return;
        }
        let pin = self.pins.pin(line);
        if let Err(e) = self.backend.write_level(pin, high) {
            warn!("drive: write level to line {}: {:#}", pin, e);
        }
    }
}

impl Drop for Drive {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

fn select_backend(choice: BackendChoice) -> Box<dyn SignalBackend> {
    match choice {
        BackendChoice::Sim => Box::new(SimulatedBackend),
        BackendChoice::Auto | BackendChoice::Gpio => open_hardware(choice),
    }
}

#[cfg(feature = "gpio")]
fn open_hardware(_choice: BackendChoice) -> Box<dyn SignalBackend> {
    match crate::gpio::GpioBackend::open() {
        Ok(b) => Box::new(b),
        Err(e) => {
            warn!("drive: GPIO unavailable: {:#}", e);
            Box::new(SimulatedBackend)
        }
    }
}

#[cfg(not(feature = "gpio"))]
fn open_hardware(choice: BackendChoice) -> Box<dyn SignalBackend> {
    if choice == BackendChoice::Gpio {
        warn!("drive: backend=gpio but built without the `gpio` feature (rebuild with --features gpio)");
    }
    Box::new(SimulatedBackend)
}

/// Shared, lock-guarded [`Drive`]. All mutation goes through one lock, so
/// concurrent clients are serialised with last-write-wins.
#[derive(Clone)]
pub struct DriveHandle {
    inner: Arc<Mutex<Drive>>,
}

impl fmt::Debug for DriveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveHandle").finish_non_exhaustive()
    }
}

impl DriveHandle {
    pub fn new(drive: Drive) -> Self {
        Self { inner: Arc::new(Mutex::new(drive)) }
    }

    /// Run `f` with the drive locked. A poisoned lock is recovered so that
    /// resets and shutdown always get through.
    pub fn with<R>(&self, f: impl FnOnce(&mut Drive) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn state(&self) -> ActuatorState {
        self.with(|d| d.state().clone())
    }

    pub fn status(&self) -> DriveStatus {
        self.with(|d| d.status())
    }

    pub fn neutral(&self) {
        self.with(Drive::neutral)
    }

    pub fn shutdown(&self) {
        self.with(Drive::shutdown)
    }
}
