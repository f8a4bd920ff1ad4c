use anyhow::Result;

use crate::{BackendChoice, DriveConfig};

pub fn check_pins(cfg: &DriveConfig) -> Result<()> {
    let dup = cfg.pins.duplicates();
    anyhow::ensure!(dup.is_empty(), "drive.pins: line(s) {:?} assigned more than once", dup);
    anyhow::ensure!(
        cfg.pins.lines().iter().all(|(_, pin)| *pin <= 27),
        "drive.pins: BCM line numbers must be 0..=27"
    );
    Ok(())
}

pub fn check_pwm(cfg: &DriveConfig) -> Result<()> {
    anyhow::ensure!(cfg.pwm_hz.is_finite() && cfg.pwm_hz > 0.0, "drive.pwm_hz must be > 0");
    anyhow::ensure!(cfg.pwm_hz <= 10_000.0, "drive.pwm_hz too high for software PWM");
    Ok(())
}

/// Whether the configured backend would drive real hardware.
pub fn check_backend(cfg: &DriveConfig) -> Result<()> {
    if cfg.backend == BackendChoice::Sim {
        anyhow::bail!("drive.backend=sim: hardware output disabled by config");
    }
    #[cfg(feature = "gpio")]
    {
        crate::gpio::GpioBackend::open().map(drop)
    }
    #[cfg(not(feature = "gpio"))]
    {
        anyhow::bail!("built without the `gpio` feature; actuators run in simulation mode")
    }
}
