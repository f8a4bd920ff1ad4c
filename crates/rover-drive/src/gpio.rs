use anyhow::{Context, Result};
use rppal::gpio::{Gpio, OutputPin};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::backend::SignalBackend;

/// Raspberry Pi GPIO via `rppal`. Duty-cycle lines use rppal's software PWM,
/// which works on any line; the default wiring does not use the hardware PWM
/// channels.
pub struct GpioBackend {
    gpio: Gpio,
    lines: HashMap<u8, OutputPin>,
}

impl GpioBackend {
    pub fn open() -> Result<Self> {
        let gpio = Gpio::new().context("open GPIO peripheral")?;
        info!("gpio: opened GPIO peripheral");
        Ok(Self { gpio, lines: HashMap::new() })
    }

    fn line(&mut self, line: u8) -> Result<&mut OutputPin> {
        self.lines
            .get_mut(&line)
            .with_context(|| format!("line {} not claimed", line))
    }
}

impl SignalBackend for GpioBackend {
    fn name(&self) -> &'static str {
        "gpio"
    }

    fn is_physical(&self) -> bool {
        true
    }

    fn claim_output(&mut self, line: u8) -> Result<()> {
        let pin = self
            .gpio
            .get(line)
            .with_context(|| format!("claim GPIO {}", line))?
            .into_output_low();
        self.lines.insert(line, pin);
        Ok(())
    }

    fn write_level(&mut self, line: u8, high: bool) -> Result<()> {
        let pin = self.line(line)?;
        if high {
            pin.set_high();
        } else {
            pin.set_low();
        }
        Ok(())
    }

    fn write_duty(&mut self, line: u8, freq_hz: f64, percent: f64) -> Result<()> {
        let duty = (percent / 100.0).clamp(0.0, 1.0);
        self.line(line)?
            .set_pwm_frequency(freq_hz, duty)
            .with_context(|| format!("set PWM on GPIO {}", line))
    }

    fn release(&mut self, line: u8) -> Result<()> {
        if let Some(mut pin) = self.lines.remove(&line) {
            if let Err(e) = pin.clear_pwm() {
                warn!("gpio: clear PWM on {}: {}", line, e);
            }
            pin.set_low();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let claimed: Vec<u8> = self.lines.keys().copied().collect();
        for line in claimed {
            self.release(line)?;
        }
        info!("gpio: closed");
        Ok(())
    }
}
