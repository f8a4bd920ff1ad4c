use anyhow::Result;
use tracing::debug;

/// Signal generator driving the physical output lines.
///
/// Opening happens in the implementation's constructor. Line numbers are the
/// backend's own numbering (BCM for the GPIO backend).
pub trait SignalBackend: Send {
    fn name(&self) -> &'static str;

    /// Whether writes reach real hardware.
    fn is_physical(&self) -> bool;

    fn claim_output(&mut self, line: u8) -> Result<()>;

    fn write_level(&mut self, line: u8, high: bool) -> Result<()>;

    /// `percent` is 0..=100.
    fn write_duty(&mut self, line: u8, freq_hz: f64, percent: f64) -> Result<()>;

    fn release(&mut self, line: u8) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Backend used off-device: every write is accepted and logged.
#[derive(Debug, Default)]
pub struct SimulatedBackend;

impl SignalBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn is_physical(&self) -> bool {
        false
    }

    fn claim_output(&mut self, line: u8) -> Result<()> {
        debug!("sim: claim line {}", line);
        Ok(())
    }

    fn write_level(&mut self, line: u8, high: bool) -> Result<()> {
        debug!("sim: line {} -> {}", line, if high { "high" } else { "low" });
        Ok(())
    }

    fn write_duty(&mut self, line: u8, freq_hz: f64, percent: f64) -> Result<()> {
        debug!("sim: line {} duty {:.1}% @ {}Hz", line, percent, freq_hz);
        Ok(())
    }

    fn release(&mut self, line: u8) -> Result<()> {
        debug!("sim: release line {}", line);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        debug!("sim: close");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::SignalBackend;
    use anyhow::Result;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Op {
        Claim(u8),
        Level(u8, bool),
        Duty(u8, f64, f64),
        Release(u8),
        Close,
    }

    /// Records every call; optionally refuses to claim one line.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingBackend {
        pub ops: Arc<Mutex<Vec<Op>>>,
        pub refuse_claim: Option<u8>,
    }

    impl RecordingBackend {
        pub fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.ops.lock().unwrap().clear();
        }

        /// Last level written per line.
        pub fn levels(&self) -> HashMap<u8, bool> {
            let mut out = HashMap::new();
            for op in self.ops() {
                if let Op::Level(l, v) = op {
                    out.insert(l, v);
                }
            }
            out
        }

        /// Last duty written per line.
        pub fn duties(&self) -> HashMap<u8, f64> {
            let mut out = HashMap::new();
            for op in self.ops() {
                if let Op::Duty(l, _, d) = op {
                    out.insert(l, d);
                }
            }
            out
        }
    }

    impl SignalBackend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_physical(&self) -> bool {
            true
        }

        fn claim_output(&mut self, line: u8) -> Result<()> {
            if self.refuse_claim == Some(line) {
                anyhow::bail!("line {} busy", line);
            }
            self.ops.lock().unwrap().push(Op::Claim(line));
            Ok(())
        }

        fn write_level(&mut self, line: u8, high: bool) -> Result<()> {
            self.ops.lock().unwrap().push(Op::Level(line, high));
            Ok(())
        }

        fn write_duty(&mut self, line: u8, freq_hz: f64, percent: f64) -> Result<()> {
            self.ops.lock().unwrap().push(Op::Duty(line, freq_hz, percent));
            Ok(())
        }

        fn release(&mut self, line: u8) -> Result<()> {
            self.ops.lock().unwrap().push(Op::Release(line));
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.ops.lock().unwrap().push(Op::Close);
            Ok(())
        }
    }
}
