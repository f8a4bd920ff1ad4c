use anyhow::Result;
use std::io;
use std::process::{Command, Stdio};

use crate::CameraConfig;

pub fn check_config(cfg: &CameraConfig) -> Result<()> {
    anyhow::ensure!(cfg.width > 0 && cfg.height > 0, "camera resolution must be non-zero");
    anyhow::ensure!(cfg.fps > 0 && cfg.fps <= 120, "camera.fps should be 1..120");
    anyhow::ensure!(cfg.codec == "mjpeg", "camera.codec must be \"mjpeg\" to be relayed");
    Ok(())
}

/// Name of the first capture helper that can be executed.
pub fn probe_helper(cfg: &CameraConfig) -> Result<String> {
    let helpers = cfg.helpers();
    for program in &helpers {
        let status = Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(_) => return Ok(program.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => anyhow::bail!("camera helper {} not runnable: {}", program, e),
        }
    }
    anyhow::bail!(
        "no camera helper found (tried {}); install with: sudo apt install -y libcamera-apps",
        helpers.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        check_config(&CameraConfig::default()).unwrap();
    }

    #[test]
    fn rejects_h264() {
        let cfg = CameraConfig { codec: "h264".into(), ..CameraConfig::default() };
        assert!(check_config(&cfg).is_err());
    }

    #[test]
    fn missing_helper_reported() {
        let cfg = CameraConfig { command: Some("rover-no-such-camera-helper".into()), ..CameraConfig::default() };
        let err = probe_helper(&cfg).unwrap_err();
        assert!(format!("{err}").contains("libcamera-apps"));
    }
}
