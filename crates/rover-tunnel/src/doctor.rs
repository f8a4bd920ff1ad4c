use anyhow::Result;
use std::io;
use std::process::{Command, Stdio};

use crate::TunnelConfig;

pub fn check_config(cfg: &TunnelConfig) -> Result<()> {
    anyhow::ensure!(!cfg.binary.trim().is_empty(), "tunnel.binary is empty");
    anyhow::ensure!(cfg.api_url.starts_with("http://"), "tunnel.api_url must be a local http:// url");
    anyhow::ensure!(cfg.warmup_s <= 60, "tunnel.warmup_s should be 0..60");
    Ok(())
}

pub fn probe_binary(cfg: &TunnelConfig) -> Result<()> {
    let status = Command::new(&cfg.binary)
        .arg("version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            anyhow::bail!("{} not installed; install from https://ngrok.com/download", cfg.binary)
        }
        Err(e) => anyhow::bail!("{} not runnable: {}", cfg.binary, e),
    }
}
