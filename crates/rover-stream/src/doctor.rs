use anyhow::Result;

use crate::StreamConfig;

pub fn check_config(cfg: &StreamConfig) -> Result<()> {
    let b = &cfg.boundary;
    anyhow::ensure!(!b.is_empty() && b.len() <= 70, "stream.boundary must be 1..70 characters");
    anyhow::ensure!(
        b.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)),
        "stream.boundary may only contain letters, digits, '-', '_' and '.'"
    );
    anyhow::ensure!(cfg.frame_wait_ms >= 1 && cfg.frame_wait_ms <= 10_000, "stream.frame_wait_ms should be 1..10000");
    Ok(())
}
