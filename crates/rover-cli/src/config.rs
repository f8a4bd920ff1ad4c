use anyhow::{Context, Result};
use rover_camera::CameraConfig;
use rover_drive::DriveConfig;
use rover_link::LinkConfig;
use rover_stream::StreamConfig;
use rover_tunnel::TunnelConfig;
use serde::Deserialize;
use std::path::Path;

/// Whole-bridge configuration. Every section and field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub link: LinkConfig,
    pub stream: StreamConfig,
    pub drive: DriveConfig,
    pub camera: CameraConfig,
    pub tunnel: TunnelConfig,
}

pub fn load(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    parse(&s)
}

pub fn parse(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}
