pub mod capture;
pub mod doctor;
pub mod frame;
pub mod jpeg;

use serde::Deserialize;

pub use capture::Capture;
pub use frame::{frame_channel, FeedEvent, Frame, FrameFeed, FrameSlot, FrameSource};

/// Helpers tried in order when `command` is not set.
pub const DEFAULT_HELPERS: [&str; 2] = ["rpicam-vid", "libcamera-vid"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub enable: bool,

    /// Capture helper to run instead of the defaults.
    pub command: Option<String>,

    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Only "mjpeg" can be relayed.
    pub codec: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            enable: true,
            command: None,
            width: 640,
            height: 480,
            fps: 30,
            codec: "mjpeg".to_string(),
        }
    }
}

impl CameraConfig {
    pub fn helpers(&self) -> Vec<String> {
        match &self.command {
            Some(cmd) => vec![cmd.clone()],
            None => DEFAULT_HELPERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn helper_args(&self) -> Vec<String> {
        vec![
            "-t".into(), "0".into(),
            "--width".into(), self.width.to_string(),
            "--height".into(), self.height.to_string(),
            "--framerate".into(), self.fps.to_string(),
            "--codec".into(), self.codec.clone(),
            "--inline".into(),
            "-o".into(), "-".into(),
            "--nopreview".into(),
        ]
    }
}
