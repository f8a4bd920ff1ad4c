use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::frame::{frame_channel, FrameSlot, FrameSource};
use crate::jpeg::JpegSplitter;
use crate::CameraConfig;

const READ_CHUNK: usize = 16 * 1024;

/// The camera as the rest of the bridge sees it: either a running helper
/// feeding the frame slot, or a reason why there is none.
#[derive(Debug)]
pub enum Capture {
    Live(LiveCapture),
    Unavailable { reason: String },
}

#[derive(Debug)]
pub struct LiveCapture {
    program: String,
    child: Child,
    reader: JoinHandle<PumpStats>,
    source: FrameSource,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub bytes: u64,
    pub frames: u64,
    pub published: u64,
}

impl Capture {
    /// Start the capture helper. Must run inside a tokio runtime; the blocking
    /// reader is placed on the blocking pool.
    pub fn start(cfg: &CameraConfig) -> Self {
        if !cfg.enable {
            info!("camera: disabled in config");
            return Self::Unavailable { reason: "disabled in config".to_string() };
        }

        let helpers = cfg.helpers();
        for program in &helpers {
            match spawn_helper(program, cfg) {
                Ok(mut child) => {
                    let Some(stdout) = child.stdout.take() else {
                        let _ = child.kill();
                        return Self::Unavailable { reason: format!("{program}: no stdout pipe") };
                    };
                    let (slot, source) = frame_channel();
                    let reader = tokio::task::spawn_blocking(move || pump(stdout, slot));
                    info!(
                        "camera: {} started ({}x{} @ {}fps {})",
                        program, cfg.width, cfg.height, cfg.fps, cfg.codec
                    );
                    return Self::Live(LiveCapture { program: program.clone(), child, reader, source });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("camera: {} not found", program);
                }
                Err(e) => {
                    error!("camera: failed to start {}: {}", program, e);
                    log_hints();
                    return Self::Unavailable { reason: format!("{program}: {e}") };
                }
            }
        }

        warn!("camera: no capture helper found (tried {}); streaming disabled", helpers.join(", "));
        warn!("camera: install with: sudo apt install -y libcamera-apps");
        Self::Unavailable { reason: format!("no capture helper found (tried {})", helpers.join(", ")) }
    }

    pub fn source(&self) -> Option<FrameSource> {
        match self {
            Self::Live(live) => Some(live.source.clone()),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Live(live) if live.source.is_live() => format!("live ({})", live.program),
            Self::Live(live) => format!("stopped ({} exited)", live.program),
            Self::Unavailable { reason } => format!("unavailable: {reason}"),
        }
    }

    /// Kill the helper and wait for the reader to drain.
    pub async fn stop(self) {
        let Self::Live(live) = self else { return };
        let LiveCapture { program, mut child, reader, .. } = live;
        info!("camera: stopping {}", program);

        let reaped = tokio::task::spawn_blocking(move || {
            if let Err(e) = child.kill() {
                debug!("camera: kill: {}", e);
            }
            child.wait()
        })
        .await;
        match reaped {
            Ok(Ok(status)) => debug!("camera: helper exited: {}", status),
            Ok(Err(e)) => warn!("camera: wait for helper failed: {}", e),
            Err(e) => warn!("camera: reaper task failed: {}", e),
        }

        match reader.await {
            Ok(stats) => info!(
                "camera: stopped; read {} bytes, {} frames, {} published",
                stats.bytes, stats.frames, stats.published
            ),
            Err(e) => warn!("camera: reader task failed: {}", e),
        }
    }
}

fn spawn_helper(program: &str, cfg: &CameraConfig) -> io::Result<Child> {
    Command::new(program)
        .args(cfg.helper_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
}

fn log_hints() {
    error!("camera: troubleshooting:");
    error!("   1. stop other camera apps: pkill libcamera-vid; pkill rpicam-vid");
    error!("   2. check the camera is detected: rpicam-hello --list-cameras");
    error!("   3. install packages: sudo apt install -y libcamera-apps");
}

/// Blocking read loop: split the helper's output into frames and publish the
/// newest one of every read. Returns at end of input; dropping `slot` then
/// ends every stream.
pub fn pump(mut input: impl Read, mut slot: FrameSlot) -> PumpStats {
    let mut splitter = JpegSplitter::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut stats = PumpStats::default();

    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("camera: read failed: {}", e);
                break;
            }
        };
        stats.bytes += n as u64;

        let frames = splitter.push(&chunk[..n]);
        stats.frames += frames.len() as u64;
        if let Some(newest) = frames.into_iter().last() {
            if slot.publish(newest) {
                stats.published += 1;
            }
        }
    }

    info!("camera: capture stream ended after {} frames", stats.frames);
    stats
}
