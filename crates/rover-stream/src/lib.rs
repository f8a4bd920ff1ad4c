//! HTTP surface of the frame relay: a status page at `/` and the live
//! multipart JPEG stream at `/?action=stream`.

pub mod doctor;
pub mod multipart;
pub mod status;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rover_camera::FrameSource;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::multipart::Relay;
pub use crate::status::StatusReport;

pub const UNAVAILABLE_TEXT: &str =
    "Camera not available. Make sure the camera is connected and not used by other apps.";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub bind: SocketAddr,

    /// Upper bound on one wait for a new frame.
    pub frame_wait_ms: u64,

    pub boundary: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            frame_wait_ms: 100,
            boundary: "FRAME".to_string(),
        }
    }
}

impl StreamConfig {
    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms.max(1))
    }
}

/// Everything the handlers need, injected once at startup.
#[derive(Clone)]
pub struct StreamState {
    pub(crate) frames: Option<FrameSource>,
    pub(crate) report: Arc<dyn StatusReport>,
    pub(crate) cfg: Arc<StreamConfig>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) viewers: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl StreamState {
    pub fn new(
        cfg: StreamConfig,
        frames: Option<FrameSource>,
        report: Arc<dyn StatusReport>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            frames,
            report,
            cfg: Arc::new(cfg),
            shutdown,
            viewers: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Streaming clients currently attached.
    pub fn viewers(&self) -> usize {
        self.viewers.load(Ordering::Relaxed)
    }

    pub(crate) fn camera_live(&self) -> Option<&FrameSource> {
        self.frames.as_ref().filter(|f| f.is_live())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RootQuery {
    action: Option<String>,
}

pub fn router(state: StreamState) -> Router {
    Router::new().route("/", get(root)).with_state(state)
}

/// Serve until the state's shutdown token fires. Open streams end on the
/// same token so draining never waits on a viewer.
pub async fn serve(listener: TcpListener, state: StreamState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    info!("stream: listening on {}", listener.local_addr().context("stream local addr")?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("stream server")
}

async fn root(State(state): State<StreamState>, Query(q): Query<RootQuery>) -> Response {
    match q.action.as_deref() {
        Some("stream") => stream(state),
        _ => status::page(&state).into_response(),
    }
}

fn stream(state: StreamState) -> Response {
    let Some(source) = state.camera_live() else {
        warn!("stream: requested but camera not available");
        return (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_TEXT).into_response();
    };

    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    let relay = Relay::new(
        id,
        source.subscribe(),
        state.cfg.boundary.clone(),
        state.cfg.frame_wait(),
        state.shutdown.clone(),
        state.viewers.clone(),
    );
    info!("stream {}: client started ({} watching)", id, state.viewers());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format!("multipart/x-mixed-replace; boundary={}", state.cfg.boundary))
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "close")
        .body(Body::from_stream(relay.into_stream()))
        .unwrap_or_else(|e| {
            error!("stream {}: building response failed: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}
