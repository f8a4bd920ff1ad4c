//! Reachability announcer: starts the tunnel sidecar for the command port and
//! asks its local management API for the public hostname. Best-effort; every
//! failure becomes a [`Reachability::Unavailable`] value.

pub mod doctor;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

const API_TIMEOUT: Duration = Duration::from_secs(2);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    pub enable: bool,
    pub binary: String,

    /// Management API listing the active tunnels.
    pub api_url: String,

    /// Seconds to let the sidecar come up before the single API query.
    pub warmup_s: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enable: true,
            binary: "ngrok".to_string(),
            api_url: "http://127.0.0.1:4040/api/tunnels".to_string(),
            warmup_s: 3,
        }
    }
}

impl TunnelConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    Pending,
    Disabled,
    Active { hostname: String },
    Unavailable { reason: String },
}

impl Reachability {
    pub fn hostname(&self) -> Option<&str> {
        match self {
            Self::Active { hostname } => Some(hostname),
            _ => None,
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("starting"),
            Self::Disabled => f.write_str("disabled"),
            Self::Active { hostname } => write!(f, "active: {hostname}"),
            Self::Unavailable { reason } => write!(f, "unavailable: {reason}"),
        }
    }
}

/// The running tunnel process. Killed when dropped.
#[derive(Debug)]
pub struct Sidecar {
    binary: String,
    child: Child,
}

impl Sidecar {
    pub fn start(cfg: &TunnelConfig, port: u16) -> io::Result<Self> {
        let child = Command::new(&cfg.binary)
            .args(["http", &port.to_string(), "--host-header=rewrite"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!("tunnel: started {} for port {}", cfg.binary, port);
        Ok(Self { binary: cfg.binary.clone(), child })
    }

    /// Exit status if the sidecar has already quit.
    pub fn exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    pub async fn stop(mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("tunnel: kill {}: {}", self.binary, e);
        }
        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!("tunnel: {} stopped ({})", self.binary, status),
            Ok(Err(e)) => warn!("tunnel: waiting for {} failed: {}", self.binary, e),
            Err(_) => warn!("tunnel: {} did not exit within {:?}", self.binary, STOP_TIMEOUT),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelEntry>,
}

#[derive(Debug, Deserialize)]
struct TunnelEntry {
    public_url: String,
}

/// Hostname of the first tunnel the management API lists.
pub async fn query_endpoint(api_url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder().timeout(timeout).build().context("build http client")?;
    let resp = client
        .get(api_url)
        .send()
        .await
        .with_context(|| format!("query tunnel api {api_url}"))?;
    anyhow::ensure!(resp.status().is_success(), "tunnel api returned {}", resp.status());

    let list: TunnelList = resp.json().await.context("parse tunnel list")?;
    let first = list.tunnels.into_iter().next().context("no tunnel present")?;
    Ok(strip_scheme(&first.public_url).to_string())
}

pub fn strip_scheme(url: &str) -> &str {
    ["https://", "http://", "tcp://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .unwrap_or(url)
}

/// Start the sidecar pointed at `port`, wait out the warm-up and query the
/// hostname once. The sidecar is returned whenever it started, even if the
/// query failed.
pub async fn announce(cfg: &TunnelConfig, port: u16) -> (Option<Sidecar>, Reachability) {
    if !cfg.enable {
        info!("tunnel: disabled in config");
        return (None, Reachability::Disabled);
    }

    let mut sidecar = match Sidecar::start(cfg, port) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("tunnel: {} not installed; install from https://ngrok.com/download", cfg.binary);
            return (None, Reachability::Unavailable { reason: format!("{} not installed", cfg.binary) });
        }
        Err(e) => {
            warn!("tunnel: failed to start {}: {}", cfg.binary, e);
            return (None, Reachability::Unavailable { reason: format!("failed to start {}: {e}", cfg.binary) });
        }
    };

    tokio::time::sleep(cfg.warmup()).await;

    if let Some(status) = sidecar.exited() {
        warn!("tunnel: {} exited during warm-up ({})", cfg.binary, status);
        return (None, Reachability::Unavailable { reason: format!("{} exited: {status}", cfg.binary) });
    }

    match query_endpoint(&cfg.api_url, API_TIMEOUT).await {
        Ok(hostname) => {
            info!("tunnel: active: {}", hostname);
            (Some(sidecar), Reachability::Active { hostname })
        }
        Err(e) => {
            warn!("tunnel: could not get public hostname: {:#}", e);
            (Some(sidecar), Reachability::Unavailable { reason: format!("{e:#}") })
        }
    }
}
