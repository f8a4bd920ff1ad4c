//! Command channel: a WebSocket endpoint whose inbound JSON messages are
//! decoded and applied to the shared [`rover_drive::DriveHandle`].
//! Nothing is ever sent back to the client except protocol pings and close.

pub mod clients;
pub mod dispatch;
pub mod server;

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub use clients::ClientSet;
pub use server::LinkServer;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub bind: SocketAddr,

    /// Seconds between liveness pings.
    pub ping_interval_s: u64,

    /// Seconds to wait for the pong before dropping the peer.
    pub ping_timeout_s: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8765)),
            ping_interval_s: 20,
            ping_timeout_s: 20,
        }
    }
}

impl LinkConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_s.max(1))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_s.max(1))
    }
}
