use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rover_drive::DriveHandle;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::ClientSet;
use crate::{dispatch, LinkConfig};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept loop for the command channel. Any origin is accepted.
pub struct LinkServer {
    listener: TcpListener,
    session: Session,
}

#[derive(Clone)]
struct Session {
    drive: DriveHandle,
    clients: ClientSet,
    ping_interval: Duration,
    ping_timeout: Duration,
}

impl LinkServer {
    pub async fn bind(cfg: &LinkConfig, drive: DriveHandle, clients: ClientSet) -> Result<Self> {
        let listener = TcpListener::bind(cfg.bind)
            .await
            .with_context(|| format!("bind command channel on {}", cfg.bind))?;
        Ok(Self {
            listener,
            session: Session {
                drive,
                clients,
                ping_interval: cfg.ping_interval(),
                ping_timeout: cfg.ping_timeout(),
            },
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("command channel local addr")
    }

    /// Serve until `shutdown` fires, then stop accepting, close every open
    /// connection and wait for their neutral resets.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!("link: command channel listening on {}", self.local_addr()?);
        let mut conns = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        conns.spawn(serve_connection(stream, peer, self.session.clone(), shutdown.clone()));
                    }
                    Err(e) => {
                        warn!("link: accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(res) = conns.join_next(), if !conns.is_empty() => {
                    if let Err(e) = res {
                        warn!("link: connection task failed: {}", e);
                    }
                }
            }
        }

        drop(self.listener);
        info!("link: stopped accepting; closing {} connection(s)", conns.len());
        while let Some(res) = conns.join_next().await {
            if let Err(e) = res {
                warn!("link: connection task failed: {}", e);
            }
        }
        Ok(())
    }
}

/// Puts the motion channels back to neutral however the connection ends.
struct NeutralOnDrop {
    drive: DriveHandle,
    peer: SocketAddr,
}

impl Drop for NeutralOnDrop {
    fn drop(&mut self) {
        info!("link: {} gone; resetting motion channels", self.peer);
        self.drive.neutral();
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, session: Session, shutdown: CancellationToken) {
    let ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!("link: handshake with {} failed: {}", peer, e);
            return;
        }
        Err(_) => {
            warn!("link: handshake with {} timed out", peer);
            return;
        }
    };

    let member = session.clients.join(peer);
    let _reset = NeutralOnDrop { drive: session.drive.clone(), peer };
    info!("link: client {} connected from {} ({} connected)", member.id(), peer, session.clients.len());

    let (mut sink, mut stream) = ws.split();
    let mut probe = tokio::time::interval_at(Instant::now() + session.ping_interval, session.ping_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut pong_due: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = probe.tick() => {
                if pong_due.is_none() {
                    if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                        debug!("link: ping to {} failed: {}", peer, e);
                        break;
                    }
                    pong_due = Some(Instant::now() + session.ping_timeout);
                }
            }
            _ = wait_until(pong_due) => {
                warn!("link: {} did not answer the liveness ping; dropping", peer);
                break;
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => dispatch::handle_payload(&session.drive, peer, text.as_bytes()),
                Some(Ok(Message::Binary(data))) => dispatch::handle_payload(&session.drive, peer, &data),
                Some(Ok(Message::Pong(_))) => pong_due = None,
                Some(Ok(Message::Ping(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("link: transport error from {}: {}", peer, e);
                    break;
                }
            },
        }
    }

    info!("link: client {} disconnected: {}", member.id(), peer);
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}
