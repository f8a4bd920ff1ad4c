mod config;
mod status;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rover_camera::{doctor as camera_doctor, Capture};
use rover_drive::{doctor as drive_doctor, Drive, DriveHandle};
use rover_link::{ClientSet, LinkServer};
use rover_stream::{doctor as stream_doctor, StreamState};
use rover_tunnel::{doctor as tunnel_doctor, Reachability};

use crate::config::Config;
use crate::status::BridgeStatus;

#[derive(Debug, Parser)]
#[command(name = "rover", version, about = "RC rover bridge - WebSocket control, camera relay and tunnel announcer")]
struct Cli {
    /// TOML configuration; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bridge until Ctrl-C or SIGTERM.
    Run,
    /// Validate the configuration and probe the optional backends.
    Doctor,
    /// Print the output line assignment.
    Pins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Starting,
    Running,
    Draining,
    Stopped,
}

fn enter(phase: Phase) {
    info!("lifecycle: {:?}", phase);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.cmd {
        Command::Run => run(cfg).await?,
        Command::Doctor => doctor(&cfg)?,
        Command::Pins => pins(&cfg),
    }
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    enter(Phase::Starting);

    let drive = DriveHandle::new(Drive::open(&cfg.drive));
    let clients = ClientSet::new();
    let shutdown = CancellationToken::new();

    let link = LinkServer::bind(&cfg.link, drive.clone(), clients.clone()).await?;
    let command_port = link.local_addr()?.port();
    let stream_listener = TcpListener::bind(cfg.stream.bind)
        .await
        .with_context(|| format!("bind stream endpoint on {}", cfg.stream.bind))?;

    let capture = Capture::start(&cfg.camera);

    let (reach_tx, reach_rx) = watch::channel(Reachability::Pending);
    let tunnel_cfg = cfg.tunnel.clone();
    let tunnel_task = tokio::spawn(async move {
        let (sidecar, reach) = rover_tunnel::announce(&tunnel_cfg, command_port).await;
        let _ = reach_tx.send(reach);
        sidecar
    });

    let report = Arc::new(BridgeStatus {
        drive: drive.clone(),
        clients,
        reachability: reach_rx,
        resolution: format!("{}x{} @ {}fps", cfg.camera.width, cfg.camera.height, cfg.camera.fps),
        command_port,
    });
    let stream_state = StreamState::new(cfg.stream.clone(), capture.source(), report, shutdown.clone());

    let link_task = tokio::spawn(supervise("link", link.run(shutdown.clone()), shutdown.clone()));
    let stream_task = tokio::spawn(supervise(
        "stream",
        rover_stream::serve(stream_listener, stream_state),
        shutdown.clone(),
    ));

    info!("command channel: ws://{}", cfg.link.bind);
    info!("camera stream:   http://{}/?action=stream ({})", cfg.stream.bind, capture.describe());
    info!("actuators:       {}", drive.with(|d| d.backend_name()));
    enter(Phase::Running);

    tokio::select! {
        _ = termination() => {}
        _ = shutdown.cancelled() => {}
    }

    enter(Phase::Draining);
    shutdown.cancel();
    for (name, task) in [("link", link_task), ("stream", stream_task)] {
        if let Err(e) = task.await {
            warn!("{}: task failed: {}", name, e);
        }
    }
    drive.shutdown();
    capture.stop().await;
    if tunnel_task.is_finished() {
        match tunnel_task.await {
            Ok(Some(sidecar)) => sidecar.stop().await,
            Ok(None) => {}
            Err(e) => warn!("tunnel: task failed: {}", e),
        }
    } else {
        // still warming up; the sidecar is killed when the task drops it
        tunnel_task.abort();
        let _ = tunnel_task.await;
    }

    enter(Phase::Stopped);
    Ok(())
}

/// Run one server; if it stops on its own, bring the whole bridge down.
async fn supervise(name: &'static str, server: impl Future<Output = Result<()>>, shutdown: CancellationToken) {
    if let Err(e) = server.await {
        error!("{}: {:#}", name, e);
    }
    if !shutdown.is_cancelled() {
        warn!("{}: stopped unexpectedly; shutting down", name);
        shutdown.cancel();
    }
}

async fn termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => match res {
                        Ok(()) => info!("received Ctrl-C"),
                        Err(e) => warn!("Ctrl-C handler failed: {}", e),
                    },
                    _ = term.recv() => info!("received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("SIGTERM handler unavailable: {}", e),
        }
    }
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C"),
        Err(e) => {
            warn!("Ctrl-C handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    drive_doctor::check_pins(&cfg.drive)?;
    drive_doctor::check_pwm(&cfg.drive)?;
    stream_doctor::check_config(&cfg.stream)?;
    camera_doctor::check_config(&cfg.camera)?;
    tunnel_doctor::check_config(&cfg.tunnel)?;
    anyhow::ensure!(
        cfg.link.bind.port() != cfg.stream.bind.port(),
        "link.bind and stream.bind use the same port {}",
        cfg.link.bind.port()
    );

    drive_doctor::check_backend(&cfg.drive).or_else(|e| {
        warn!("drive: {:#}", e);
        Ok::<(), anyhow::Error>(())
    })?;

    if cfg.camera.enable {
        match camera_doctor::probe_helper(&cfg.camera) {
            Ok(program) => info!("doctor: camera helper {} found", program),
            Err(e) => warn!("camera: {:#}", e),
        }
    }

    if cfg.tunnel.enable {
        tunnel_doctor::probe_binary(&cfg.tunnel).or_else(|e| {
            warn!("tunnel: {:#}", e);
            Ok::<(), anyhow::Error>(())
        })?;
    }

    info!("doctor: OK");
    Ok(())
}

fn pins(cfg: &Config) {
    println!("PWM frequency: {} Hz", cfg.drive.pwm_hz);
    for (line, pin) in cfg.drive.pins.lines() {
        println!("GPIO {:>2}  {}", pin, line.describe());
    }
}
