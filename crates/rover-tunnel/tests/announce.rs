use axum::{routing::get, Json, Router};
use rover_tunnel::{announce, query_endpoint, Reachability, TunnelConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;

async fn api(body: Value) -> SocketAddr {
    let app = Router::new().route("/api/tunnels", get(move || {
        let body = body.clone();
        async move { Json(body) }
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn first_tunnel_hostname_is_reported() {
    let addr = api(json!({
        "tunnels": [
            {"name": "command", "public_url": "https://a1b2.ngrok-free.app", "proto": "https"},
            {"name": "other", "public_url": "http://zzz.ngrok-free.app"}
        ]
    }))
    .await;
    let host = query_endpoint(&format!("http://{addr}/api/tunnels"), Duration::from_secs(2)).await.unwrap();
    assert_eq!(host, "a1b2.ngrok-free.app");
}

#[tokio::test]
async fn empty_tunnel_list_is_an_error() {
    let addr = api(json!({"tunnels": []})).await;
    let err = query_endpoint(&format!("http://{addr}/api/tunnels"), Duration::from_secs(2)).await.unwrap_err();
    assert!(format!("{err:#}").contains("no tunnel present"));
}

#[tokio::test]
async fn wrong_path_is_an_error() {
    let addr = api(json!({"tunnels": []})).await;
    let err = query_endpoint(&format!("http://{addr}/nope"), Duration::from_secs(2)).await.unwrap_err();
    assert!(format!("{err:#}").contains("404"));
}

#[tokio::test]
async fn unreachable_api_is_an_error() {
    // bind and drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    assert!(query_endpoint(&format!("http://{addr}/api/tunnels"), Duration::from_secs(2)).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn sidecar_exiting_during_warmup_is_unavailable() {
    // `true` ignores its arguments and exits at once
    let cfg = TunnelConfig {
        binary: "true".into(),
        warmup_s: 1,
        ..TunnelConfig::default()
    };
    let (sidecar, reach) = announce(&cfg, 8765).await;
    assert!(sidecar.is_none());
    match reach {
        Reachability::Unavailable { reason } => assert!(reason.contains("exited"), "{reason}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn running_sidecar_reports_hostname() {
    let addr = api(json!({"tunnels": [{"public_url": "https://rover.ngrok-free.app"}]})).await;
    // `yes` keeps running until killed, standing in for the tunnel process
    let cfg = TunnelConfig {
        binary: "yes".into(),
        api_url: format!("http://{addr}/api/tunnels"),
        warmup_s: 0,
        ..TunnelConfig::default()
    };
    let (sidecar, reach) = announce(&cfg, 8765).await;
    assert_eq!(reach, Reachability::Active { hostname: "rover.ngrok-free.app".into() });
    tokio::time::timeout(Duration::from_secs(10), sidecar.expect("sidecar kept").stop())
        .await
        .unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn running_sidecar_without_tunnels_is_kept_but_unavailable() {
    let addr = api(json!({"tunnels": []})).await;
    let cfg = TunnelConfig {
        binary: "yes".into(),
        api_url: format!("http://{addr}/api/tunnels"),
        warmup_s: 0,
        ..TunnelConfig::default()
    };
    let (sidecar, reach) = announce(&cfg, 8765).await;
    assert!(matches!(&reach, Reachability::Unavailable { reason } if reason.contains("no tunnel present")));
    let sidecar = sidecar.expect("sidecar kept");
    sidecar.stop().await;
}
