use rover_drive::DriveHandle;
use rover_link::ClientSet;
use rover_stream::StatusReport;
use rover_tunnel::Reachability;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;

/// Live bridge state shown on the stream status page.
pub struct BridgeStatus {
    pub drive: DriveHandle,
    pub clients: ClientSet,
    pub reachability: watch::Receiver<Reachability>,
    pub resolution: String,
    pub command_port: u16,
}

impl StatusReport for BridgeStatus {
    fn rows(&self) -> Vec<(String, String)> {
        let st = self.drive.status();
        let last = st
            .last_command_at
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| "never".to_string());
        let on_off = |b: bool| if b { "on" } else { "off" }.to_string();

        vec![
            ("Resolution".into(), self.resolution.clone()),
            ("Command port".into(), self.command_port.to_string()),
            ("Command clients".into(), clients_row(&self.clients)),
            ("Actuators".into(), st.backend.to_string()),
            ("Gear".into(), st.state.gear.get().to_string()),
            ("Lights".into(), on_off(st.state.lights)),
            ("Auto mode".into(), on_off(st.state.auto_mode)),
            ("Last command".into(), last),
            ("Tunnel".into(), self.reachability.borrow().to_string()),
        ]
    }
}

fn clients_row(clients: &ClientSet) -> String {
    let peers = clients.peers();
    if peers.is_empty() {
        return "0".to_string();
    }
    let list: Vec<String> = peers.iter().map(|p| p.to_string()).collect();
    format!("{} ({})", peers.len(), list.join(", "))
}
