use rover_drive::{Drive, DriveHandle};
use rover_proto::{decode, ControlCommand};
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Apply one decoded command. `settings` is three independent writes:
/// gear, then lights, then auto-mode.
pub fn apply(drive: &mut Drive, cmd: &ControlCommand) {
    match *cmd {
        ControlCommand::ThrottleForward { value } => drive.set_throttle_forward(value),
        ControlCommand::ThrottleBackward { value } => drive.set_throttle_backward(value),
        ControlCommand::SteeringRight { value } => drive.set_steering_right(value),
        ControlCommand::SteeringLeft { value } => drive.set_steering_left(value),
        ControlCommand::Brake { value } => drive.set_brake(value),
        ControlCommand::Honk { value } => drive.set_horn(value),
        ControlCommand::Settings { gear, lights, auto } => {
            drive.set_gear(gear);
            drive.set_lights(lights);
            drive.set_auto_mode(auto);
        }
        ControlCommand::Unknown => {}
    }
}

/// Decode and apply one message payload. Malformed payloads are logged and
/// dropped; unknown types are ignored.
pub fn handle_payload(drive: &DriveHandle, peer: SocketAddr, payload: &[u8]) {
    match decode(payload) {
        Ok(ControlCommand::Unknown) => {
            debug!("link: {} sent a command of unknown type; ignored", peer);
        }
        Ok(cmd) => drive.with(|d| {
            debug!("link: {} -> {}", peer, cmd.kind());
            d.record_command();
            apply(d, &cmd);
        }),
        Err(e) => {
            warn!("link: dropping malformed command from {}: {} ({})", peer, e, String::from_utf8_lossy(payload));
        }
    }
}
