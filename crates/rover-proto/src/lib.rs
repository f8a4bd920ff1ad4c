pub mod command;

pub use command::{decode, ControlCommand, DecodeError};
