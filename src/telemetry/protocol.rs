/// Line protocol spoken with the telemetry server
///
/// Every message is one UTF-8 line:
/// - `auth <token>`: first line sent after connecting
/// - `vw <pin> <value>`: write a value to a virtual pin
/// - `vr <pin>`: server asks for the current value of a virtual pin
/// - `ping` / `pong`: heartbeat in either direction
use std::fmt;
use thiserror::Error;

use crate::models::{Channel, Value};

/// Message sent by the station
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Auth(String),
    Write(Channel, Value),
    Ping,
    Pong,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Auth(token) => write!(f, "auth {}", token),
            Frame::Write(channel, value) => write!(f, "vw {} {}", channel.pin(), value),
            Frame::Ping => f.write_str("ping"),
            Frame::Pong => f.write_str("pong"),
        }
    }
}

/// Message received from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read(Channel),
    Ping,
    Pong,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("invalid pin {0:?}")]
    InvalidPin(String),

    #[error("no channel on pin {0}")]
    UnknownPin(u8),

    #[error("unexpected trailing data {0:?}")]
    TrailingData(String),
}

pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let mut parts = line.split_whitespace();
    let command = parts.next().ok_or(ProtocolError::Empty)?;

    let request = match command {
        "vr" => {
            let pin_text = parts.next().unwrap_or_default();
            let pin: u8 = pin_text
                .parse()
                .map_err(|_| ProtocolError::InvalidPin(pin_text.to_string()))?;
            let channel = Channel::from_pin(pin).ok_or(ProtocolError::UnknownPin(pin))?;
            Request::Read(channel)
        }
        "ping" => Request::Ping,
        "pong" => Request::Pong,
        other => return Err(ProtocolError::UnknownCommand(other.to_string())),
    };

    match parts.next() {
        Some(extra) => Err(ProtocolError::TrailingData(extra.to_string())),
        None => Ok(request),
    }
}
