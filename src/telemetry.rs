//! Telemetry wire format and UDP transport.
//!
//! One message per face per frame, fifteen ':'-separated decimal fields:
//!
//! ```text
//! tx:ty:tz:qw:qx:qy:qz:leftEyeWidth:rightEyeWidth:mouthWidth:mouthLength:
//! leftEyebrowLift:rightEyebrowLift:leftFrown:rightFrown
//! ```
//!
//! Quaternion components are rounded to four decimals; every other field
//! uses the shortest text that round-trips the value.

use crate::{
    constants::TELEMETRY_FIELD_COUNT, metrics::FacialMetrics, rotation::Quaternion, Error, Result,
};
use nalgebra::Vector3;
use std::{
    fmt::Write as _,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    str::FromStr,
    time::Duration,
};

const FIELD_SEPARATOR: char = ':';

/// Largest datagram the receiver accepts
const MAX_DATAGRAM_SIZE: usize = 1024;

/// One telemetry message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub translation: [f64; 3],
    pub quaternion: Quaternion,
    pub metrics: FacialMetrics,
}

impl TelemetryFrame {
    /// Assemble a frame; the quaternion is rounded to wire precision
    #[must_use]
    pub fn new(translation: &Vector3<f64>, quaternion: &Quaternion, metrics: FacialMetrics) -> Self {
        Self {
            translation: [translation.x, translation.y, translation.z],
            quaternion: quaternion.rounded(),
            metrics,
        }
    }

    /// All fields in wire order
    #[must_use]
    pub fn fields(&self) -> [f64; TELEMETRY_FIELD_COUNT] {
        let mut fields = [0.0; TELEMETRY_FIELD_COUNT];
        fields[..3].copy_from_slice(&self.translation);
        fields[3..7].copy_from_slice(&self.quaternion.to_array());
        fields[7..].copy_from_slice(&self.metrics.to_array());
        fields
    }

    /// Encode to the wire text
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if any field is not finite
    pub fn encode(&self) -> Result<String> {
        let fields = self.fields();
        if let Some(position) = fields.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "Telemetry field {position} is not finite"
            )));
        }

        let mut message = String::with_capacity(16 * TELEMETRY_FIELD_COUNT);
        for (i, value) in fields.iter().enumerate() {
            if i > 0 {
                message.push(FIELD_SEPARATOR);
            }
            let _ = write!(message, "{value}");
        }
        Ok(message)
    }
}

impl FromStr for TelemetryFrame {
    type Err = Error;

    fn from_str(message: &str) -> Result<Self> {
        let parts: Vec<&str> = message.trim().split(FIELD_SEPARATOR).collect();
        if parts.len() != TELEMETRY_FIELD_COUNT {
            return Err(Error::Protocol(format!(
                "Expected {TELEMETRY_FIELD_COUNT} fields, got {}",
                parts.len()
            )));
        }

        let mut fields = [0.0; TELEMETRY_FIELD_COUNT];
        for (i, (slot, part)) in fields.iter_mut().zip(&parts).enumerate() {
            *slot = part
                .parse::<f64>()
                .map_err(|e| Error::Protocol(format!("Field {i} ({part:?}) is not a number: {e}")))?;
        }

        let mut metrics = [0.0; 8];
        metrics.copy_from_slice(&fields[7..]);
        Ok(Self {
            translation: [fields[0], fields[1], fields[2]],
            quaternion: Quaternion {
                w: fields[3],
                x: fields[4],
                y: fields[5],
                z: fields[6],
            },
            metrics: FacialMetrics::from_array(metrics),
        })
    }
}

/// Destination for encoded telemetry messages
pub trait TelemetrySink {
    /// Send one message, without retrying
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the message could not be handed to the network
    fn send(&mut self, message: &str) -> Result<()>;
}

/// Fire-and-forget UDP datagram sink
pub struct UdpSink {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpSink {
    /// Bind an ephemeral non-blocking socket aimed at `destination`
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the address does not resolve or the socket cannot be created
    pub fn new(destination: &str) -> Result<Self> {
        let destination = destination
            .to_socket_addrs()
            .map_err(|e| Error::Transport(format!("Failed to resolve {destination}: {e}")))?
            .next()
            .ok_or_else(|| Error::Transport(format!("No address for {destination}")))?;
        let bind_addr = if destination.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket =
            UdpSocket::bind(bind_addr).map_err(|e| Error::Transport(format!("Failed to bind UDP socket: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| Error::Transport(format!("Failed to set non-blocking: {e}")))?;

        log::info!("Sending telemetry to {destination}");
        Ok(Self { socket, destination })
    }

    /// Resolved destination address
    #[must_use]
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl TelemetrySink for UdpSink {
    fn send(&mut self, message: &str) -> Result<()> {
        self.socket
            .send_to(message.as_bytes(), self.destination)
            .map(|_| ())
            .map_err(|e| Error::Transport(format!("Send to {} failed: {e}", self.destination)))
    }
}

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub messages: Vec<String>,
}

impl TelemetrySink for MemorySink {
    fn send(&mut self, message: &str) -> Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }
}

/// Consumer side: receives and decodes telemetry datagrams
pub struct TelemetryReceiver {
    socket: UdpSocket,
}

impl TelemetryReceiver {
    /// Listen on `bind_addr`, returning from `recv` after `timeout` with no data
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the socket cannot be bound
    pub fn bind(bind_addr: &str, timeout: Duration) -> Result<Self> {
        let socket =
            UdpSocket::bind(bind_addr).map_err(|e| Error::Transport(format!("Failed to bind {bind_addr}: {e}")))?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| Error::Transport(format!("Failed to set read timeout: {e}")))?;
        log::info!("Listening for telemetry on {bind_addr}");
        Ok(Self { socket })
    }

    /// Local address actually bound
    ///
    /// # Errors
    ///
    /// Returns `Io` if the socket has no local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for one message; `Ok(None)` on timeout
    ///
    /// # Errors
    ///
    /// Returns `Protocol` for undecodable datagrams and `Transport` for socket failures
    pub fn recv(&self) -> Result<Option<(SocketAddr, TelemetryFrame)>> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match self.socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let text = std::str::from_utf8(&buf[..len])
                    .map_err(|e| Error::Protocol(format!("Datagram is not UTF-8: {e}")))?;
                Ok(Some((from, text.parse()?)))
            }
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(Error::Transport(format!("Receive failed: {e}"))),
        }
    }
}
