//! `OpenSeeFace` binary UDP receiver.
//!
//! Each datagram carries one or more 1785-byte little-endian face records.
//! Only the fields the pipeline consumes are decoded: face id, camera
//! resolution and the 68 2D landmarks. The remaining blocks (eye openness,
//! the tracker's own pose, confidences, 3D points, features) are skipped.

use super::{FrameSize, FrameSource, LandmarkFrame};
use crate::{constants::NUM_FACIAL_LANDMARKS, landmarks::LandmarkSet, Error, Result};
use nalgebra::Point2;
use std::{net::UdpSocket, time::Duration};

/// Size of one face record in bytes
pub const RECORD_SIZE: usize = 1785;

/// Bytes before the 2D landmark block
const LANDMARKS_OFFSET: usize = 8 + 4 + 8 + 4 + 4 + 1 + 4 + 16 + 12 + 12 + 4 * NUM_FACIAL_LANDMARKS;

/// Enough room for a handful of faces per datagram
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// The decoded part of one face record
#[derive(Debug, Clone, PartialEq)]
pub struct OsfFace {
    pub face_id: i32,
    pub camera_resolution: [f32; 2],
    pub landmarks: LandmarkSet,
}

/// Little-endian reader over one record
struct RecordReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> RecordReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.position + N;
        let chunk = self
            .bytes
            .get(self.position..end)
            .ok_or_else(|| Error::Protocol(format!("Record truncated at byte {}", self.position)))?;
        self.position = end;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    fn skip(&mut self, count: usize) {
        self.position += count;
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }
}

/// Decode one face record
///
/// # Errors
///
/// Returns `Protocol` if the record is shorter than [`RECORD_SIZE`]
pub fn parse_record(record: &[u8]) -> Result<OsfFace> {
    if record.len() < RECORD_SIZE {
        return Err(Error::Protocol(format!(
            "Face record needs {RECORD_SIZE} bytes, got {}",
            record.len()
        )));
    }

    let mut reader = RecordReader::new(record);
    // Tracker timestamp
    reader.skip(8);
    let face_id = reader.i32()?;
    let camera_resolution = [reader.f32()?, reader.f32()?];
    reader.skip(LANDMARKS_OFFSET - reader.position);

    let mut points = Vec::with_capacity(NUM_FACIAL_LANDMARKS);
    for _ in 0..NUM_FACIAL_LANDMARKS {
        let x = reader.f32()?;
        let y = reader.f32()?;
        points.push(Point2::new(f64::from(x), f64::from(y)));
    }

    Ok(OsfFace {
        face_id,
        camera_resolution,
        landmarks: LandmarkSet::new(points)?,
    })
}

/// Decode every face record in a datagram
///
/// # Errors
///
/// Returns `Protocol` if the datagram is not a whole number of records
pub fn parse_packet(packet: &[u8]) -> Result<Vec<OsfFace>> {
    if packet.is_empty() || packet.len() % RECORD_SIZE != 0 {
        return Err(Error::Protocol(format!(
            "Packet length {} is not a multiple of {RECORD_SIZE}",
            packet.len()
        )));
    }
    packet.chunks_exact(RECORD_SIZE).map(parse_record).collect()
}

/// Receives `OpenSeeFace` tracking packets as landmark frames
pub struct OsfSource {
    socket: UdpSocket,
    size: Option<FrameSize>,
    buffer: Vec<u8>,
}

impl OsfSource {
    /// Listen on `bind_addr`; `read` returns an empty frame after `timeout`
    /// without data
    ///
    /// # Errors
    ///
    /// Returns `Capture` if the socket cannot be bound
    pub fn bind(bind_addr: &str, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|e| Error::Capture(format!("Failed to bind OSF socket on {bind_addr}: {e}")))?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| Error::Capture(format!("Failed to set OSF read timeout: {e}")))?;
        log::info!("Listening for OpenSeeFace packets on {bind_addr}");
        Ok(Self {
            socket,
            size: None,
            buffer: vec![0; MAX_DATAGRAM_SIZE],
        })
    }

    /// Local address actually bound
    ///
    /// # Errors
    ///
    /// Returns `Io` if the socket has no local address
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl FrameSource for OsfSource {
    type Frame = LandmarkFrame;

    fn read(&mut self) -> Result<Option<LandmarkFrame>> {
        let len = match self.socket.recv(&mut self.buffer) {
            Ok(len) => len,
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                return Ok(Some(LandmarkFrame {
                    faces: Vec::new(),
                    size: self.size,
                }));
            }
            Err(e) => return Err(Error::Capture(format!("OSF receive failed: {e}"))),
        };

        let faces = match parse_packet(&self.buffer[..len]) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Dropping OSF packet: {e}");
                Vec::new()
            }
        };

        if let Some(face) = faces.first() {
            let [width, height] = face.camera_resolution;
            if width >= 1.0 && height >= 1.0 && width.is_finite() && height.is_finite() {
                // Resolution is sent as float pixel counts
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let size = FrameSize {
                    width: width.round() as u32,
                    height: height.round() as u32,
                };
                self.size = Some(size);
            }
        }
        log::debug!("OSF packet: {} faces", faces.len());

        Ok(Some(LandmarkFrame {
            faces: faces.into_iter().map(|face| face.landmarks).collect(),
            size: self.size,
        }))
    }

    fn frame_size(&self) -> Option<FrameSize> {
        self.size
    }
}
