use super::{FrameSize, FrameSource, LandmarkFrame};
use crate::{landmarks::LandmarkSet, Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, Lines, Write},
    path::Path,
};

/// One line of a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub faces: Vec<LandmarkSet>,
}

impl ReplayRecord {
    /// Record for a frame
    #[must_use]
    pub fn from_frame(frame: &LandmarkFrame) -> Self {
        Self {
            width: frame.size.map(|s| s.width),
            height: frame.size.map(|s| s.height),
            faces: frame.faces.clone(),
        }
    }
}

/// Plays back a JSON-lines landmark recording, one frame per line
pub struct ReplaySource<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
    size: Option<FrameSize>,
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording file
    ///
    /// # Errors
    ///
    /// Returns `Capture` if the file cannot be opened
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Capture(format!("Failed to open recording {}: {e}", path.display())))?;
        log::info!("Replaying landmarks from {}", path.display());
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    /// Read a recording from any buffered reader
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            size: None,
        }
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    type Frame = LandmarkFrame;

    fn read(&mut self) -> Result<Option<LandmarkFrame>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_number += 1;
            let line = line.map_err(|e| Error::Capture(format!("Line {}: {e}", self.line_number)))?;
            if line.trim().is_empty() {
                continue;
            }

            let record: ReplayRecord = serde_json::from_str(&line)
                .map_err(|e| Error::Capture(format!("Line {}: {e}", self.line_number)))?;
            if let (Some(width), Some(height)) = (record.width, record.height) {
                self.size = Some(FrameSize { width, height });
            }
            log::debug!("Replay line {}: {} faces", self.line_number, record.faces.len());
            return Ok(Some(LandmarkFrame {
                faces: record.faces,
                size: self.size,
            }));
        }
    }

    fn frame_size(&self) -> Option<FrameSize> {
        self.size
    }
}

/// Append frames to a JSON-lines recording
///
/// # Errors
///
/// Returns `Io` or `Json` if a frame cannot be written
pub fn write_recording<W: Write>(writer: &mut W, frames: &[LandmarkFrame]) -> Result<()> {
    for frame in frames {
        serde_json::to_writer(&mut *writer, &ReplayRecord::from_frame(frame))?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::io::Cursor;

    fn face(offset: f64) -> LandmarkSet {
        LandmarkSet::new((0..68_i32).map(|i| Point2::new(f64::from(i) + offset, offset)).collect()).unwrap()
    }

    #[test]
    fn test_reads_frames_and_size() {
        let frames = vec![
            LandmarkFrame {
                faces: vec![face(0.0)],
                size: Some(FrameSize { width: 800, height: 600 }),
            },
            LandmarkFrame {
                faces: vec![face(1.0), face(2.0)],
                size: None,
            },
        ];
        let mut buffer = Vec::new();
        write_recording(&mut buffer, &frames).unwrap();

        let mut source = ReplaySource::from_reader(Cursor::new(buffer));
        assert_eq!(source.frame_size(), None);
        let first = source.read().unwrap().unwrap();
        assert_eq!(first, frames[0]);
        let second = source.read().unwrap().unwrap();
        assert_eq!(second.faces.len(), 2);
        // Size carries over from earlier lines
        assert_eq!(second.size, Some(FrameSize { width: 800, height: 600 }));
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_blank_lines_and_empty_frames() {
        let text = "\n{\"faces\":[]}\n\n";
        let mut source = ReplaySource::from_reader(Cursor::new(text));
        let frame = source.read().unwrap().unwrap();
        assert!(frame.faces.is_empty());
        assert!(source.read().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_is_capture_error() {
        let mut source = ReplaySource::from_reader(Cursor::new("{\"faces\":[[[1,2],[3,4]]]}\n"));
        match source.read() {
            Err(Error::Capture(message)) => assert!(message.starts_with("Line 1")),
            other => panic!("expected capture error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ReplaySource::open("/nonexistent/recording.jsonl"),
            Err(Error::Capture(_))
        ));
    }
}
