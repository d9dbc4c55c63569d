//! Playback of recorded detections.
//!
//! A recording is a YAML document listing one entry per detection cycle;
//! `null` entries are cycles in which no face was found.

use crate::{
    detection::{Detector, RawDetection},
    Error, Result,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::task::Poll;

/// Recorded detection stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Recording {
    /// Capture resolution the detections were made at
    pub capture_size: Option<(f64, f64)>,
    /// Refresh ticks each request takes to resolve
    pub latency_ticks: usize,
    /// One entry per detection cycle
    pub frames: Vec<Option<RawDetection>>,
}

impl Recording {
    /// Load a recording from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a recording from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid recording
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ReplayError(format!("Failed to parse recording: {e}")))
    }

    /// Save the recording as YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ReplayError(format!("Failed to serialize recording: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Detector answering requests from a recording
pub struct ReplayDetector {
    frames: Vec<Option<RawDetection>>,
    latency_ticks: usize,
    looping: bool,
    cursor: usize,
    remaining: usize,
    outstanding: bool,
}

impl ReplayDetector {
    #[must_use]
    pub fn new(recording: Recording, looping: bool) -> Self {
        info!(
            "Replaying {} recorded frames (latency {} ticks{})",
            recording.frames.len(),
            recording.latency_ticks,
            if looping { ", looping" } else { "" }
        );

        Self {
            frames: recording.frames,
            latency_ticks: recording.latency_ticks,
            looping,
            cursor: 0,
            remaining: 0,
            outstanding: false,
        }
    }

    /// Whether every recorded frame has been played
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !self.looping && self.cursor >= self.frames.len()
    }

    fn next_frame(&mut self) -> Option<RawDetection> {
        if self.looping && !self.frames.is_empty() && self.cursor >= self.frames.len() {
            self.cursor = 0;
        }

        let frame = self.frames.get(self.cursor).cloned().flatten();
        if self.cursor < self.frames.len() {
            self.cursor += 1;
        }
        frame
    }
}

impl Detector for ReplayDetector {
    fn request(&mut self) -> Result<()> {
        if self.outstanding {
            return Err(Error::DetectorError("Replay request already outstanding".to_string()));
        }
        self.outstanding = true;
        self.remaining = self.latency_ticks;
        Ok(())
    }

    fn poll_detection(&mut self) -> Poll<Result<Option<RawDetection>>> {
        if !self.outstanding {
            return Poll::Ready(Err(Error::DetectorError("No replay request outstanding".to_string())));
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return Poll::Pending;
        }

        self.outstanding = false;
        Poll::Ready(Ok(self.next_frame()))
    }

    fn name(&self) -> &str {
        "ReplayDetector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, LandmarkGroup};
    use nalgebra::Point2;

    const SAMPLE: &str = r#"
capture_size: [640, 480]
latency_ticks: 1
frames:
  - bbox: { x: 100, y: 150, width: 50, height: 50 }
    landmarks:
      left_eye: [[100, 200]]
      right_eye: [[140, 200]]
  - null
"#;

    #[test]
    fn test_parse_sample() {
        let recording = Recording::from_yaml(SAMPLE).unwrap();
        assert_eq!(recording.capture_size, Some((640.0, 480.0)));
        assert_eq!(recording.latency_ticks, 1);
        assert_eq!(recording.frames.len(), 2);

        let first = recording.frames[0].as_ref().unwrap();
        assert_eq!(first.group(LandmarkGroup::LeftEye), &[Point2::new(100.0, 200.0)]);
        assert_eq!(first.face_area(), 2500.0);
        assert!(recording.frames[1].is_none());
    }

    #[test]
    fn test_latency_and_end_of_stream() {
        let mut detector = ReplayDetector::new(Recording::from_yaml(SAMPLE).unwrap(), false);

        detector.request().unwrap();
        assert!(detector.poll_detection().is_pending());
        assert!(matches!(detector.poll_detection(), Poll::Ready(Ok(Some(_)))));

        detector.request().unwrap();
        assert!(detector.poll_detection().is_pending());
        assert!(matches!(detector.poll_detection(), Poll::Ready(Ok(None))));
        assert!(detector.is_finished());

        detector.request().unwrap();
        assert!(detector.poll_detection().is_pending());
        assert!(matches!(detector.poll_detection(), Poll::Ready(Ok(None))));
    }

    #[test]
    fn test_looping_wraps_around() {
        let recording = Recording {
            capture_size: None,
            latency_ticks: 0,
            frames: vec![Some(RawDetection::from_eyes(
                Vec::new(),
                Vec::new(),
                BoundingBox::new(0.0, 0.0, 2.0, 2.0),
            ))],
        };
        let mut detector = ReplayDetector::new(recording, true);

        for _ in 0..3 {
            detector.request().unwrap();
            assert!(matches!(detector.poll_detection(), Poll::Ready(Ok(Some(_)))));
        }
        assert!(!detector.is_finished());
    }

    #[test]
    fn test_overlapping_request_rejected() {
        let mut detector = ReplayDetector::new(Recording::default(), false);
        detector.request().unwrap();
        assert!(detector.request().is_err());
    }
}
