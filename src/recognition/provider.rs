//! The embedding-provider boundary.
//!
//! Frame capture and face-embedding extraction are an opaque external
//! capability; the engine only sees descriptors. `FrameAnalyzer` is the port
//! the sampling worker calls once per tick, and `CommandAnalyzer` is the
//! shipped adapter: it invokes the detector process and reads detections as
//! JSON from stdout.

use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capture failures the sampler branches on.
///
/// Acquisition failures count toward the consecutive-failure abort limit;
/// detection failures only skip the tick.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source unavailable: {0}")]
    Acquisition(String),
    #[error("detection failed: {0}")]
    Detection(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One detected face: descriptor plus where it was in the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub descriptor: Vec<f32>,
    pub bounding_box: BoundingBox,
}

pub trait FrameAnalyzer: Send + Sync {
    /// Grab one frame and return the detected descriptors. Blocking; the
    /// worker runs it on the blocking pool under a timeout.
    fn detect(&self) -> Result<Vec<Detection>, CaptureError>;
}

/// Adapter for an external detector executable.
///
/// The command is run once per tick and must print a JSON array of
/// detections on stdout. A failure to launch or a non-zero exit means the
/// capture source itself is unhealthy; garbled output means this frame's
/// detection failed.
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl FrameAnalyzer for CommandAnalyzer {
    fn detect(&self) -> Result<Vec<Detection>, CaptureError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|err| {
                CaptureError::Acquisition(format!("failed to run {}: {err}", self.program))
            })?;

        if !output.status.success() {
            return Err(CaptureError::Acquisition(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| CaptureError::Detection(format!("invalid detector output: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_json() {
        let analyzer = CommandAnalyzer::new(
            "sh",
            vec![
                "-c".into(),
                r#"echo '[{"descriptor":[0.1,0.2],"boundingBox":{"x":4,"y":8,"width":60,"height":80}}]'"#.into(),
            ],
        );

        let detections = analyzer.detect().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].descriptor, vec![0.1, 0.2]);
        assert_eq!(detections[0].bounding_box.width, 60);
    }

    #[test]
    fn missing_program_is_an_acquisition_failure() {
        let analyzer = CommandAnalyzer::new("/nonexistent/rollcall-detector", vec![]);
        match analyzer.detect() {
            Err(CaptureError::Acquisition(_)) => {}
            other => panic!("expected acquisition failure, got {other:?}"),
        }
    }

    #[test]
    fn garbled_output_is_a_detection_failure() {
        let analyzer = CommandAnalyzer::new("sh", vec!["-c".into(), "echo not-json".into()]);
        match analyzer.detect() {
            Err(CaptureError::Detection(_)) => {}
            other => panic!("expected detection failure, got {other:?}"),
        }
    }

    #[test]
    fn nonzero_exit_is_an_acquisition_failure() {
        let analyzer = CommandAnalyzer::new("sh", vec!["-c".into(), "exit 3".into()]);
        match analyzer.detect() {
            Err(CaptureError::Acquisition(_)) => {}
            other => panic!("expected acquisition failure, got {other:?}"),
        }
    }
}
