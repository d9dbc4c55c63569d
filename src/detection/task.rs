use super::{Detector, RawDetection};
use log::{debug, info, warn};
use std::task::Poll;

/// Lifecycle of the detection task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for the detector to finish setup
    Setup,
    /// No request outstanding; the next refresh issues one
    Idle,
    /// One request outstanding
    Running,
    /// Setup or a detection failed; no further requests are issued
    Disabled,
}

/// Single persistent detection task with an explicit running flag.
///
/// Call [`DetectionTask::on_refresh`] once per display refresh. The task
/// issues a request only when none is outstanding, so a slow detector
/// throttles itself and renders in between keep the last result.
pub struct DetectionTask<D> {
    detector: D,
    state: TaskState,
    completed_cycles: u64,
    last_detection: Option<RawDetection>,
}

impl<D: Detector> DetectionTask<D> {
    /// Create a task; setup is polled on the first refresh
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            state: TaskState::Setup,
            completed_cycles: 0,
            last_detection: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Whether the task can still produce detections
    pub fn is_active(&self) -> bool {
        self.state != TaskState::Disabled
    }

    /// Number of detection cycles that completed successfully
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    /// Result of the most recent completed cycle
    pub fn last_detection(&self) -> Option<&RawDetection> {
        self.last_detection.as_ref()
    }

    /// Advance the task by one display refresh.
    ///
    /// Returns the detected face when a cycle completed on this refresh
    /// and found one. `None` covers every other case: still waiting, no
    /// face this cycle, or the task is disabled.
    pub fn on_refresh(&mut self) -> Option<RawDetection> {
        match self.state {
            TaskState::Disabled => return None,
            TaskState::Setup => match self.detector.poll_ready() {
                Poll::Pending => return None,
                Poll::Ready(Ok(())) => {
                    info!("{} ready, starting detection cycles", self.detector.name());
                    self.state = TaskState::Idle;
                }
                Poll::Ready(Err(e)) => {
                    warn!("{} setup failed, tracking disabled: {e}", self.detector.name());
                    self.state = TaskState::Disabled;
                    return None;
                }
            },
            TaskState::Idle | TaskState::Running => {}
        }

        if self.state == TaskState::Idle {
            if let Err(e) = self.detector.request() {
                warn!("{} rejected detection request, tracking frozen: {e}", self.detector.name());
                self.state = TaskState::Disabled;
                return None;
            }
            self.state = TaskState::Running;
        }

        match self.detector.poll_detection() {
            Poll::Pending => None,
            Poll::Ready(Ok(detection)) => {
                self.state = TaskState::Idle;
                self.completed_cycles += 1;
                debug!(
                    "Detection cycle {} completed: {}",
                    self.completed_cycles,
                    if detection.is_some() { "face" } else { "no face" }
                );
                self.last_detection.clone_from(&detection);
                detection
            }
            Poll::Ready(Err(e)) => {
                warn!("{} detection failed, tracking frozen: {e}", self.detector.name());
                self.state = TaskState::Disabled;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{detection::BoundingBox, Error, Result};
    use std::collections::VecDeque;

    /// Detector that needs `latency` polls per request
    struct ScriptedDetector {
        latency: usize,
        remaining: usize,
        outstanding: bool,
        results: VecDeque<Result<Option<RawDetection>>>,
        requests: usize,
    }

    impl ScriptedDetector {
        fn new(latency: usize, results: Vec<Result<Option<RawDetection>>>) -> Self {
            Self {
                latency,
                remaining: 0,
                outstanding: false,
                results: results.into(),
                requests: 0,
            }
        }
    }

    impl Detector for ScriptedDetector {
        fn request(&mut self) -> Result<()> {
            assert!(!self.outstanding, "overlapping request");
            self.outstanding = true;
            self.remaining = self.latency;
            self.requests += 1;
            Ok(())
        }

        fn poll_detection(&mut self) -> Poll<Result<Option<RawDetection>>> {
            if self.remaining > 0 {
                self.remaining -= 1;
                return Poll::Pending;
            }
            self.outstanding = false;
            Poll::Ready(self.results.pop_front().unwrap_or(Ok(None)))
        }

        fn name(&self) -> &str {
            "ScriptedDetector"
        }
    }

    fn face() -> RawDetection {
        RawDetection::from_eyes(Vec::new(), Vec::new(), BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_synchronous_detector_completes_every_refresh() {
        let mut task = DetectionTask::new(ScriptedDetector::new(0, vec![Ok(Some(face())), Ok(None), Ok(Some(face()))]));

        assert!(task.on_refresh().is_some());
        assert!(task.on_refresh().is_none());
        assert!(task.last_detection().is_none());
        assert!(task.on_refresh().is_some());
        assert_eq!(task.completed_cycles(), 3);
        assert_eq!(task.state(), TaskState::Idle);
    }

    #[test]
    fn test_slow_detector_never_overlaps() {
        let mut task = DetectionTask::new(ScriptedDetector::new(2, vec![Ok(Some(face())), Ok(Some(face()))]));

        assert!(task.on_refresh().is_none());
        assert_eq!(task.state(), TaskState::Running);
        assert!(task.on_refresh().is_none());
        assert!(task.on_refresh().is_some());
        assert_eq!(task.state(), TaskState::Idle);
        assert_eq!(task.detector.requests, 1);

        assert!(task.on_refresh().is_none());
        assert_eq!(task.detector.requests, 2);
    }

    #[test]
    fn test_failure_disables_task() {
        let mut task = DetectionTask::new(ScriptedDetector::new(
            0,
            vec![Ok(Some(face())), Err(Error::ModelError("not loaded".to_string())), Ok(Some(face()))],
        ));

        assert!(task.on_refresh().is_some());
        assert!(task.on_refresh().is_none());
        assert_eq!(task.state(), TaskState::Disabled);
        assert!(!task.is_active());

        // Frozen: no further requests
        assert!(task.on_refresh().is_none());
        assert_eq!(task.detector.requests, 2);
        assert!(task.last_detection().is_some());
    }
}
