use super::{Detector, RawDetection};
use crate::{Error, Result};
use log::{debug, info};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::task::Poll;

/// Blocking detection backend, e.g. a capture device plus inference models
pub trait DetectionBackend {
    /// Grab the current frame and run detection on it
    ///
    /// # Errors
    ///
    /// Returns an error if capture or inference fails
    fn detect(&mut self) -> Result<Option<RawDetection>>;
}

enum WorkerMessage {
    Ready(Result<()>),
    Detection(Result<Option<RawDetection>>),
}

/// Runs a blocking backend on a dedicated worker thread.
///
/// The backend is constructed on the worker, so setup (device and model
/// loading) never blocks the refresh tick. Requests and responses travel
/// over channels; [`super::DetectionTask`] keeps at most one in flight.
pub struct ThreadedDetector {
    name: String,
    requests: Sender<()>,
    responses: Receiver<WorkerMessage>,
    ready: bool,
}

impl ThreadedDetector {
    /// Spawn the worker and start backend setup on it
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned
    pub fn spawn<B, F>(name: &str, factory: F) -> Result<Self>
    where
        B: DetectionBackend,
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<()>();
        let (response_tx, response_rx) = mpsc::channel();

        std::thread::Builder::new()
            .name(format!("{name}-worker"))
            .spawn(move || {
                let mut backend = match factory() {
                    Ok(backend) => {
                        if response_tx.send(WorkerMessage::Ready(Ok(()))).is_err() {
                            return;
                        }
                        backend
                    }
                    Err(e) => {
                        let _ = response_tx.send(WorkerMessage::Ready(Err(e)));
                        return;
                    }
                };

                for () in request_rx {
                    let result = backend.detect();
                    if response_tx.send(WorkerMessage::Detection(result)).is_err() {
                        break;
                    }
                }
                debug!("Detection worker exiting");
            })?;

        info!("Spawned detection worker for {name}");

        Ok(Self {
            name: name.to_string(),
            requests: request_tx,
            responses: response_rx,
            ready: false,
        })
    }

    fn worker_gone(&self) -> Error {
        Error::DetectorError(format!("{} worker is not running", self.name))
    }
}

impl Detector for ThreadedDetector {
    fn poll_ready(&mut self) -> Poll<Result<()>> {
        if self.ready {
            return Poll::Ready(Ok(()));
        }

        match self.responses.try_recv() {
            Ok(WorkerMessage::Ready(result)) => {
                self.ready = result.is_ok();
                Poll::Ready(result)
            }
            Ok(WorkerMessage::Detection(_)) => Poll::Ready(Err(Error::DetectorError(
                "Detection result received before setup completed".to_string(),
            ))),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Ready(Err(self.worker_gone())),
        }
    }

    fn request(&mut self) -> Result<()> {
        self.requests.send(()).map_err(|_| self.worker_gone())
    }

    fn poll_detection(&mut self) -> Poll<Result<Option<RawDetection>>> {
        match self.responses.try_recv() {
            Ok(WorkerMessage::Detection(result)) => Poll::Ready(result),
            Ok(WorkerMessage::Ready(_)) => Poll::Ready(Err(Error::DetectorError(
                "Unexpected setup message from worker".to_string(),
            ))),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => Poll::Ready(Err(self.worker_gone())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, DetectionTask, TaskState};
    use std::time::{Duration, Instant};

    struct CountingBackend {
        calls: usize,
    }

    impl DetectionBackend for CountingBackend {
        fn detect(&mut self) -> Result<Option<RawDetection>> {
            self.calls += 1;
            let size = self.calls as f64 * 10.0;
            Ok(Some(RawDetection::from_eyes(
                Vec::new(),
                Vec::new(),
                BoundingBox::new(0.0, 0.0, size, size),
            )))
        }
    }

    fn refresh_until<D: Detector>(task: &mut DetectionTask<D>, done: impl Fn(&DetectionTask<D>) -> bool) -> Option<RawDetection> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let detection = task.on_refresh();
            if detection.is_some() || done(task) || Instant::now() > deadline {
                return detection;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_worker_answers_requests_in_order() {
        let detector = ThreadedDetector::spawn("counting", || Ok(CountingBackend { calls: 0 })).unwrap();
        let mut task = DetectionTask::new(detector);

        let first = refresh_until(&mut task, |_| false).unwrap();
        assert_eq!(first.face_area(), 100.0);

        let second = refresh_until(&mut task, |_| false).unwrap();
        assert_eq!(second.face_area(), 400.0);
    }

    #[test]
    fn test_setup_failure_disables_task() {
        let detector = ThreadedDetector::spawn("broken", || -> Result<CountingBackend> {
            Err(Error::Capture("permission denied".to_string()))
        })
        .unwrap();
        let mut task = DetectionTask::new(detector);

        let detection = refresh_until(&mut task, |t| t.state() == TaskState::Disabled);
        assert!(detection.is_none());
        assert_eq!(task.state(), TaskState::Disabled);
    }
}
