//! The per-source task: owns one source and one grabber,
//! runs the state machine to completion, and narrates its lifecycle
//! onto the shared event bus.
//!
//! The lifecycle mirrors a capture thread's main loop: announce
//! `Connecting`, open the source, announce `Connected`
//! only once the open succeeds, run the grabber to a terminal status,
//! then announce `Disconnected` regardless of how it ended.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::SourceConfig;
use crate::core::frame::FrameRecord;
use crate::core::framerate::FramerateEstimator;
use crate::core::grabber::{Grabber, GrabberStatus};
use crate::core::history::FrameHistory;
use crate::core::selfpipe::SelfPipeReader;
use crate::error::{GrabberError, WorkerError};
use crate::events::{EventBus, WorkerEvent};
use crate::source::Source;

/// Everything a worker needs beyond the source itself: where frames end
/// up, and how the grabber's scan buffer should be sized.
pub struct WorkerConfig {
    pub history_capacity: usize,
    pub framerate_memory: usize,
    pub buffer_size: usize,
    pub idle_timeout: std::time::Duration,
}

/// One source's capture loop. Shares an [`EventBus`] with its siblings
/// but owns its own frame history and framerate estimate exclusively.
pub struct Worker {
    name: String,
    source_config: SourceConfig,
    worker_config: WorkerConfig,
    events: Arc<EventBus>,
    history: Arc<parking_lot::Mutex<FrameHistory>>,
    framerate: Arc<parking_lot::Mutex<FramerateEstimator>>,
    frame_count: Arc<AtomicU64>,
}

impl Worker {
    pub fn new(source_config: SourceConfig, worker_config: WorkerConfig, events: Arc<EventBus>) -> Self {
        let name = source_config.name().to_string();
        let history = FrameHistory::new(worker_config.history_capacity);
        let framerate = FramerateEstimator::new(worker_config.framerate_memory);
        Self {
            name,
            source_config,
            worker_config,
            events,
            history: Arc::new(parking_lot::Mutex::new(history)),
            framerate: Arc::new(parking_lot::Mutex::new(framerate)),
            frame_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> Arc<parking_lot::Mutex<FrameHistory>> {
        Arc::clone(&self.history)
    }

    pub fn framerate(&self) -> Arc<parking_lot::Mutex<FramerateEstimator>> {
        Arc::clone(&self.framerate)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Run one connection attempt to completion: open the source, run
    /// the grabber, and report the terminal status. The caller (the
    /// supervisor) decides whether and when to call this again.
    #[instrument(skip(self, cancel, on_frame), fields(source = %self.name))]
    pub async fn run_once<F>(
        &self,
        cancel: Option<Arc<SelfPipeReader>>,
        mut on_frame: F,
    ) -> Result<GrabberStatus, GrabberError>
    where
        F: FnMut(&FrameRecord) + Send + 'static,
    {
        self.events.publish(WorkerEvent::Connecting {
            source: self.name.clone(),
        });

        let mut source = Source::from_config(&self.source_config);
        if let Err(e) = source.open().await {
            warn!(source = %self.name, error = %e, "source failed to open");
            self.events.publish(WorkerEvent::Disconnected {
                source: self.name.clone(),
                reason: e.to_string(),
            });
            return Err(WorkerError::SourceOpen(e).into());
        }

        let mut grabber = Grabber::with_capacity_and_idle_timeout(
            source,
            self.worker_config.buffer_size,
            self.worker_config.idle_timeout,
        );
        grabber.set_cancel(cancel);

        let history = Arc::clone(&self.history);
        let framerate = Arc::clone(&self.framerate);
        let frame_count = Arc::clone(&self.frame_count);
        let events = Arc::clone(&self.events);
        let name = self.name.clone();

        grabber.set_callback(move |frame: FrameRecord| {
            on_frame(&frame);
            framerate.lock().insert(std::time::Instant::now());
            let len = frame.bytes().len();
            history.lock().append(frame);
            let frame_id = frame_count.fetch_add(1, Ordering::Relaxed) + 1;
            events.publish(WorkerEvent::FrameReceived {
                source: name.clone(),
                frame_id,
                len,
            });
        });

        info!(source = %self.name, "connected");
        self.events.publish(WorkerEvent::Connected {
            source: self.name.clone(),
        });

        let status = grabber.run().await;

        let reason = match status {
            GrabberStatus::Success => "stream ended".to_string(),
            other => format!("{other:?}"),
        };
        self.events.publish(WorkerEvent::Disconnected {
            source: self.name.clone(),
            reason,
        });
        self.events.publish(WorkerEvent::Stopped {
            source: self.name.clone(),
            status,
        });

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selfpipe;
    use std::sync::Mutex as StdMutex;

    fn file_config(name: &str, path: &str) -> SourceConfig {
        SourceConfig::File {
            name: name.to_string(),
            file: path.to_string(),
            usec: 0,
            history_capacity: None,
            framerate_memory: None,
        }
    }

    #[tokio::test]
    async fn missing_source_publishes_disconnected_and_errors() {
        let events = Arc::new(EventBus::new());
        let mut rx = events.subscribe();
        let worker = Worker::new(
            file_config("nope", "/nonexistent/path/does-not-exist.mjpeg"),
            WorkerConfig {
                history_capacity: 10,
                framerate_memory: 5,
                buffer_size: 4096,
                idle_timeout: std::time::Duration::from_secs(10),
            },
            Arc::clone(&events),
        );

        let result = worker.run_once(None, |_| {}).await;
        assert!(result.is_err());

        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Connecting { .. }));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Disconnected { .. }));
    }

    #[tokio::test]
    async fn successful_run_publishes_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.mjpeg");
        std::fs::write(
            &path,
            b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=--X\r\n\r\n--X\r\nContent-Length: 4\r\n\r\n\xFF\xD8\xFF\xD9",
        )
        .unwrap();

        let events = Arc::new(EventBus::new());
        let mut rx = events.subscribe();
        let worker = Worker::new(
            file_config("local", path.to_str().unwrap()),
            WorkerConfig {
                history_capacity: 10,
                framerate_memory: 5,
                buffer_size: 4096,
                idle_timeout: std::time::Duration::from_secs(10),
            },
            Arc::clone(&events),
        );

        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let status = worker
            .run_once(None, move |frame| {
                received_clone.lock().unwrap().push(frame.bytes().len());
            })
            .await
            .unwrap();

        assert_eq!(status, GrabberStatus::PrematureEof);
        assert_eq!(*received.lock().unwrap(), vec![4]);
        assert_eq!(worker.frame_count(), 1);
        assert!(worker.history().lock().len() == 1);

        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Connecting { .. }));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Connected { .. }));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::FrameReceived { .. }));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Disconnected { .. }));
        assert!(matches!(rx.recv().await.unwrap(), WorkerEvent::Stopped { .. }));
    }

    #[tokio::test]
    async fn cancellation_reports_canceled_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-ends.mjpeg");
        // No trailing data: the file source will hit EOF quickly in practice,
        // so this test exercises the cancel path via selfpipe signaling
        // directly rather than racing a slow file read.
        std::fs::write(&path, b"HTTP/1.0 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary=--X\r\n\r\n").unwrap();

        let (reader, writer) = selfpipe::pair_shared().unwrap();
        writer.signal_and_close();

        let events = Arc::new(EventBus::new());
        let worker = Worker::new(
            file_config("cam", path.to_str().unwrap()),
            WorkerConfig {
                history_capacity: 10,
                framerate_memory: 5,
                buffer_size: 4096,
                idle_timeout: std::time::Duration::from_secs(10),
            },
            events,
        );

        let status = worker.run_once(Some(reader), |_| {}).await.unwrap();
        assert!(matches!(status, GrabberStatus::Canceled | GrabberStatus::PrematureEof));
    }
}
