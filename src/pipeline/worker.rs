use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::{BackendRegistry, DetectionCapability, DetectionResult};
use crate::frame::Frame;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Detections for one processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBatch {
    pub frame_seq: u64,
    /// Upright size of the frame the boxes refer to.
    pub frame_size: (u32, u32),
    pub detections: Vec<DetectionResult>,
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerOptions {
    pub capability: DetectionCapability,
    pub nms_threshold: f32,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            capability: DetectionCapability::ObjectDetection,
            nms_threshold: 0.5,
        }
    }
}

#[derive(Default, Debug)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of worker counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub submitted: u64,
    pub dropped: u64,
    pub processed: u64,
    pub failed: u64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// The worker still had a frame pending; this one was discarded.
    DroppedBusy,
    /// The worker has stopped.
    Closed,
}

/// Capture-side handle that feeds frames to the worker.
#[derive(Clone)]
pub struct FrameSubmitter {
    tx: SyncSender<Frame>,
    counters: Arc<Counters>,
}

impl FrameSubmitter {
    /// Hand a frame to the worker without blocking. Late frames are dropped.
    /// Closed submissions are not counted.
    pub fn try_submit(&self, frame: Frame) -> SubmitOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                SubmitOutcome::Accepted
            }
            Err(TrySendError::Full(frame)) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("worker busy, dropping frame {}", frame.seq());
                SubmitOutcome::DroppedBusy
            }
            Err(TrySendError::Disconnected(_)) => SubmitOutcome::Closed,
        }
    }

    /// Hand a frame to the worker, waiting for the pending slot to free up.
    pub fn submit(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| anyhow!("detection worker has stopped"))?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }
}

/// Owner handle for the worker thread.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    counters: Arc<Counters>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot()
    }

    /// Stop the worker and wait for it to exit.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("detection worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Background detection worker.
///
/// One frame is processed at a time. At most one further frame waits in the
/// channel; anything beyond that is dropped by `try_submit`. Failed frames
/// are skipped without retry and produce no batch.
pub struct DetectionWorker;

impl DetectionWorker {
    pub fn spawn(
        registry: BackendRegistry,
        options: WorkerOptions,
    ) -> Result<(FrameSubmitter, Receiver<DetectionBatch>, WorkerHandle)> {
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Frame>(1);
        let (batch_tx, batch_rx) = mpsc::channel::<DetectionBatch>();
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_counters = counters.clone();
        let thread_shutdown = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || {
                run_worker(
                    registry,
                    options,
                    frame_rx,
                    batch_tx,
                    &thread_counters,
                    &thread_shutdown,
                )
            })?;

        Ok((
            FrameSubmitter {
                tx: frame_tx,
                counters: counters.clone(),
            },
            batch_rx,
            WorkerHandle {
                shutdown,
                counters,
                join: Some(join),
            },
        ))
    }
}

fn run_worker(
    registry: BackendRegistry,
    options: WorkerOptions,
    frames: Receiver<Frame>,
    batches: mpsc::Sender<DetectionBatch>,
    counters: &Counters,
    shutdown: &AtomicBool,
) {
    if let Err(e) = registry.warm_up_all() {
        log::warn!("detector warm-up failed: {}", e);
    }
    log::debug!("detection worker started (backends: {:?})", registry.list());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let frame = match frames.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let seq = frame.seq();
        match registry.detect_with_capability(options.capability, &frame, options.nms_threshold) {
            Ok(detections) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
                let batch = DetectionBatch {
                    frame_seq: seq,
                    frame_size: frame.display_size(),
                    detections,
                };
                if batches.send(batch).is_err() {
                    log::debug!("display receiver gone, stopping detection worker");
                    break;
                }
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                log::debug!("frame {} skipped: {:#}", seq, e);
            }
        }
    }
    log::debug!("detection worker stopped");
}
