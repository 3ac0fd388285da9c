//! The decoding worker.
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::acquire::source::{Poll, SampleSource};
use crate::config::{AcquisitionConfig, DecoderConfig};
use crate::decode::{Decoder, DecoderStats};
use crate::error::{DeviceError, Error, Result};
use crate::sink::FrameSink;

const WORKER_NAME: &str = "scopevideo-decoder";

/// Pause between polls of a source that had nothing ready.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Summary returned when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub stats: DecoderStats,
    /// Frames the sink discarded.
    pub frames_dropped: u64,
    /// The source reported the end of its samples before the session was
    /// stopped.
    pub source_finished: bool,
}

struct WorkerExit {
    report: SessionReport,
    error: Option<DeviceError>,
}

type WorkerTask = Box<dyn FnOnce() -> WorkerExit + Send>;

fn spawn_worker(task: WorkerTask) -> io::Result<JoinHandle<WorkerExit>> {
    thread::Builder::new()
        .name(WORKER_NAME.to_string())
        .spawn(task)
}

/// A running acquisition and decoding session.
///
/// The source, the decoder and the sink all live on one worker thread. The
/// only state shared with the caller is the active flag, checked between
/// batches.
///
/// # Examples
///
/// ```
/// use scopevideo::{AcquisitionConfig, ChannelSink, DecoderConfig, Session};
/// use scopevideo::synth::{SyntheticSource, TestPattern};
///
/// let config = DecoderConfig::default();
/// let source = SyntheticSource::new(TestPattern::solid(&config, [10, 20, 30]), 2);
/// let (sink, frames) = ChannelSink::new(4);
///
/// let session = Session::start(source, sink, config, AcquisitionConfig::default()).unwrap();
/// let report = session.wait().unwrap();
///
/// assert_eq!(report.stats.frames_emitted, 2);
/// assert_eq!(frames.try_iter().count(), 2);
/// ```
pub struct Session {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<WorkerExit>>,
}

impl Session {
    /// Open `source` and start decoding on a new worker thread.
    ///
    /// Both configurations are validated first. If the source fails to open,
    /// or the thread cannot be started, the source is closed again and no
    /// worker is left running.
    pub fn start<S, K>(
        source: S,
        sink: K,
        config: DecoderConfig,
        acquisition: AcquisitionConfig,
    ) -> Result<Session>
    where
        S: SampleSource + 'static,
        K: FrameSink + Send + 'static,
    {
        Self::start_with(source, sink, config, acquisition, spawn_worker)
    }

    fn start_with<S, K, F>(
        mut source: S,
        sink: K,
        config: DecoderConfig,
        acquisition: AcquisitionConfig,
        spawn: F,
    ) -> Result<Session>
    where
        S: SampleSource + 'static,
        K: FrameSink + Send + 'static,
        F: FnOnce(WorkerTask) -> io::Result<JoinHandle<WorkerExit>>,
    {
        acquisition.validate(&config.channels)?;
        let decoder = Decoder::new(config)?;

        if let Err(e) = source.open(&acquisition) {
            warn!(error = %e, "failed to open sample source");
            close_quietly(&mut source);
            return Err(e.into());
        }

        let active = Arc::new(AtomicBool::new(true));
        let worker_active = Arc::clone(&active);
        // The worker takes the source out of the slot. If it never starts the
        // source is still here to be closed.
        let slot = Arc::new(Mutex::new(Some(source)));
        let worker_slot = Arc::clone(&slot);
        let task: WorkerTask = Box::new(move || match take_source(&worker_slot) {
            Some(source) => run_worker(source, decoder, sink, worker_active),
            None => WorkerExit {
                report: SessionReport::default(),
                error: None,
            },
        });

        let handle = match spawn(task) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "failed to start decoder thread");
                if let Some(mut source) = take_source(&slot) {
                    close_quietly(&mut source);
                }
                return Err(DeviceError::Spawn(e).into());
            }
        };

        info!(
            sample_rate_hz = acquisition.sample_rate_hz(),
            buffer_samples = acquisition.buffer_samples,
            "session started"
        );
        Ok(Session {
            active,
            handle: Some(handle),
        })
    }

    /// Whether the worker is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop decoding and wait for the worker.
    ///
    /// The batch in flight is finished before the source is closed. A device
    /// error that ended the worker early is returned here.
    pub fn stop(mut self) -> Result<SessionReport> {
        self.active.store(false, Ordering::Release);
        self.join()
    }

    /// Wait until the source runs out of samples, then shut down like
    /// [`stop`](Self::stop).
    pub fn wait(mut self) -> Result<SessionReport> {
        self.join()
    }

    fn join(&mut self) -> Result<SessionReport> {
        let Some(handle) = self.handle.take() else {
            return Ok(SessionReport::default());
        };
        let exit = handle.join().map_err(|_| Error::WorkerPanicked)?;
        info!(
            frames = exit.report.stats.frames_emitted,
            dropped = exit.report.frames_dropped,
            samples = exit.report.stats.samples,
            "session stopped"
        );
        match exit.error {
            Some(e) => Err(e.into()),
            None => Ok(exit.report),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.active.store(false, Ordering::Release);
            if let Err(e) = self.join() {
                warn!(error = %e, "session ended with an error");
            }
        }
    }
}

fn take_source<S>(slot: &Mutex<Option<S>>) -> Option<S> {
    slot.lock().ok().and_then(|mut source| source.take())
}

fn close_quietly<S: SampleSource>(source: &mut S) {
    if let Err(e) = source.close() {
        warn!(error = %e, "failed to close sample source");
    }
}

fn run_worker<S, K>(mut source: S, mut decoder: Decoder, mut sink: K, active: Arc<AtomicBool>) -> WorkerExit
where
    S: SampleSource,
    K: FrameSink,
{
    let mut error = None;
    let mut source_finished = false;

    while active.load(Ordering::Acquire) {
        match source.poll(&mut |batch| decoder.push_batch(batch, &mut sink)) {
            Ok(Poll::Delivered(_)) => {}
            Ok(Poll::Idle) => thread::sleep(IDLE_BACKOFF),
            Ok(Poll::Finished) => {
                source_finished = true;
                break;
            }
            Err(e) => {
                warn!(error = %e, "sample source failed, stopping");
                error = Some(e);
                break;
            }
        }
    }

    if let Err(e) = source.close() {
        warn!(error = %e, "failed to close sample source");
        error.get_or_insert(e);
    }

    WorkerExit {
        report: SessionReport {
            stats: decoder.stats(),
            frames_dropped: sink.dropped(),
            source_finished,
        },
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Frame;
    use crate::sample::SampleBuffer;

    /// Records lifecycle calls and serves one batch per poll.
    struct ScriptedSource {
        log: Arc<Mutex<Vec<&'static str>>>,
        fail_open: bool,
        fail_after: Option<usize>,
        batches: usize,
        buffer: SampleBuffer,
    }

    impl ScriptedSource {
        fn new(log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                log: Arc::clone(log),
                fail_open: false,
                fail_after: None,
                batches: 0,
                buffer: (0..16).map(|_| [0, 0, 0, 100]).collect(),
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn open(&mut self, _config: &AcquisitionConfig) -> std::result::Result<(), DeviceError> {
            self.log.lock().unwrap().push("open");
            if self.fail_open {
                return Err(DeviceError::Unavailable("no scope attached".to_string()));
            }
            Ok(())
        }

        fn poll(
            &mut self,
            deliver: &mut dyn FnMut(crate::sample::SampleBatch<'_>),
        ) -> std::result::Result<Poll, DeviceError> {
            if self.fail_after == Some(self.batches) {
                return Err(DeviceError::Stream("usb transfer failed".to_string()));
            }
            self.batches += 1;
            deliver(self.buffer.as_batch());
            Ok(Poll::Delivered(self.buffer.len()))
        }

        fn close(&mut self) -> std::result::Result<(), DeviceError> {
            self.log.lock().unwrap().push("close");
            Ok(())
        }
    }

    #[test]
    fn test_open_failure_closes_without_thread() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut source = ScriptedSource::new(&log);
        source.fail_open = true;

        let result = Session::start(
            source,
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
        );
        assert!(matches!(result, Err(Error::Device(DeviceError::Unavailable(_)))));
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[test]
    fn test_spawn_failure_closes_opened_source() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let result = Session::start_with(
            ScriptedSource::new(&log),
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
            |_task| Err(io::Error::other("thread limit reached")),
        );
        assert!(matches!(result, Err(Error::Device(DeviceError::Spawn(_)))));
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[test]
    fn test_worker_runs_through_spawn_seam() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut source = ScriptedSource::new(&log);
        source.fail_after = Some(2);
        let session = Session::start_with(
            source,
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
            spawn_worker,
        )
        .unwrap();

        let result = session.wait();
        assert!(matches!(result, Err(Error::Device(DeviceError::Stream(_)))));
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[test]
    fn test_invalid_config_never_opens() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = DecoderConfig {
            baseline_window: 0,
            ..Default::default()
        };
        let result = Session::start(
            ScriptedSource::new(&log),
            Vec::<Frame>::new(),
            config,
            AcquisitionConfig::default(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_closes_source() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::start(
            ScriptedSource::new(&log),
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(5));
        let report = session.stop().unwrap();

        assert!(!report.source_finished);
        assert_eq!(report.stats.samples % 16, 0);
        assert_eq!(report.stats.frames_emitted, 0);
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[test]
    fn test_stream_error_reported_on_stop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut source = ScriptedSource::new(&log);
        source.fail_after = Some(3);
        let session = Session::start(
            source,
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
        )
        .unwrap();

        let result = session.wait();
        assert!(matches!(result, Err(Error::Device(DeviceError::Stream(_)))));
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }

    #[test]
    fn test_drop_stops_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let session = Session::start(
            ScriptedSource::new(&log),
            Vec::<Frame>::new(),
            DecoderConfig::default(),
            AcquisitionConfig::default(),
        )
        .unwrap();
        assert!(session.is_running());
        drop(session);
        assert_eq!(*log.lock().unwrap(), vec!["open", "close"]);
    }
}
