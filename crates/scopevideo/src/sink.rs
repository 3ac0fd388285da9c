//! Frame delivery.
//!
//! The decoder hands every completed frame to a [`FrameSink`]. A sink runs on
//! the decoding thread, so it must not block: [`ChannelSink`] drops frames
//! when the consumer falls behind rather than stalling acquisition.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::warn;

use crate::decode::Frame;

/// Receiver of completed frames.
pub trait FrameSink {
    /// Take ownership of a completed frame.
    ///
    /// Called on the decoding thread; implementations should return quickly.
    fn deliver_frame(&mut self, frame: Frame);

    /// Frames this sink has discarded instead of delivering.
    fn dropped(&self) -> u64 {
        0
    }
}

/// Collects every frame, mostly useful for offline decoding and tests.
impl FrameSink for Vec<Frame> {
    fn deliver_frame(&mut self, frame: Frame) {
        self.push(frame);
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn deliver_frame(&mut self, frame: Frame) {
        (**self).deliver_frame(frame);
    }

    fn dropped(&self) -> u64 {
        (**self).dropped()
    }
}

/// Sink calling a closure, created by [`from_fn`].
pub struct FnSink<F>(F);

impl<F: FnMut(Frame)> FrameSink for FnSink<F> {
    fn deliver_frame(&mut self, frame: Frame) {
        (self.0)(frame);
    }
}

/// Wrap a closure as a [`FrameSink`].
///
/// # Examples
///
/// ```
/// use scopevideo::decode::FrameBuffer;
/// use scopevideo::sink::{self, FrameSink};
///
/// let mut count = 0;
/// let mut sink = sink::from_fn(|_frame| count += 1);
/// sink.deliver_frame(FrameBuffer::new(1, 1).snapshot(0));
/// drop(sink);
/// assert_eq!(count, 1);
/// ```
pub fn from_fn<F: FnMut(Frame)>(f: F) -> FnSink<F> {
    FnSink(f)
}

/// Forwards frames over a bounded channel to another thread.
///
/// When the channel is full the frame is dropped and counted; once the
/// receiver is gone every frame is dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel.
    ///
    /// `capacity` is the number of frames that may be queued; zero is
    /// treated as one.
    pub fn new(capacity: usize) -> (ChannelSink, Receiver<Frame>) {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        let sink = ChannelSink {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, receiver)
    }

    /// Shared handle to the drop counter, readable after the sink has moved
    /// to the decoding thread.
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

impl FrameSink for ChannelSink {
    fn deliver_frame(&mut self, frame: Frame) {
        match self.sender.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(timestamp = frame.timestamp, dropped, "frame consumer lagging, frame dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Frames dropped so far because the consumer was not keeping up or
    /// had gone away.
    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FrameBuffer;

    fn frame(timestamp: u64) -> Frame {
        FrameBuffer::new(2, 2).snapshot(timestamp)
    }

    #[test]
    fn test_vec_collects_in_order() {
        let mut frames: Vec<Frame> = Vec::new();
        frames.deliver_frame(frame(1));
        frames.deliver_frame(frame(2));
        assert_eq!(frames.iter().map(|f| f.timestamp).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_from_fn() {
        let mut seen = Vec::new();
        {
            let mut sink = from_fn(|f: Frame| seen.push(f.timestamp));
            sink.deliver_frame(frame(7));
        }
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, receiver) = ChannelSink::new(2);
        for timestamp in 0..5 {
            sink.deliver_frame(frame(timestamp));
        }
        assert_eq!(sink.dropped(), 3);
        let received: Vec<u64> = receiver.try_iter().map(|f| f.timestamp).collect();
        assert_eq!(received, vec![0, 1]);
    }

    #[test]
    fn test_channel_sink_after_receiver_gone() {
        let (mut sink, receiver) = ChannelSink::new(1);
        let counter = sink.dropped_counter();
        drop(receiver);
        sink.deliver_frame(frame(0));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
