use tracing::debug;

use crate::config::AcquisitionConfig;
use crate::error::DeviceError;
use crate::sample::SampleBatch;

/// Outcome of one [`SampleSource::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// This many samples were delivered, possibly over several batches.
    Delivered(usize),
    /// Nothing was ready; poll again later.
    Idle,
    /// The source has no more samples and never will.
    Finished,
}

/// A streaming four-channel sample source, typically an oscilloscope.
///
/// The lifecycle is `open`, any number of `poll` calls, then `close`.
/// Batches delivered across polls continue the same logical sample index
/// without gaps or overlap; the decoder relies on that for its timing.
pub trait SampleSource: Send {
    /// Acquire the device, configure its channels and start streaming.
    fn open(&mut self, config: &AcquisitionConfig) -> Result<(), DeviceError>;

    /// Deliver whatever samples are ready through `deliver`.
    ///
    /// A batch borrows the source's buffers only for the duration of the
    /// callback.
    fn poll(&mut self, deliver: &mut dyn FnMut(SampleBatch<'_>)) -> Result<Poll, DeviceError>;

    /// Stop streaming and release the device. Must be safe to call when
    /// `open` failed or was never called.
    fn close(&mut self) -> Result<(), DeviceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn open(&mut self, config: &AcquisitionConfig) -> Result<(), DeviceError> {
        (**self).open(config)
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(SampleBatch<'_>)) -> Result<Poll, DeviceError> {
        (**self).poll(deliver)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
}

/// Log the front-end setup a source was opened with.
pub(crate) fn log_setup(config: &AcquisitionConfig) {
    debug!(
        sample_rate_hz = config.sample_rate_hz(),
        resolution_bits = config.resolution_bits,
        buffer_samples = config.buffer_samples,
        "acquisition setup"
    );
    for (channel, setup) in config.channels.iter().enumerate().filter(|(_, s)| s.enabled) {
        let (low, high) = setup.input_window();
        debug!(
            channel,
            coupling = ?setup.coupling,
            low_volts = low,
            high_volts = high,
            "channel setup"
        );
    }
}
