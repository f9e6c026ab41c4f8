/// Decoded audio data for one participant callback (16-bit PCM, interleaved).
///
/// Frames arrive already decoded; codec work happens on the transport side.
/// Arrival time is not part of the frame — the capture layer timestamps
/// frames against a monotonic clock as they come in.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}
