//! Sample-format conversion stage
//!
//! Decoders that do not produce `f32` hand their frames to a
//! [`SampleConverter`], which writes interleaved `f32` into a
//! [`ConversionBuffer`] at the same rate and channel layout. The stage makes
//! sure the buffer can hold everything the converter may emit before each call.

use crate::error::{AnalyzerError, ErrorKind, Result};
use std::collections::TryReserveError;
use std::mem;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::conv::IntoSample;
use symphonia::core::sample::Sample;
use thiserror::Error;
use tracing::trace;

/// Bytes per converted sample
pub const SAMPLE_BYTES: usize = mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to allocate conversion buffer: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Invalid channel count: {0}")]
    InvalidChannels(usize),

    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Output buffer too small: need {required} samples, have room for {available}")]
    Overflow { required: usize, available: usize },
}

/// Interleaved `f32` output of the conversion stage
///
/// Capacity only ever grows. Growing discards the current content.
#[derive(Debug)]
pub struct ConversionBuffer {
    samples: Vec<f32>,
    channels: usize,
}

impl ConversionBuffer {
    /// Allocate room for `frames` frames of `channels` channels
    pub fn with_capacity(channels: usize, frames: usize) -> std::result::Result<Self, ConvertError> {
        if channels == 0 {
            return Err(ConvertError::InvalidChannels(channels));
        }
        let mut samples = Vec::new();
        samples.try_reserve_exact(frames.saturating_mul(channels))?;
        Ok(Self { samples, channels })
    }

    /// Make room for at least `frames` frames
    ///
    /// Returns whether the buffer was reallocated.
    pub fn ensure_capacity(&mut self, frames: usize) -> std::result::Result<bool, ConvertError> {
        let required_bytes = frames
            .saturating_mul(self.channels)
            .saturating_mul(SAMPLE_BYTES);
        if required_bytes <= self.byte_capacity() {
            return Ok(false);
        }

        trace!(
            from_bytes = self.byte_capacity(),
            to_bytes = required_bytes,
            "Growing conversion buffer"
        );
        // Release first so the old and new allocations never coexist
        self.samples = Vec::new();
        self.samples
            .try_reserve_exact(frames.saturating_mul(self.channels))?;
        Ok(true)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn byte_capacity(&self) -> usize {
        self.samples.capacity() * SAMPLE_BYTES
    }

    /// Capacity in whole frames
    pub fn frame_capacity(&self) -> usize {
        self.samples.capacity() / self.channels
    }

    /// Converted samples, interleaved
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of whole frames currently held
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Append `frames` frames without ever reallocating
    pub fn extend_frames<I>(&mut self, frames: usize, samples: I) -> std::result::Result<(), ConvertError>
    where
        I: IntoIterator<Item = f32>,
    {
        let required = self.samples.len() + frames * self.channels;
        if required > self.samples.capacity() {
            return Err(ConvertError::Overflow {
                required,
                available: self.samples.capacity(),
            });
        }
        self.samples
            .extend(samples.into_iter().take(frames * self.channels));
        Ok(())
    }
}

/// Converts decoded frames of any sample format to interleaved `f32`
pub trait SampleConverter: Send {
    /// Frames buffered inside the converter that the next call may emit
    fn delay(&self) -> std::result::Result<usize, ConvertError>;

    /// Convert `input` into `out`, or drain buffered frames when `input` is
    /// `None`; returns the frames written
    fn convert(
        &mut self,
        input: Option<&AudioBufferRef<'_>>,
        out: &mut ConversionBuffer,
    ) -> std::result::Result<usize, ConvertError>;
}

/// Straight format conversion with no buffering
#[derive(Debug)]
pub struct FormatConverter {
    channels: usize,
}

impl FormatConverter {
    pub fn new(channels: usize) -> std::result::Result<Self, ConvertError> {
        if channels == 0 {
            return Err(ConvertError::InvalidChannels(channels));
        }
        Ok(Self { channels })
    }
}

impl SampleConverter for FormatConverter {
    fn delay(&self) -> std::result::Result<usize, ConvertError> {
        Ok(0)
    }

    fn convert(
        &mut self,
        input: Option<&AudioBufferRef<'_>>,
        out: &mut ConversionBuffer,
    ) -> std::result::Result<usize, ConvertError> {
        let Some(input) = input else {
            return Ok(0);
        };
        if out.channels() != self.channels {
            return Err(ConvertError::ChannelMismatch {
                expected: self.channels,
                actual: out.channels(),
            });
        }

        match input {
            AudioBufferRef::U8(buf) => interleave(buf, out),
            AudioBufferRef::U16(buf) => interleave(buf, out),
            AudioBufferRef::U24(buf) => interleave(buf, out),
            AudioBufferRef::U32(buf) => interleave(buf, out),
            AudioBufferRef::S8(buf) => interleave(buf, out),
            AudioBufferRef::S16(buf) => interleave(buf, out),
            AudioBufferRef::S24(buf) => interleave(buf, out),
            AudioBufferRef::S32(buf) => interleave(buf, out),
            AudioBufferRef::F32(buf) => interleave(buf, out),
            AudioBufferRef::F64(buf) => interleave(buf, out),
        }
    }
}

fn interleave<S>(buf: &AudioBuffer<S>, out: &mut ConversionBuffer) -> std::result::Result<usize, ConvertError>
where
    S: Sample + IntoSample<f32>,
{
    let channels = buf.spec().channels.count();
    if channels != out.channels() {
        return Err(ConvertError::ChannelMismatch {
            expected: out.channels(),
            actual: channels,
        });
    }

    let frames = buf.frames();
    let planes: Vec<&[S]> = (0..channels).map(|ch| buf.chan(ch)).collect();
    out.extend_frames(
        frames,
        (0..frames).flat_map(|frame| planes.iter().map(move |plane| plane[frame].into_sample())),
    )?;
    Ok(frames)
}

/// A converter plus the buffer it writes into
pub struct ConversionStage {
    converter: Box<dyn SampleConverter>,
    buffer: ConversionBuffer,
}

impl ConversionStage {
    pub fn new(converter: Box<dyn SampleConverter>, buffer: ConversionBuffer) -> Self {
        Self { converter, buffer }
    }

    pub fn buffer(&self) -> &ConversionBuffer {
        &self.buffer
    }

    /// Convert one decoded frame, or drain the converter with `None`
    ///
    /// Before converting, the buffer is grown to hold the converter's delay
    /// plus the input frames.
    pub fn process(&mut self, input: Option<&AudioBufferRef<'_>>) -> Result<&[f32]> {
        let delay = self
            .converter
            .delay()
            .map_err(|e| AnalyzerError::with_origin(ErrorKind::Conversion, e))?;
        let frames = input.map_or(0, |buf| buf.frames());

        self.buffer
            .ensure_capacity(delay + frames)
            .map_err(|e| AnalyzerError::with_origin(ErrorKind::OutOfMemory, e))?;

        self.buffer.clear();
        self.converter
            .convert(input, &mut self.buffer)
            .map_err(|e| AnalyzerError::with_origin(ErrorKind::Conversion, e))?;
        Ok(self.buffer.samples())
    }
}

impl std::fmt::Debug for ConversionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionStage")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use symphonia::core::audio::{AsAudioBufferRef, Channels, SignalSpec};

    fn stereo_s16(frames: usize) -> AudioBuffer<i16> {
        let spec = SignalSpec::new(44100, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::<i16>::new(frames as u64, spec);
        buf.render_reserved(Some(frames));
        for (i, s) in buf.chan_mut(0).iter_mut().enumerate() {
            *s = i as i16;
        }
        for s in buf.chan_mut(1).iter_mut() {
            *s = i16::MIN;
        }
        buf
    }

    /// Holds back `delay` frames of silence and releases them on drain,
    /// checking the buffer was sized for them every time.
    struct DelayingConverter {
        delay: usize,
        inner: FormatConverter,
        calls: usize,
    }

    impl SampleConverter for DelayingConverter {
        fn delay(&self) -> std::result::Result<usize, ConvertError> {
            Ok(self.delay)
        }

        fn convert(
            &mut self,
            input: Option<&AudioBufferRef<'_>>,
            out: &mut ConversionBuffer,
        ) -> std::result::Result<usize, ConvertError> {
            self.calls += 1;
            let frames = input.map_or(0, |buf| buf.frames());
            let needed = (self.delay + frames) * out.channels() * SAMPLE_BYTES;
            assert!(out.byte_capacity() >= needed, "buffer undersized");

            let written = self.inner.convert(input, out)?;
            out.extend_frames(self.delay, std::iter::repeat(0.0))?;
            Ok(written + self.delay)
        }
    }

    #[test]
    fn buffer_grows_only() {
        let mut buffer = ConversionBuffer::with_capacity(2, 1024).unwrap();
        assert!(buffer.byte_capacity() >= 1024 * 2 * 4);

        assert!(!buffer.ensure_capacity(512).unwrap());
        assert!(buffer.frame_capacity() >= 1024);

        assert!(buffer.ensure_capacity(4096).unwrap());
        assert!(buffer.frame_capacity() >= 4096);

        assert!(!buffer.ensure_capacity(1).unwrap());
        assert!(buffer.frame_capacity() >= 4096);
    }

    #[test]
    fn zero_channels_rejected() {
        assert!(matches!(
            ConversionBuffer::with_capacity(0, 10),
            Err(ConvertError::InvalidChannels(0))
        ));
        assert!(FormatConverter::new(0).is_err());
    }

    #[test]
    fn extend_never_reallocates() {
        let mut buffer = ConversionBuffer::with_capacity(1, 4).unwrap();
        let capacity = buffer.byte_capacity();
        let err = buffer
            .extend_frames(capacity / SAMPLE_BYTES + 1, std::iter::repeat(0.0))
            .unwrap_err();
        assert!(matches!(err, ConvertError::Overflow { .. }));
        assert!(err.to_string().starts_with("Output buffer too small"));
        assert_eq!(buffer.byte_capacity(), capacity);
    }

    #[test]
    fn format_converter_interleaves_and_scales() {
        let decoded = stereo_s16(4);
        let mut stage = ConversionStage::new(
            Box::new(FormatConverter::new(2).unwrap()),
            ConversionBuffer::with_capacity(2, 2).unwrap(),
        );

        let out = stage.process(Some(&decoded.as_audio_buffer_ref())).unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], -1.0);
        assert!((out[2] - 1.0 / 32768.0).abs() < 1e-9);
        assert_eq!(out[3], -1.0);

        // Drain emits nothing for a converter without delay
        assert!(stage.process(None).unwrap().is_empty());
    }

    #[test]
    fn channel_mismatch_is_conversion_error() {
        let decoded = stereo_s16(4);
        let mut stage = ConversionStage::new(
            Box::new(FormatConverter::new(2).unwrap()),
            ConversionBuffer::with_capacity(1, 16).unwrap(),
        );
        let err = stage.process(Some(&decoded.as_audio_buffer_ref())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    proptest! {
        #[test]
        fn capacity_covers_delay_plus_frames(
            delay in 0usize..4096,
            sizes in proptest::collection::vec(1usize..8192, 1..8),
        ) {
            let mut stage = ConversionStage::new(
                Box::new(DelayingConverter {
                    delay,
                    inner: FormatConverter::new(2).unwrap(),
                    calls: 0,
                }),
                ConversionBuffer::with_capacity(2, 64).unwrap(),
            );

            for frames in sizes {
                let decoded = stereo_s16(frames);
                let out = stage.process(Some(&decoded.as_audio_buffer_ref())).unwrap();
                prop_assert_eq!(out.len(), (frames + delay) * 2);
            }
            let drained = stage.process(None).unwrap();
            prop_assert_eq!(drained.len(), delay * 2);
        }
    }
}
