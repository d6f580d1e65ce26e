//! Decode, convert and measure loop
//!
//! ```text
//! NeedInput ──packet──> HaveFrame ──> NeedInput
//!     │
//!     └──end of stream──> Flushing ──> Done
//! ```
//!
//! Every error is fatal; there is no per-packet retry.

use crate::convert::ConversionStage;
use crate::error::{AnalyzerError, ErrorKind, Result};
use crate::session::{conversion_stage, Session};
use aunalyzer_loudness::LoudnessMeter;
use std::io::ErrorKind as IoErrorKind;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::debug;

enum LoopState {
    NeedInput,
    HaveFrame(Packet),
    Flushing,
    Done,
}

/// Decode the selected track to the end, feeding the meter if there is one
///
/// Returns the number of frames (samples per channel) decoded.
pub fn run(session: &mut Session) -> Result<u64> {
    let Session {
        format,
        decoder,
        track_id,
        channels,
        meter,
        stage,
        verbosity,
    } = session;

    let mut total_frames: u64 = 0;
    let mut state = LoopState::NeedInput;

    loop {
        state = match state {
            LoopState::NeedInput => match format.next_packet() {
                Ok(packet) if packet.track_id() != *track_id => LoopState::NeedInput,
                Ok(packet) => LoopState::HaveFrame(packet),
                Err(SymphoniaError::IoError(e)) if e.kind() == IoErrorKind::UnexpectedEof => {
                    LoopState::Flushing
                }
                // Chained streams reset at the end of the one being read
                Err(SymphoniaError::ResetRequired) => LoopState::Flushing,
                Err(e) => return Err(AnalyzerError::with_origin(ErrorKind::Decode, e)),
            },

            LoopState::HaveFrame(packet) => {
                let decoded = decoder
                    .decode(&packet)
                    .map_err(|e| AnalyzerError::with_origin(ErrorKind::Decode, e))?;
                total_frames += decoded.frames() as u64;

                if let Some(meter) = meter.as_mut() {
                    match (&decoded, stage.as_mut()) {
                        (AudioBufferRef::F32(buf), None) => feed_planar(meter, buf)?,
                        (_, Some(stage)) => feed_converted(meter, stage, Some(&decoded))?,
                        (_, None) => {
                            // The codec parameters promised f32 and the decoder disagreed
                            if verbosity.stages() {
                                debug!("Decoder output is not f32, adding conversion stage");
                            }
                            let stage =
                                stage.insert(conversion_stage(*channels, decoded.capacity())?);
                            feed_converted(meter, stage, Some(&decoded))?;
                        }
                    }
                }
                LoopState::NeedInput
            }

            LoopState::Flushing => {
                if verbosity.stages() {
                    debug!(total_frames, "End of stream, flushing");
                }
                decoder.finalize();
                if let (Some(meter), Some(stage)) = (meter.as_mut(), stage.as_mut()) {
                    feed_converted(meter, stage, None)?;
                }
                LoopState::Done
            }

            LoopState::Done => break,
        };
    }

    Ok(total_frames)
}

/// Feed a float-native frame straight to the meter, one plane per channel
fn feed_planar(meter: &mut LoudnessMeter, buf: &AudioBuffer<f32>) -> Result<()> {
    let planes = buf.planes();
    meter
        .add_planar(planes.planes())
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::Loudness, e))
}

/// Convert one decoded frame, or drain the converter's tail when `input` is
/// `None`, and feed the result to the meter
fn feed_converted(
    meter: &mut LoudnessMeter,
    stage: &mut ConversionStage,
    input: Option<&AudioBufferRef<'_>>,
) -> Result<()> {
    let samples = stage.process(input)?;
    if samples.is_empty() {
        return Ok(());
    }
    meter
        .add_interleaved(samples)
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::Loudness, e))
}
