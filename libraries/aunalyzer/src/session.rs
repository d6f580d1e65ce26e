//! Analysis session: every handle one `analyze` call needs
//!
//! Opening a session probes the container, picks the audio track, opens its
//! decoder and, when loudness is wanted, the meter and conversion stage.
//! Dropping it releases all of them.

use crate::convert::{ConversionBuffer, ConversionStage, FormatConverter};
use crate::error::{AnalyzerError, ErrorKind, Result};
use crate::facts::{
    declared_bit_rate, extension_name, is_audio_track, stream_duration, CodecFacts, CodecFamily,
    ContainerFacts, StreamFacts,
};
use crate::options::{AnalyzeOptions, Verbosity};
use aunalyzer_loudness::LoudnessMeter;
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{
    CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_F32LE,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat;
use tracing::{debug, trace, warn};

pub struct Session {
    pub(crate) format: Box<dyn FormatReader>,
    pub(crate) decoder: Box<dyn Decoder>,
    pub(crate) track_id: u32,
    pub(crate) channels: usize,
    /// Present only when loudness is measured
    pub(crate) meter: Option<LoudnessMeter>,
    /// Present only when the meter needs samples the decoder does not produce as `f32`
    pub(crate) stage: Option<ConversionStage>,
    pub(crate) verbosity: Verbosity,
}

impl Session {
    /// Open `path` and prepare everything the options ask for
    ///
    /// Returns the session together with the stream facts the metadata
    /// heuristics work from.
    pub fn open(path: &Path, options: &AnalyzeOptions) -> Result<(Self, StreamFacts)> {
        let verbosity = options.verbosity;

        if !path.is_file() {
            return Err(AnalyzerError::new(ErrorKind::FileNotFound));
        }
        let file = File::open(path).map_err(|e| {
            AnalyzerError::with_origin(ErrorKind::FileNotFound, SymphoniaError::IoError(e))
        })?;
        let file_size = file.metadata().ok().map(|m| m.len());

        let container = match ContainerFacts::read(path) {
            Ok(container) => container,
            Err(e) => {
                if verbosity.warnings() {
                    warn!(path = %path.display(), "Could not read container properties: {}", e);
                }
                ContainerFacts::default()
            }
        };

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AnalyzerError::with_origin(ErrorKind::NoStream, e))?;
        let format = probed.format;

        let track = select_track(format.as_ref())
            .ok_or_else(|| AnalyzerError::new(ErrorKind::NoStream))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let audio_streams = format.tracks().iter().filter(|t| is_audio_track(t)).count();

        let decoder = open_decoder(&params)?;
        let decoder_params = decoder.codec_params().clone();
        let codec = CodecFamily::from_codec(params.codec);

        if verbosity.stages() {
            debug!(
                track_id,
                codec = ?codec,
                audio_streams,
                "Decoder opened"
            );
        }

        let facts = StreamFacts {
            format_name: container
                .format_name
                .map(str::to_string)
                .or_else(|| extension_name(path)),
            codec,
            track: CodecFacts {
                bit_rate: declared_bit_rate(codec, &params, container.audio_bit_rate),
                ..CodecFacts::from_params(&params)
            },
            decoder: CodecFacts::from_params(&decoder_params),
            side_data: params.extra_data.clone(),
            container_duration: container.duration,
            stream_duration: stream_duration(&params),
            container_bit_rate: container.overall_bit_rate,
            audio_streams,
            file_size,
        };

        let channels = params
            .channels
            .or(decoder_params.channels)
            .map_or(0, |c| c.count());
        let sample_rate = facts.sample_rate().unwrap_or(0);

        let mut session = Self {
            format,
            decoder,
            track_id,
            channels,
            meter: None,
            stage: None,
            verbosity,
        };

        if options.wants_meter() {
            let meter = LoudnessMeter::new(
                sample_rate,
                u32::try_from(channels).unwrap_or(u32::MAX),
                options.measure_range,
            )
            .map_err(|e| AnalyzerError::with_origin(ErrorKind::LoudnessInit, e))?;
            session.meter = Some(meter);

            if decodes_to_float(&decoder_params, codec) {
                if verbosity.stages() {
                    debug!("Decoder produces f32, feeding meter directly");
                }
            } else {
                let frames = decoder_params
                    .max_frames_per_packet
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|&n| n > 0)
                    .unwrap_or(sample_rate as usize);
                session.stage = Some(conversion_stage(channels, frames)?);
                if verbosity.stages() {
                    debug!(channels, frames, "Conversion stage ready");
                }
            }
        }

        Ok((session, facts))
    }

    pub fn has_meter(&self) -> bool {
        self.meter.is_some()
    }

    /// Whether decoded samples go through a conversion buffer
    pub fn has_conversion(&self) -> bool {
        self.stage.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        trace!(
            track_id = self.track_id,
            meter = self.meter.is_some(),
            conversion = self.stage.is_some(),
            "Analysis session closed"
        );
    }
}

/// The container's default track if it carries audio, else the first one that does
fn select_track(format: &dyn FormatReader) -> Option<&Track> {
    format
        .default_track()
        .filter(|track| is_audio_track(track))
        .or_else(|| format.tracks().iter().find(|track| is_audio_track(track)))
}

/// Look up and open a decoder for `params`
pub(crate) fn open_decoder(params: &CodecParameters) -> Result<Box<dyn Decoder>> {
    let registry = symphonia::default::get_codecs();
    if registry.get_codec(params.codec).is_none() {
        return Err(AnalyzerError::new(ErrorKind::NoDecoder));
    }
    registry
        .make(params, &DecoderOptions::default())
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::DecoderInit, e))
}

/// Float-native decoders need no conversion
fn decodes_to_float(params: &CodecParameters, codec: CodecFamily) -> bool {
    match params.sample_format {
        Some(format) => matches!(format, SampleFormat::F32),
        None => {
            codec.decodes_to_float()
                || params.codec == CODEC_TYPE_PCM_F32LE
                || params.codec == CODEC_TYPE_PCM_F32BE
        }
    }
}

pub(crate) fn conversion_stage(channels: usize, frames: usize) -> Result<ConversionStage> {
    let converter = FormatConverter::new(channels)
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::ConverterInit, e))?;
    let buffer = ConversionBuffer::with_capacity(channels, frames)
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::OutOfMemory, e))?;
    Ok(ConversionStage::new(Box::new(converter), buffer))
}
