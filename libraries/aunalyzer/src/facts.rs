//! Probed stream facts
//!
//! A plain snapshot of everything the container, the track's codec parameters
//! and the opened decoder declared about the selected stream. The metadata
//! heuristics run on this snapshot only, so they stay pure and testable
//! without any media file.

use lofty::{AudioFile, FileType, TaggedFileExt};
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::{
    CodecParameters, CodecType, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP1,
    CODEC_TYPE_MP2, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_OPUS, CODEC_TYPE_VORBIS,
    CODEC_TYPE_WAVPACK,
};
use symphonia::core::formats::Track;
use symphonia::core::sample::SampleFormat;

/// Codec families the heuristics distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFamily {
    /// Uncompressed PCM of any sample format
    Pcm,
    Flac,
    Alac,
    WavPack,
    /// MPEG audio layers I-III
    Mpeg,
    Vorbis,
    Opus,
    Aac,
    Other,
}

impl CodecFamily {
    pub fn from_codec(codec: CodecType) -> Self {
        if codec == CODEC_TYPE_FLAC {
            Self::Flac
        } else if codec == CODEC_TYPE_ALAC {
            Self::Alac
        } else if codec == CODEC_TYPE_WAVPACK {
            Self::WavPack
        } else if codec == CODEC_TYPE_MP3 || codec == CODEC_TYPE_MP2 || codec == CODEC_TYPE_MP1 {
            Self::Mpeg
        } else if codec == CODEC_TYPE_VORBIS {
            Self::Vorbis
        } else if codec == CODEC_TYPE_OPUS {
            Self::Opus
        } else if codec == CODEC_TYPE_AAC {
            Self::Aac
        } else if is_pcm(codec) {
            Self::Pcm
        } else {
            Self::Other
        }
    }

    /// Compressed formats that keep every bit of the source
    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Flac | Self::Alac | Self::WavPack)
    }

    /// Perceptual codecs with no meaningful source bit depth
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Mpeg | Self::Vorbis | Self::Opus | Self::Aac)
    }

    /// Families whose symphonia decoders always produce `f32` buffers even
    /// when the codec parameters leave the sample format unset
    pub fn decodes_to_float(self) -> bool {
        matches!(self, Self::Mpeg | Self::Vorbis | Self::Aac)
    }
}

/// PCM codecs are recognised by their registered short name (`pcm_s16le`,
/// `pcm_f32be`, ...) rather than by enumerating every variant
fn is_pcm(codec: CodecType) -> bool {
    symphonia::default::get_codecs()
        .get_codec(codec)
        .is_some_and(|desc| desc.short_name.starts_with("pcm_"))
}

/// Width of one sample in bits
pub fn sample_width(format: SampleFormat) -> u32 {
    match format {
        SampleFormat::U8 | SampleFormat::S8 => 8,
        SampleFormat::U16 | SampleFormat::S16 => 16,
        SampleFormat::U24 | SampleFormat::S24 => 24,
        SampleFormat::U32 | SampleFormat::S32 | SampleFormat::F32 => 32,
        SampleFormat::F64 => 64,
    }
}

/// One set of codec parameters, as declared by either the track or the decoder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecFacts {
    /// Bits per sample as stored in the stream
    pub bits_per_coded_sample: Option<u32>,
    /// Bits per sample produced on output
    pub bits_per_sample: Option<u32>,
    pub sample_rate: Option<u32>,
    /// Width of the native sample format, in bits
    pub sample_width: Option<u32>,
    /// Declared bit rate in bits/s
    pub bit_rate: Option<u32>,
}

impl CodecFacts {
    pub fn from_params(params: &CodecParameters) -> Self {
        Self {
            bits_per_coded_sample: params.bits_per_coded_sample,
            bits_per_sample: params.bits_per_sample,
            sample_rate: params.sample_rate,
            sample_width: params.sample_format.map(sample_width),
            bit_rate: None,
        }
    }
}

/// Bit rate the codec declares for the track, in bits/s
///
/// PCM carries its rate exactly in the stream layout. Compressed codecs fall
/// back to the container's audio bit rate, which lofty reports in whole kbps.
pub fn declared_bit_rate(
    codec: CodecFamily,
    params: &CodecParameters,
    container_audio_bit_rate: Option<u32>,
) -> Option<u32> {
    if codec != CodecFamily::Pcm {
        return container_audio_bit_rate;
    }
    let bits = params
        .bits_per_coded_sample
        .or(params.bits_per_sample)
        .filter(|&b| b > 0)?;
    let channels = u32::try_from(params.channels?.count()).ok()?;
    params
        .sample_rate?
        .checked_mul(channels)?
        .checked_mul(bits)
}

/// Everything known about the selected stream before decoding
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFacts {
    pub format_name: Option<String>,
    pub codec: CodecFamily,
    /// Parameters the container declared for the track
    pub track: CodecFacts,
    /// Parameters the opened decoder reports
    pub decoder: CodecFacts,
    /// Codec private data (FLAC STREAMINFO, ALAC magic cookie, ...)
    pub side_data: Option<Box<[u8]>>,
    pub container_duration: Option<Duration>,
    pub stream_duration: Option<Duration>,
    /// Average bit rate over the whole container, in bits/s
    pub container_bit_rate: Option<u32>,
    /// Number of audio streams in the container
    pub audio_streams: usize,
    pub file_size: Option<u64>,
}

impl Default for StreamFacts {
    fn default() -> Self {
        Self {
            format_name: None,
            codec: CodecFamily::Other,
            track: CodecFacts::default(),
            decoder: CodecFacts::default(),
            side_data: None,
            container_duration: None,
            stream_duration: None,
            container_bit_rate: None,
            audio_streams: 1,
            file_size: None,
        }
    }
}

impl StreamFacts {
    /// Sample rate from the track parameters, else the decoder
    pub fn sample_rate(&self) -> Option<u32> {
        self.track
            .sample_rate
            .filter(|&rate| rate > 0)
            .or(self.decoder.sample_rate.filter(|&rate| rate > 0))
    }
}

/// True for tracks that carry audio rather than subtitles, cover art or nothing
pub fn is_audio_track(track: &Track) -> bool {
    let params = &track.codec_params;
    params.codec != CODEC_TYPE_NULL && (params.sample_rate.is_some() || params.channels.is_some())
}

/// Stream-level duration: frame count scaled by the track's time base
pub fn stream_duration(params: &CodecParameters) -> Option<Duration> {
    let frames = params.n_frames?;
    match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(frames);
            Some(Duration::from_secs_f64(time.seconds as f64 + time.frac))
        }
        (None, Some(rate)) if rate > 0 => Some(Duration::from_secs_f64(frames as f64 / rate as f64)),
        _ => None,
    }
}

/// Container-level properties read independently of the decoder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerFacts {
    pub format_name: Option<&'static str>,
    pub duration: Option<Duration>,
    /// Overall bit rate in bits/s
    pub overall_bit_rate: Option<u32>,
    /// Audio stream bit rate in bits/s
    pub audio_bit_rate: Option<u32>,
}

impl ContainerFacts {
    pub fn read(path: &Path) -> lofty::error::Result<Self> {
        let tagged_file = lofty::read_from_path(path)?;
        let properties = tagged_file.properties();

        let duration = Some(properties.duration()).filter(|d| !d.is_zero());

        Ok(Self {
            format_name: container_name(tagged_file.file_type()),
            duration,
            overall_bit_rate: properties.overall_bitrate().map(kbps_to_bps),
            audio_bit_rate: properties.audio_bitrate().map(kbps_to_bps),
        })
    }
}

fn kbps_to_bps(kbps: u32) -> u32 {
    kbps.saturating_mul(1000)
}

#[allow(unreachable_patterns)]
fn container_name(file_type: FileType) -> Option<&'static str> {
    let name = match file_type {
        FileType::Aac => "aac",
        FileType::Aiff => "aiff",
        FileType::Ape => "ape",
        FileType::Flac => "flac",
        FileType::Mpeg => "mp3",
        FileType::Mp4 => "mp4",
        FileType::Mpc => "mpc",
        FileType::Opus | FileType::Vorbis | FileType::Speex => "ogg",
        FileType::Wav => "wav",
        FileType::WavPack => "wv",
        _ => return None,
    };
    Some(name)
}

/// Format name from the file extension, used when the container could not be parsed
pub fn extension_name(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}
