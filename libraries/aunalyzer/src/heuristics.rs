//! Bit depth and bit rate inference
//!
//! Containers and codecs report these inconsistently, so each value is taken
//! from the first tier in a fixed priority list that has an answer. Tiers are
//! plain functions over [`StreamFacts`] and never touch the file.

use crate::error::{AnalyzerError, ErrorKind, Result};
use crate::facts::{CodecFamily, StreamFacts};
use crate::info::TrackInfo;
use crate::options::Verbosity;
use std::time::Duration;
use tracing::debug;

/// Depth assumed for compressed streams that declare nothing
pub const DEFAULT_BIT_DEPTH: u32 = 16;

type Tier<T> = (&'static str, fn(&StreamFacts) -> Option<T>);

/// Bit depth tiers, highest priority first
pub const BIT_DEPTH_TIERS: &[Tier<u32>] = &[
    ("track coded sample bits", |f| positive(f.track.bits_per_coded_sample)),
    ("decoder coded sample bits", |f| positive(f.decoder.bits_per_coded_sample)),
    ("track sample bits", |f| positive(f.track.bits_per_sample)),
    ("decoder sample bits", |f| positive(f.decoder.bits_per_sample)),
    ("pcm sample width", pcm_sample_width),
    ("codec default", compressed_default),
    ("native sample width", |f| {
        Some(positive(f.decoder.sample_width).unwrap_or(DEFAULT_BIT_DEPTH))
    }),
];

/// Bit rate tiers, highest priority first; the size/duration estimate runs
/// only when all of them come up empty
pub const BIT_RATE_TIERS: &[Tier<u32>] = &[
    ("codec bit rate", |f| positive(f.track.bit_rate)),
    ("container bit rate", container_share),
    ("decoder bit rate", |f| positive(f.decoder.bit_rate)),
];

fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|&v| v > 0)
}

fn pcm_sample_width(facts: &StreamFacts) -> Option<u32> {
    if facts.codec != CodecFamily::Pcm {
        return None;
    }
    positive(facts.decoder.sample_width).or(positive(facts.track.sample_width))
}

fn compressed_default(facts: &StreamFacts) -> Option<u32> {
    let side_data = facts.side_data.as_deref();
    match facts.codec {
        CodecFamily::Flac => Some(side_data.and_then(flac_bit_depth).unwrap_or(DEFAULT_BIT_DEPTH)),
        CodecFamily::Alac => Some(side_data.and_then(alac_bit_depth).unwrap_or(DEFAULT_BIT_DEPTH)),
        family if family.is_lossless() || family.is_lossy() => Some(DEFAULT_BIT_DEPTH),
        _ => None,
    }
}

/// Container average split evenly across its audio streams
///
/// Streams rarely share a container equally, but there is nothing better to
/// go on at this point.
fn container_share(facts: &StreamFacts) -> Option<u32> {
    let total = positive(facts.container_bit_rate)?;
    let streams = u32::try_from(facts.audio_streams).ok().filter(|&n| n > 0)?;
    Some(total / streams)
}

fn first_tier<T>(tiers: &[Tier<T>], facts: &StreamFacts, verbosity: Verbosity) -> Option<T> {
    tiers.iter().find_map(|(name, tier)| {
        let value = tier(facts)?;
        if verbosity.stages() {
            debug!(tier = *name, "Heuristic resolved");
        }
        Some(value)
    })
}

/// Bits per sample of the source material
pub fn bit_depth(facts: &StreamFacts, verbosity: Verbosity) -> u32 {
    first_tier(BIT_DEPTH_TIERS, facts, verbosity).unwrap_or(DEFAULT_BIT_DEPTH)
}

/// Bit rate in bits/s
///
/// Falls back to `file_size / audio_streams * 8 / duration`, which fails with
/// [`ErrorKind::Format`] when any of the three is missing or zero.
pub fn bit_rate(facts: &StreamFacts, duration_secs: u32, verbosity: Verbosity) -> Result<u32> {
    if let Some(rate) = first_tier(BIT_RATE_TIERS, facts, verbosity) {
        return Ok(rate);
    }

    let estimate = estimate_bit_rate(facts.file_size, facts.audio_streams, duration_secs)
        .ok_or_else(|| AnalyzerError::new(ErrorKind::Format))?;
    if verbosity.stages() {
        debug!(estimate, "Bit rate estimated from file size");
    }
    Ok(estimate)
}

fn estimate_bit_rate(file_size: Option<u64>, audio_streams: usize, duration_secs: u32) -> Option<u32> {
    if duration_secs == 0 || audio_streams == 0 {
        return None;
    }
    let audio_size = file_size? / audio_streams as u64;
    u32::try_from(audio_size.saturating_mul(8) / u64::from(duration_secs)).ok()
}

/// Whole seconds, half rounded up
pub fn round_secs(duration: Duration) -> u32 {
    let secs = duration.as_secs_f64().round();
    if secs >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        secs as u32
    }
}

/// Fill format, rate, duration, depth and bit rate from metadata alone
pub fn fill_basic_info(facts: &StreamFacts, info: &mut TrackInfo, verbosity: Verbosity) -> Result<()> {
    let format_name = facts
        .format_name
        .clone()
        .ok_or_else(|| AnalyzerError::new(ErrorKind::Format))?;
    let sample_rate = facts
        .sample_rate()
        .ok_or_else(|| AnalyzerError::new(ErrorKind::Format))?;

    info.format_name = Some(format_name);
    info.sample_rate = sample_rate;

    // A container with no duration at all is broken enough to stop here;
    // a forced decode could still count it, but that is the caller's call.
    let duration = facts
        .container_duration
        .or(facts.stream_duration)
        .ok_or_else(|| AnalyzerError::new(ErrorKind::Format))?;
    info.duration_secs = round_secs(duration);

    info.bit_depth = u8::try_from(bit_depth(facts, verbosity)).unwrap_or(u8::MAX);
    info.bit_rate = bit_rate(facts, info.duration_secs, verbosity)?;

    if verbosity.stages() {
        debug!(
            format = info.format_name.as_deref(),
            sample_rate = info.sample_rate,
            bit_rate = info.bit_rate,
            bit_depth = info.bit_depth,
            duration_secs = info.duration_secs,
            "Basic info filled"
        );
    }
    Ok(())
}

const STREAMINFO_LEN: usize = 34;

/// Bits per sample from a FLAC STREAMINFO block
///
/// Accepts the bare 34-byte block as well as one preceded by the `fLaC`
/// marker and its 4-byte metadata block header.
pub fn flac_bit_depth(side_data: &[u8]) -> Option<u32> {
    let block = match side_data.strip_prefix(b"fLaC") {
        Some(rest) => rest.get(4..)?,
        None => side_data,
    };
    let block = block.get(..STREAMINFO_LEN)?;

    // Sample rate (20 bits) and channels - 1 (3 bits) end at bit 103;
    // bits per sample - 1 follows in 5 bits.
    let stored = (u32::from(block[12] & 0x01) << 4) | u32::from(block[13] >> 4);
    Some(stored + 1)
}

/// Bits per sample from an ALAC magic cookie
///
/// The cookie is an `ALACSpecificConfig` (frame length, compatible version,
/// bit depth, ...), optionally wrapped in its `alac` atom header.
pub fn alac_bit_depth(side_data: &[u8]) -> Option<u32> {
    let config = match side_data.get(4..8) {
        Some(b"alac") => side_data.get(12..)?,
        _ => side_data,
    };
    // Shortest valid config is 24 bytes
    if config.len() < 24 {
        return None;
    }
    positive(Some(u32::from(config[5])))
}
