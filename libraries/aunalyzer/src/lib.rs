//! Audio file analysis
//!
//! Reads an audio file's technical metadata (format, sample rate, bit rate,
//! bit depth, duration) and, optionally, decodes it to verify the duration
//! and measure EBU R128 loudness with a ReplayGain 2 gain.
//!
//! # Pipeline
//!
//! ```text
//! open session ──> basic info ──> decode loop ──> aggregate
//!  (probe, track,   (heuristics)   (convert, meter)  (duration diff,
//!   decoder, meter)                                   loudness, gain)
//! ```
//!
//! Each call owns its own session, so independent files can be analyzed from
//! several threads at once. Failures are classified by [`ErrorKind`] and carry
//! whatever [`TrackInfo`] was gathered before them.
//!
//! # Example
//!
//! ```ignore
//! use aunalyzer::{analyze, ErrorKind};
//!
//! match analyze("song.flac", true, true, false) {
//!     Ok(info) => println!("{}", info),
//!     Err(e) if e.kind() == ErrorKind::FileNotFound => eprintln!("missing"),
//!     Err(e) => eprintln!("{} (got {:?})", e, e.partial().format_name),
//! }
//! ```

#![deny(unsafe_code)]

mod aggregate;
mod convert;
mod decode;
mod error;
mod facts;
mod heuristics;
mod info;
mod options;
mod session;

pub use convert::{ConversionBuffer, ConvertError, FormatConverter, SampleConverter};
pub use error::{AnalyzerError, ErrorCategory, ErrorKind, Origin, Result};
pub use facts::{CodecFacts, CodecFamily, StreamFacts};
pub use heuristics::{alac_bit_depth, bit_depth, bit_rate, flac_bit_depth};
pub use info::{album_gain, TrackInfo};
pub use options::{AnalyzeOptions, Verbosity};

pub use aunalyzer_loudness::{AlbumGain, LoudnessSummary, TrackGain, REPLAYGAIN_REFERENCE_LUFS};

use session::Session;
use std::path::Path;
use tracing::debug;

/// Analyze `path`
///
/// - `do_decode`: decode the audio to count frames; without it only metadata
///   is read
/// - `measure_loudness`: measure EBU R128 loudness while decoding
/// - `measure_range`: also measure loudness range
pub fn analyze(
    path: impl AsRef<Path>,
    do_decode: bool,
    measure_loudness: bool,
    measure_range: bool,
) -> Result<TrackInfo> {
    let options = AnalyzeOptions::new()
        .with_decode(do_decode)
        .with_loudness(measure_loudness)
        .with_range(measure_range);
    analyze_with(path, &options)
}

/// Analyze `path` with explicit options
pub fn analyze_with(path: impl AsRef<Path>, options: &AnalyzeOptions) -> Result<TrackInfo> {
    let path = path.as_ref();
    if options.verbosity.stages() {
        debug!(path = %path.display(), ?options, "Analyzing");
    }

    let (mut session, facts) = Session::open(path, options)?;

    let mut info = TrackInfo::default();
    if let Err(e) = heuristics::fill_basic_info(&facts, &mut info, options.verbosity) {
        return Err(e.with_partial(info));
    }

    if !options.do_decode {
        return Ok(info);
    }

    match measure(&mut session, info.clone(), options) {
        Ok(measured) => Ok(measured),
        // Decode-derived fields never leak out of a failed run
        Err(e) => Err(e.with_partial(info)),
    }
}

fn measure(session: &mut Session, mut info: TrackInfo, options: &AnalyzeOptions) -> Result<TrackInfo> {
    let total_frames = decode::run(session)?;
    aggregate::reconcile_duration(&mut info, total_frames, options);

    if let Some(meter) = session.meter.as_ref() {
        aggregate::apply_loudness(&mut info, meter, options)?;
    }
    Ok(info)
}
