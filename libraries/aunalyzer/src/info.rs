//! Analysis result record

use aunalyzer_loudness::{AlbumGain, LoudnessSummary, ReplayGainCalculator};
use serde::Serialize;
use std::fmt;

/// Technical metadata and loudness figures for one audio file
///
/// The basic fields (format through duration) come from container and codec
/// metadata. Everything from `duration_diff` on is filled by decoding and stays
/// `None` unless a decode was requested and ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackInfo {
    /// Container format name, e.g. `"wav"` or `"flac"`
    pub format_name: Option<String>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Bit rate in bits/s
    pub bit_rate: u32,

    /// Bit depth in bits
    pub bit_depth: u8,

    /// Duration in whole seconds, from metadata (or from the sample count if
    /// metadata had none)
    pub duration_secs: u32,

    /// Difference between metadata and sample-counted duration, in whole seconds
    pub duration_diff: Option<u32>,

    /// Frames (samples per channel) decoded
    pub total_frames: Option<u64>,

    /// Integrated loudness in LUFS
    pub integrated_lufs: Option<f64>,

    /// Relative gating threshold in LUFS
    pub relative_threshold: Option<f64>,

    /// Loudness range in LU
    pub loudness_range: Option<f64>,

    /// Maximum sample peak across channels (linear)
    pub sample_peak: Option<f64>,

    /// ReplayGain 2 gain in dB
    pub replaygain_db: Option<f64>,
}

impl TrackInfo {
    /// Loudness figures, if the track was measured
    pub fn loudness(&self) -> Option<LoudnessSummary> {
        Some(LoudnessSummary {
            integrated_lufs: self.integrated_lufs?,
            relative_threshold: self.relative_threshold?,
            loudness_range: self.loudness_range,
            sample_peak: self.sample_peak?,
        })
    }
}

/// Album gain over every measured track; unmeasured tracks are skipped
pub fn album_gain(tracks: &[TrackInfo]) -> Option<AlbumGain> {
    let measured: Vec<LoudnessSummary> = tracks.iter().filter_map(TrackInfo::loudness).collect();
    ReplayGainCalculator::new().album_gain(&measured)
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "File format: {}",
            self.format_name.as_deref().unwrap_or("unknown")
        )?;
        writeln!(f, "Sample rate: {}", self.sample_rate)?;
        writeln!(f, "Bitrate: {}", self.bit_rate)?;
        writeln!(f, "Bit depth: {}", self.bit_depth)?;
        write!(f, "Duration (sec): {}", self.duration_secs)?;

        if let Some(iloud) = self.integrated_lufs {
            write!(f, "\nEBU R128 Loudness Metrics:")?;
            write!(f, "\n  Integrated Loudness (I): {:.2} LUFS", iloud)?;
            if let Some(lra) = self.loudness_range {
                write!(f, "\n  Loudness Range (LRA): {:.2} LU", lra)?;
            }
            if let Some(peak) = self.sample_peak {
                write!(f, "\n  Maximum Sample Peak: {:.6}", peak)?;
            }
            if let Some(gain) = self.replaygain_db {
                write!(f, "\n  ReplayGain 2 Gain: {:.2} dB", gain)?;
            }
        }
        Ok(())
    }
}
