//! Folding decode results into the track info

use crate::error::{AnalyzerError, ErrorKind, Result};
use crate::info::TrackInfo;
use crate::options::AnalyzeOptions;
use aunalyzer_loudness::{LoudnessMeter, ReplayGainCalculator};
use tracing::{debug, warn};

/// Reconcile the metadata duration with the decoded frame count
///
/// Without a metadata duration the counted one is adopted. The frame count is
/// always recorded.
pub fn reconcile_duration(info: &mut TrackInfo, total_frames: u64, options: &AnalyzeOptions) {
    info.total_frames = Some(total_frames);

    if total_frames == 0 || info.sample_rate == 0 {
        return;
    }
    let counted = (total_frames as f64 / f64::from(info.sample_rate)).round();
    let counted = if counted >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        counted as u32
    };

    if info.duration_secs > 0 {
        let diff = counted.abs_diff(info.duration_secs);
        info.duration_diff = Some(diff);
        if diff > options.duration_warn_secs && options.verbosity.warnings() {
            warn!(
                metadata_secs = info.duration_secs,
                counted_secs = counted,
                "Duration from metadata disagrees with decoded length"
            );
        }
    } else {
        info.duration_secs = counted;
        info.duration_diff = Some(0);
    }
}

/// Read the meter into the track info and derive the gain
pub fn apply_loudness(
    info: &mut TrackInfo,
    meter: &LoudnessMeter,
    options: &AnalyzeOptions,
) -> Result<()> {
    let summary = meter
        .summarize()
        .map_err(|e| AnalyzerError::with_origin(ErrorKind::Loudness, e))?;

    let gain = ReplayGainCalculator::with_reference(options.reference_lufs).track_gain(&summary);

    info.integrated_lufs = Some(summary.integrated_lufs);
    info.relative_threshold = Some(summary.relative_threshold);
    info.loudness_range = summary.loudness_range;
    info.sample_peak = Some(summary.sample_peak);
    info.replaygain_db = Some(gain.gain_db);

    if options.verbosity.stages() {
        debug!(%summary, gain_db = gain.gain_db, "Loudness measured");
    }
    Ok(())
}
