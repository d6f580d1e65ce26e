//! ReplayGain 2.0 calculation
//!
//! ReplayGain 2.0 is based on EBU R128 loudness measurement and uses
//! -18 LUFS as the reference level.
//!
//! # Gain Calculation
//!
//! - Track Gain = Reference Level - Track Integrated Loudness
//! - Album Gain = Reference Level - Album Loudness, where album loudness is the
//!   energy mean of the track loudnesses
//!
//! # Peak Values
//!
//! Peaks are linear sample peaks. Applying a gain clips when
//! `peak * 10^(gain/20) > 1.0`.

use crate::{LoudnessSummary, REPLAYGAIN_REFERENCE_LUFS};
use serde::Serialize;

fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Largest gain that keeps `peak` at or below full scale
fn headroom_db(peak: f64) -> f64 {
    if peak > 0.0 {
        -20.0 * peak.log10()
    } else {
        f64::INFINITY
    }
}

/// Track-level ReplayGain information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackGain {
    /// Gain to apply in dB (negative for loud tracks)
    pub gain_db: f64,
    /// Linear sample peak of the track
    pub peak: f64,
    /// Integrated loudness in LUFS the gain was derived from
    pub integrated_lufs: f64,
    /// Reference level used for calculation
    pub reference_lufs: f64,
}

impl TrackGain {
    pub fn would_clip(&self) -> bool {
        self.peak * self.linear_gain() > 1.0
    }

    /// Gain limited so the peak stays at full scale
    pub fn safe_gain(&self) -> f64 {
        self.gain_db.min(headroom_db(self.peak))
    }

    pub fn linear_gain(&self) -> f64 {
        db_to_linear(self.gain_db)
    }
}

/// Album-level ReplayGain information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumGain {
    /// Gain to apply in dB for album normalization
    pub gain_db: f64,
    /// Maximum sample peak across all tracks (linear)
    pub peak: f64,
    /// Energy-mean loudness of all tracks in LUFS
    pub album_lufs: f64,
    /// Number of tracks that contributed
    pub track_count: usize,
    /// Reference level used for calculation
    pub reference_lufs: f64,
}

impl AlbumGain {
    pub fn would_clip(&self) -> bool {
        self.peak * db_to_linear(self.gain_db) > 1.0
    }

    pub fn safe_gain(&self) -> f64 {
        self.gain_db.min(headroom_db(self.peak))
    }

    pub fn linear_gain(&self) -> f64 {
        db_to_linear(self.gain_db)
    }
}

/// Calculator for ReplayGain values
#[derive(Debug, Clone, Copy)]
pub struct ReplayGainCalculator {
    reference_lufs: f64,
}

impl ReplayGainCalculator {
    /// Calculator with the ReplayGain 2 reference (-18 LUFS)
    pub fn new() -> Self {
        Self {
            reference_lufs: REPLAYGAIN_REFERENCE_LUFS,
        }
    }

    pub fn with_reference(reference_lufs: f64) -> Self {
        Self { reference_lufs }
    }

    pub fn reference_lufs(&self) -> f64 {
        self.reference_lufs
    }

    /// Gain in dB that brings `integrated_lufs` to the reference level
    pub fn gain_db(&self, integrated_lufs: f64) -> f64 {
        self.reference_lufs - integrated_lufs
    }

    pub fn track_gain(&self, summary: &LoudnessSummary) -> TrackGain {
        TrackGain {
            gain_db: self.gain_db(summary.integrated_lufs),
            peak: summary.sample_peak,
            integrated_lufs: summary.integrated_lufs,
            reference_lufs: self.reference_lufs,
        }
    }

    /// Album gain from per-track measurements
    ///
    /// Each track's loudness is converted to energy, the energies are averaged
    /// without weighting, and the mean is converted back to LUFS. Silent tracks
    /// contribute zero energy. Returns `None` for an empty album or one whose
    /// every track is silent.
    pub fn album_gain(&self, tracks: &[LoudnessSummary]) -> Option<AlbumGain> {
        if tracks.is_empty() {
            return None;
        }

        let mut total_energy = 0.0_f64;
        let mut max_peak = 0.0_f64;
        for track in tracks {
            total_energy += 10.0_f64.powf(track.integrated_lufs / 10.0);
            if track.sample_peak > max_peak {
                max_peak = track.sample_peak;
            }
        }

        let mean_energy = total_energy / tracks.len() as f64;
        if mean_energy <= 0.0 {
            return None;
        }

        let album_lufs = 10.0 * mean_energy.log10();

        Some(AlbumGain {
            gain_db: self.gain_db(album_lufs),
            peak: max_peak,
            album_lufs,
            track_count: tracks.len(),
            reference_lufs: self.reference_lufs,
        })
    }
}

impl Default for ReplayGainCalculator {
    fn default() -> Self {
        Self::new()
    }
}
