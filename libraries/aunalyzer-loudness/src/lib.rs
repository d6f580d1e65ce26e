//! Loudness measurement for aunalyzer
//!
//! This crate provides:
//! - EBU R128 measurement (integrated loudness, loudness range, sample peak)
//! - ReplayGain 2.0 calculation (track and album gain)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │ f32 frames  │ ──► │ LoudnessMeter │ ──► │ LoudnessSummary │
//! └─────────────┘     └───────────────┘     └─────────────────┘
//!                                                   │
//!                                                   ▼
//!                                         ┌──────────────────────┐
//!                                         │ ReplayGainCalculator │
//!                                         └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use aunalyzer_loudness::{LoudnessMeter, ReplayGainCalculator};
//!
//! let mut meter = LoudnessMeter::new(44100, 2, true)?;
//! meter.add_interleaved(&audio_samples)?;
//! let summary = meter.summarize()?;
//!
//! let rg = ReplayGainCalculator::new().track_gain(&summary);
//! println!("Track gain: {:.2} dB", rg.gain_db);
//! ```

#![deny(unsafe_code)]

mod error;
mod meter;
mod replaygain;

pub use error::{LoudnessError, Result};
pub use meter::{LoudnessMeter, LoudnessSummary};
pub use replaygain::{AlbumGain, ReplayGainCalculator, TrackGain};

/// ReplayGain 2.0 reference loudness level (-18 LUFS)
pub const REPLAYGAIN_REFERENCE_LUFS: f64 = -18.0;

/// EBU R128 absolute gating threshold (-70 LUFS)
///
/// Reported in place of the relative threshold when the engine has none.
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;
