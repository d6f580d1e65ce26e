//! EBU R128 loudness measurement
//!
//! Thin adapter over the `ebur128` crate. The meter always measures integrated
//! loudness and sample peak; loudness range is optional because it keeps a
//! short-term history that costs memory on long tracks.

use crate::error::{LoudnessError, Result};
use crate::ABSOLUTE_GATE_LUFS;
use ebur128::{EbuR128, Mode};
use serde::Serialize;
use std::fmt;

/// Loudness figures read back from a finished measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoudnessSummary {
    /// Integrated loudness in LUFS (`-inf` for digital silence)
    pub integrated_lufs: f64,

    /// Relative gating threshold in LUFS, or the absolute gate when the
    /// engine could not report one
    pub relative_threshold: f64,

    /// Loudness range in LU, only present if the meter was built with range enabled
    pub loudness_range: Option<f64>,

    /// Maximum sample peak across all channels (linear, 1.0 = full scale)
    pub sample_peak: f64,
}

impl fmt::Display for LoudnessSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integrated: {:.2} LUFS", self.integrated_lufs)?;
        if let Some(lra) = self.loudness_range {
            write!(f, ", Range: {:.2} LU", lra)?;
        }
        write!(f, ", Sample Peak: {:.6}", self.sample_peak)
    }
}

/// EBU R128 loudness meter
///
/// Feed it floating-point frames, either interleaved or one slice per
/// channel, then read the results back with [`LoudnessMeter::summarize`].
///
/// ```ignore
/// use aunalyzer_loudness::LoudnessMeter;
///
/// let mut meter = LoudnessMeter::new(44100, 2, false)?;
/// meter.add_interleaved(&samples)?;
/// let summary = meter.summarize()?;
/// println!("{}", summary);
/// ```
pub struct LoudnessMeter {
    ebur128: EbuR128,
    sample_rate: u32,
    channels: u32,
    measure_range: bool,
    frames_processed: u64,
}

impl LoudnessMeter {
    /// Create a meter measuring integrated loudness and sample peak, plus
    /// loudness range if `measure_range` is set
    ///
    /// # Errors
    /// Returns the engine's error if it rejects the rate or channel count, or
    /// cannot be allocated
    pub fn new(sample_rate: u32, channels: u32, measure_range: bool) -> Result<Self> {
        let ebur128 = EbuR128::new(channels, sample_rate, Self::modes(measure_range))?;

        Ok(Self {
            ebur128,
            sample_rate,
            channels,
            measure_range,
            frames_processed: 0,
        })
    }

    fn modes(measure_range: bool) -> Mode {
        let mut mode = Mode::I | Mode::SAMPLE_PEAK;
        if measure_range {
            mode |= Mode::LRA;
        }
        mode
    }

    /// Add interleaved frames (L R L R ... for stereo)
    pub fn add_interleaved(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        if samples.len() % self.channels as usize != 0 {
            return Err(LoudnessError::PartialFrame {
                samples: samples.len(),
                channels: self.channels,
            });
        }

        self.ebur128.add_frames_f32(samples)?;
        self.frames_processed += (samples.len() / self.channels as usize) as u64;

        Ok(())
    }

    /// Add planar frames, one slice per channel, all of equal length
    pub fn add_planar(&mut self, planes: &[&[f32]]) -> Result<()> {
        if planes.len() != self.channels as usize {
            return Err(LoudnessError::PlaneCount {
                expected: self.channels,
                actual: planes.len(),
            });
        }

        let frames = planes.first().map_or(0, |p| p.len());
        if frames == 0 {
            return Ok(());
        }

        self.ebur128.add_frames_planar_f32(planes)?;
        self.frames_processed += frames as u64;

        Ok(())
    }

    /// Integrated loudness over everything fed so far
    pub fn integrated_loudness(&self) -> Result<f64> {
        Ok(self.ebur128.loudness_global()?)
    }

    /// Relative gating threshold used for the integrated measurement
    pub fn relative_threshold(&self) -> Result<f64> {
        Ok(self.ebur128.relative_threshold()?)
    }

    /// Loudness range; fails with [`LoudnessError::InvalidMode`] unless the
    /// meter was built with range enabled
    pub fn loudness_range(&self) -> Result<f64> {
        Ok(self.ebur128.loudness_range()?)
    }

    /// Sample peak of one channel
    pub fn sample_peak(&self, channel: u32) -> Result<f64> {
        Ok(self.ebur128.sample_peak(channel)?)
    }

    /// Maximum sample peak across all channels
    pub fn max_sample_peak(&self) -> Result<f64> {
        let mut max_peak = 0.0_f64;
        for ch in 0..self.channels {
            let peak = self.sample_peak(ch)?;
            if peak > max_peak {
                max_peak = peak;
            }
        }
        Ok(max_peak)
    }

    /// Read back all enabled measurements
    ///
    /// Any read failure is an error, except the relative threshold which falls
    /// back to the absolute gate (-70 LUFS).
    pub fn summarize(&self) -> Result<LoudnessSummary> {
        let integrated_lufs = self.integrated_loudness()?;

        let relative_threshold = match self.relative_threshold() {
            Ok(threshold) => threshold,
            Err(err) => {
                tracing::debug!("relative threshold unavailable ({}), using absolute gate", err);
                ABSOLUTE_GATE_LUFS
            }
        };

        let loudness_range = if self.measure_range {
            Some(self.loudness_range()?)
        } else {
            None
        };

        Ok(LoudnessSummary {
            integrated_lufs,
            relative_threshold,
            loudness_range,
            sample_peak: self.max_sample_peak()?,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn measures_range(&self) -> bool {
        self.measure_range
    }

    /// Frames (samples per channel) fed so far
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}

impl fmt::Debug for LoudnessMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoudnessMeter")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("measure_range", &self.measure_range)
            .field("frames_processed", &self.frames_processed)
            .finish_non_exhaustive()
    }
}
