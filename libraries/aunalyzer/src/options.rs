//! Analysis options

use aunalyzer_loudness::REPLAYGAIN_REFERENCE_LUFS;
use serde::{Deserialize, Serialize};

/// How chatty the analyzer is about recoverable oddities
///
/// Verbosity travels with each call; nothing process-wide is changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No warnings from the analyzer itself
    Quiet,
    /// Warnings only
    #[default]
    Normal,
    /// Warnings plus per-stage debug events
    Verbose,
}

impl Verbosity {
    pub fn warnings(self) -> bool {
        self != Self::Quiet
    }

    pub fn stages(self) -> bool {
        self == Self::Verbose
    }
}

/// What one `analyze` call should do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Decode the audio; without it only container/codec metadata is filled
    pub do_decode: bool,

    /// Run the EBU R128 meter over the decoded audio
    pub measure_loudness: bool,

    /// Also measure loudness range
    pub measure_range: bool,

    pub verbosity: Verbosity,

    /// Warn when metadata and sample-counted durations differ by more than this
    pub duration_warn_secs: u32,

    /// Reference level the gain value is computed against
    pub reference_lufs: f64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            do_decode: true,
            measure_loudness: true,
            measure_range: false,
            verbosity: Verbosity::Normal,
            duration_warn_secs: 2,
            reference_lufs: REPLAYGAIN_REFERENCE_LUFS,
        }
    }
}

impl AnalyzeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata only, no decode
    pub fn metadata_only() -> Self {
        Self {
            do_decode: false,
            measure_loudness: false,
            ..Self::default()
        }
    }

    pub fn with_decode(mut self, do_decode: bool) -> Self {
        self.do_decode = do_decode;
        self
    }

    pub fn with_loudness(mut self, measure_loudness: bool) -> Self {
        self.measure_loudness = measure_loudness;
        self
    }

    pub fn with_range(mut self, measure_range: bool) -> Self {
        self.measure_range = measure_range;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_reference_lufs(mut self, reference_lufs: f64) -> Self {
        self.reference_lufs = reference_lufs;
        self
    }

    /// Whether a loudness meter is needed at all
    pub(crate) fn wants_meter(&self) -> bool {
        self.do_decode && self.measure_loudness
    }
}
