//! Analyzer error taxonomy
//!
//! Every failure carries exactly one [`ErrorKind`] and at most one [`Origin`]
//! naming the subsystem whose own error caused it. Callers branch on the kind;
//! the origin is there for logs.

use crate::convert::ConvertError;
use crate::info::TrackInfo;
use aunalyzer_loudness::LoudnessError;
use std::fmt;
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Result type alias using `AnalyzerError`
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Analyzer-level error kinds
///
/// The discriminants are stable and exposed through [`ErrorKind::code`];
/// `0` is reserved for success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    OutOfMemory = 1,
    FileNotFound = 2,
    NoStream = 3,
    NoDecoder = 4,
    Format = 5,
    DecoderInit = 6,
    Decode = 7,
    LoudnessInit = 8,
    Loudness = 9,
    ConverterInit = 10,
    Conversion = 11,
}

/// Coarse grouping of error kinds for callers that only care about the broad cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    FileNotFound,
    NoAudioStream,
    Format,
    Codec,
    Memory,
    Loudness,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 11] = [
        Self::OutOfMemory,
        Self::FileNotFound,
        Self::NoStream,
        Self::NoDecoder,
        Self::Format,
        Self::DecoderInit,
        Self::Decode,
        Self::LoudnessInit,
        Self::Loudness,
        Self::ConverterInit,
        Self::Conversion,
    ];

    /// Stable integer code
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::OutOfMemory => "Memory allocation failed",
            Self::FileNotFound => "File not found or not accessible",
            Self::NoStream => "No audio stream found in file",
            Self::NoDecoder => "No suitable codec found for audio stream",
            Self::Format => "Format error (invalid stream info)",
            Self::DecoderInit => "Failed to initialize audio codec",
            Self::Decode => "Error while decoding audio stream",
            Self::LoudnessInit => "Failed to initialize EBU R128 loudness analyzer",
            Self::Loudness => "Error while performing EBU R128 loudness analysis",
            Self::ConverterInit => "Failed to initialize audio resampler",
            Self::Conversion => "Error during audio resampling",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            Self::FileNotFound => ErrorCategory::FileNotFound,
            Self::NoStream => ErrorCategory::NoAudioStream,
            Self::Format => ErrorCategory::Format,
            Self::NoDecoder
            | Self::DecoderInit
            | Self::Decode
            | Self::ConverterInit
            | Self::Conversion => ErrorCategory::Codec,
            Self::OutOfMemory => ErrorCategory::Memory,
            Self::LoudnessInit | Self::Loudness => ErrorCategory::Loudness,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The subsystem error underneath an analyzer error
#[derive(Error, Debug)]
pub enum Origin {
    /// Container or codec layer
    #[error("Symphonia error: {0}")]
    Media(#[from] SymphoniaError),

    /// Sample-format conversion stage
    #[error("Converter error: {0}")]
    Conversion(#[from] ConvertError),

    /// Loudness meter; the message names the failing layer itself
    #[error("{0}")]
    Loudness(#[from] LoudnessError),
}

/// A classified analysis failure
///
/// Carries whatever [`TrackInfo`] had been gathered before the failure; it is
/// defaulted when nothing was known yet.
#[derive(Debug)]
pub struct AnalyzerError {
    kind: ErrorKind,
    origin: Option<Origin>,
    partial: Box<TrackInfo>,
}

impl AnalyzerError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            origin: None,
            partial: Box::default(),
        }
    }

    pub fn with_origin(kind: ErrorKind, origin: impl Into<Origin>) -> Self {
        Self {
            kind,
            origin: Some(origin.into()),
            partial: Box::default(),
        }
    }

    /// Attach the partial result gathered before the failure
    pub(crate) fn with_partial(mut self, partial: TrackInfo) -> Self {
        self.partial = Box::new(partial);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable integer code of the kind
    pub fn code(&self) -> u8 {
        self.kind.code()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn partial(&self) -> &TrackInfo {
        &self.partial
    }

    pub fn into_partial(self) -> TrackInfo {
        *self.partial
    }
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Audio analyzer error: {}", self.kind)?;
        if let Some(origin) = &self.origin {
            write!(f, ". {}", origin)?;
        }
        Ok(())
    }
}

impl std::error::Error for AnalyzerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.origin
            .as_ref()
            .map(|origin| origin as &(dyn std::error::Error + 'static))
    }
}
