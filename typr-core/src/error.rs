//! Error taxonomy and recoverable warnings (made by FontLab https://www.fontlab.com/)

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::glyph_id::GlyphId;

/// Everything that can go wrong while turning pixels into a font.
///
/// Per-character variants (`InvalidRegion`, `EmptyRegion`, `TracingFailed`)
/// are recovered by the pipeline and turned into [`Warning`]s. The remaining
/// variants abort the build before any bytes are handed out.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid region for {glyph}: {reason}")]
    InvalidRegion { glyph: GlyphId, reason: String },

    #[error("region for {glyph} contains no ink")]
    EmptyRegion { glyph: GlyphId },

    #[error("tracing failed for {glyph}: {reason}")]
    TracingFailed { glyph: GlyphId, reason: String },

    #[error("coordinates of {glyph} clamped to the font coordinate range ({clamped} values)")]
    CoordinateOverflow { glyph: GlyphId, clamped: usize },

    #[error("incomplete glyph set, missing: {}", join_ids(.missing))]
    IncompleteGlyphSet { missing: Vec<GlyphId> },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("assembler is {actual}, expected {expected}")]
    AssemblyOutOfOrder {
        expected: AssemblyStage,
        actual: AssemblyStage,
    },

    #[error("pipeline failed: {reason}")]
    PipelineFailed {
        reason: String,
        #[source]
        source: Option<Box<SynthError>>,
    },
}

impl SynthError {
    /// Whether the pipeline may skip the affected character and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SynthError::InvalidRegion { .. }
                | SynthError::EmptyRegion { .. }
                | SynthError::TracingFailed { .. }
                | SynthError::CoordinateOverflow { .. }
        )
    }

    pub fn kind(&self) -> WarningKind {
        match self {
            SynthError::InvalidRegion { .. } => WarningKind::InvalidRegion,
            SynthError::EmptyRegion { .. } => WarningKind::EmptyRegion,
            SynthError::TracingFailed { .. } => WarningKind::TracingFailed,
            SynthError::CoordinateOverflow { .. } => WarningKind::CoordinateOverflow,
            _ => WarningKind::Fatal,
        }
    }

    pub(crate) fn pipeline(reason: impl Into<String>, source: Option<SynthError>) -> Self {
        SynthError::PipelineFailed {
            reason: reason.into(),
            source: source.map(Box::new),
        }
    }
}

fn join_ids(ids: &[GlyphId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stage of the font table assembler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStage {
    CollectingGlyphs,
    ComputingOffsets,
    EncodingTables,
    ComputingChecksums,
    FinalizingHeader,
    Done,
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssemblyStage::CollectingGlyphs => "collecting glyphs",
            AssemblyStage::ComputingOffsets => "computing offsets",
            AssemblyStage::EncodingTables => "encoding tables",
            AssemblyStage::ComputingChecksums => "computing checksums",
            AssemblyStage::FinalizingHeader => "finalizing header",
            AssemblyStage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InvalidRegion,
    EmptyRegion,
    TracingFailed,
    CoordinateOverflow,
    KerningDropped,
    Fatal,
}

/// A recoverable problem recorded alongside a successful artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(character: Option<&GlyphId>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            character: character.map(ToString::to_string),
            kind,
            message: message.into(),
        }
    }
}

impl From<&SynthError> for Warning {
    fn from(err: &SynthError) -> Self {
        let glyph = match err {
            SynthError::InvalidRegion { glyph, .. }
            | SynthError::EmptyRegion { glyph }
            | SynthError::TracingFailed { glyph, .. }
            | SynthError::CoordinateOverflow { glyph, .. } => Some(glyph),
            _ => None,
        };
        Warning::new(glyph, err.kind(), err.to_string())
    }
}

pub type SynthResult<T> = std::result::Result<T, SynthError>;
