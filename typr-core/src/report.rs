//! Build reports and streaming output helpers (made by FontLab https://www.fontlab.com/)

use std::io::Write;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::Warning;
use crate::pipeline::FontArtifact;
use crate::request::OutputFormat;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub family_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postscript_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units_per_em: Option<u16>,
    pub glyph_count: usize,
    #[serde(default)]
    pub total_glyphs: usize,
    /// Where the binary was written, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// `{ success, error?, metadata: { glyph_count, warnings[] } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: ReportMetadata,
}

impl BuildReport {
    pub fn from_artifact(artifact: &FontArtifact) -> Self {
        Self {
            success: true,
            error: None,
            metadata: ReportMetadata {
                family_name: artifact.metadata.family_name.clone(),
                postscript_name: Some(artifact.postscript_name.clone()),
                format: Some(artifact.format),
                units_per_em: Some(artifact.units_per_em),
                glyph_count: artifact.glyph_count,
                total_glyphs: artifact.total_glyphs,
                file: None,
                public: artifact.metadata.public,
                tags: artifact.metadata.tags.clone(),
                warnings: artifact.warnings.clone(),
            },
        }
    }

    /// Report for a build that produced nothing.
    pub fn failure(family_name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            metadata: ReportMetadata {
                family_name: family_name.into(),
                ..ReportMetadata::default()
            },
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.metadata.file = Some(file.into());
        self
    }
}

/// Write a value as prettified JSON.
pub fn write_json_pretty<T: Serialize + ?Sized>(value: &T, mut w: impl Write) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    w.write_all(json.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

/// Write items as newline-delimited JSON (NDJSON).
pub fn write_ndjson<T: Serialize>(items: &[T], mut w: impl Write) -> Result<()> {
    for item in items {
        let line = serde_json::to_string(item)?;
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}
