//! Request model: mappings, tracing knobs, adjustments and metadata (made by FontLab https://www.fontlab.com/)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::glyph_id::GlyphId;
use crate::source::SourceImage;

/// Pixel rectangle; `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Rect {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// `None` when the subtraction overflows.
    pub fn width(&self) -> Option<i64> {
        self.x2.checked_sub(self.x1)
    }

    pub fn height(&self) -> Option<i64> {
        self.y2.checked_sub(self.y1)
    }
}

/// How an explicit polygon interacts with the mapping rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolygonClip {
    /// Rasterize the polygon, then clamp to the rectangle.
    #[default]
    ClampToRect,
    /// Crop to the polygon's own bounding box; the rectangle is ignored.
    PolygonOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMapping {
    #[serde(rename = "char")]
    pub glyph: GlyphId,
    pub image: String,
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub polygon_clip: PolygonClip,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingSettings>,
}

impl CharacterMapping {
    pub fn new(glyph: impl Into<GlyphId>, image: impl Into<String>, rect: Rect) -> Self {
        Self {
            glyph: glyph.into(),
            image: image.into(),
            rect,
            polygon: None,
            polygon_clip: PolygonClip::default(),
            tracing: None,
        }
    }

    pub fn with_polygon(mut self, polygon: Vec<[f64; 2]>) -> Self {
        self.polygon = Some(polygon);
        self
    }

    pub fn with_tracing(mut self, tracing: TracingSettings) -> Self {
        self.tracing = Some(tracing);
        self
    }
}

/// Resolves 2x2 checkerboard ambiguities while walking a boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    Black,
    White,
    Left,
    Right,
    #[default]
    Minority,
    Majority,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSettings {
    /// Ink threshold; gray levels below it count as foreground.
    pub threshold: u8,
    /// Regions with this area or less are discarded as speckles.
    pub turdsize: u32,
    /// Corner threshold; 0 keeps every corner sharp, 4/3 smooths everything.
    pub alphamax: f64,
    pub opticurve: bool,
    pub opttolerance: f64,
    pub turnpolicy: TurnPolicy,
    /// Wall-clock bound for one character; `None` disables it.
    pub time_limit_ms: Option<u64>,
}

impl Default for TracingSettings {
    fn default() -> Self {
        Self {
            threshold: 128,
            turdsize: 2,
            alphamax: 1.0,
            opticurve: true,
            opttolerance: 0.2,
            turnpolicy: TurnPolicy::Minority,
            time_limit_ms: Some(10_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernPair {
    pub left: GlyphId,
    pub right: GlyphId,
    pub value: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontAdjustments {
    pub letter_spacing: i32,
    pub baseline_offset: i32,
    /// Multiplier on the advance box; outlines are left alone.
    pub char_width: f64,
    pub kerning: Vec<KernPair>,
    pub char_positions: BTreeMap<GlyphId, Position>,
    /// Per-character horizontal scale applied to the outline itself.
    pub char_width_overrides: BTreeMap<GlyphId, f64>,
}

impl Default for FontAdjustments {
    fn default() -> Self {
        Self {
            letter_spacing: 0,
            baseline_offset: 0,
            char_width: 1.0,
            kerning: Vec::new(),
            char_positions: BTreeMap::new(),
            char_width_overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Ttf,
    Otf,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Ttf => "ttf",
            OutputFormat::Otf => "otf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetadata {
    pub family_name: String,
    pub subfamily: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub version: String,
    pub copyright: Option<String>,
    /// Creation time in unix seconds; feeds `head` dates and the copyright year.
    pub created: Option<i64>,
    pub public: bool,
    pub tags: Vec<String>,
}

impl Default for FontMetadata {
    fn default() -> Self {
        Self {
            family_name: String::new(),
            subfamily: "Regular".to_string(),
            author: None,
            description: None,
            version: "1.0".to_string(),
            copyright: None,
            created: None,
            public: false,
            tags: Vec::new(),
        }
    }
}

impl FontMetadata {
    pub fn new(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            ..Self::default()
        }
    }
}

/// A fully loaded request, ready for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct FontRequest {
    pub source_images: BTreeMap<String, SourceImage>,
    pub character_mappings: Vec<CharacterMapping>,
    pub metadata: FontMetadata,
    pub format: OutputFormat,
    pub adjustments: FontAdjustments,
    pub tracing: TracingSettings,
}

impl FontRequest {
    pub fn new(metadata: FontMetadata, format: OutputFormat) -> Self {
        Self {
            metadata,
            format,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, id: impl Into<String>, image: SourceImage) -> Self {
        self.source_images.insert(id.into(), image);
        self
    }

    pub fn with_mapping(mut self, mapping: CharacterMapping) -> Self {
        self.character_mappings.push(mapping);
        self
    }

    pub fn with_adjustments(mut self, adjustments: FontAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_tracing(mut self, tracing: TracingSettings) -> Self {
        self.tracing = tracing;
        self
    }

    /// Effective tracing settings for one mapping.
    pub fn tracing_for<'a>(&'a self, mapping: &'a CharacterMapping) -> &'a TracingSettings {
        mapping.tracing.as_ref().unwrap_or(&self.tracing)
    }
}

/// On-disk request: like [`FontRequest`] but images are file paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestManifest {
    pub source_images: BTreeMap<String, PathBuf>,
    pub character_mappings: Vec<CharacterMapping>,
    pub metadata: FontMetadata,
    pub format: OutputFormat,
    pub adjustments: FontAdjustments,
    pub tracing: TracingSettings,
}

impl RequestManifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading request {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing request {}", path.display()))
    }

    /// Decode every referenced image; relative paths resolve against `base_dir`.
    pub fn load(self, base_dir: &Path) -> Result<FontRequest> {
        let mut source_images = BTreeMap::new();
        for (id, path) in self.source_images {
            let resolved = if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            };
            if !resolved.exists() {
                return Err(anyhow!(
                    "image {id:?} not found at {}",
                    resolved.display()
                ));
            }
            source_images.insert(id, SourceImage::open(&resolved)?);
        }

        Ok(FontRequest {
            source_images,
            character_mappings: self.character_mappings,
            metadata: self.metadata,
            format: self.format,
            adjustments: self.adjustments,
            tracing: self.tracing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_size_overflow_is_none() {
        assert_eq!(Rect::new(2, 3, 12, 8).width(), Some(10));
        assert_eq!(Rect::new(2, 3, 12, 8).height(), Some(5));
        assert_eq!(Rect::new(i64::MIN, 0, i64::MAX, 1).width(), None);
        assert_eq!(Rect::new(0, i64::MAX, 1, i64::MIN).height(), None);
    }

    #[test]
    fn manifest_parses_with_defaults() {
        let raw = r#"{
            "source_images": {"sheet": "sheet.png"},
            "character_mappings": [
                {"char": "A", "image": "sheet", "rect": {"x1": 0, "y1": 0, "x2": 10, "y2": 12}},
                {"char": "U+0042", "image": "sheet", "rect": {"x1": 10, "y1": 0, "x2": 20, "y2": 12},
                 "tracing": {"turnpolicy": "black"}}
            ],
            "metadata": {"family_name": "Hand"},
            "format": "otf",
            "adjustments": {"letter_spacing": 40, "kerning": [{"left": "A", "right": "B", "value": -30}]}
        }"#;
        let manifest: RequestManifest = serde_json::from_str(raw).expect("parse");

        assert_eq!(manifest.format, OutputFormat::Otf);
        assert_eq!(manifest.metadata.subfamily, "Regular");
        assert_eq!(manifest.metadata.version, "1.0");
        assert_eq!(manifest.adjustments.char_width, 1.0);
        assert_eq!(manifest.adjustments.kerning[0].value, -30);
        assert_eq!(manifest.character_mappings[1].glyph, GlyphId::Char('B'));

        let tracing = manifest.character_mappings[1].tracing.as_ref().unwrap();
        assert_eq!(tracing.turnpolicy, TurnPolicy::Black);
        assert_eq!(tracing.turdsize, 2);
    }

    #[test]
    fn load_reports_missing_images() {
        let mut manifest = RequestManifest::default();
        manifest
            .source_images
            .insert("sheet".into(), PathBuf::from("does-not-exist.png"));

        let err = manifest.load(Path::new("/nonexistent")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn per_mapping_tracing_overrides_request_settings() {
        let custom = TracingSettings {
            turdsize: 9,
            ..TracingSettings::default()
        };
        let plain = CharacterMapping::new('A', "img", Rect::new(0, 0, 1, 1));
        let tuned = plain.clone().with_tracing(custom.clone());
        let request = FontRequest::default();

        assert_eq!(request.tracing_for(&plain).turdsize, 2);
        assert_eq!(request.tracing_for(&tuned), &custom);
    }
}
