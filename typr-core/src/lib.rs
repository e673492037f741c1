//! typr-core: from scanned letters to a working font
//!
//! Hand someone a sheet of handwriting and a list of "this box is an A",
//! and this crate gives back a TrueType or OpenType/CFF binary that a
//! text renderer will happily load.
//!
//! ## The Road From Pixels to Glyphs
//!
//! **Extract**: cut each character's rectangle (or polygon) out of its
//! source image and threshold it into a bitmap.
//!
//! **Trace**: walk the ink boundaries, straighten them into polygons and
//! smooth the polygons into lines and cubic Béziers.
//!
//! **Normalize**: flip to y-up, scale into font units, apply baseline,
//! width and position adjustments, and clamp into the 16-bit range.
//!
//! **Assemble**: lay out `.notdef` plus every glyph, encode the tables in a
//! fixed order, checksum them and patch `head.checksumAdjustment` last.
//!
//! ## A Short Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use typr_core::pipeline::{synthesize, PipelineOptions};
//! use typr_core::request::RequestManifest;
//!
//! let manifest = RequestManifest::from_path(Path::new("hand/request.json"))?;
//! let request = manifest.load(Path::new("hand"))?;
//!
//! let font = synthesize(&request, &PipelineOptions::default())?;
//! std::fs::write(font.file_name(), &font.bytes)?;
//!
//! for warning in &font.warnings {
//!     eprintln!("skipped: {}", warning.message);
//! }
//! #
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Failure Is Per Character
//!
//! A blank box or an untraceable scribble costs you that one glyph and a
//! [`error::Warning`]; the rest of the font still gets built. Only a broken
//! request, bad metadata, or nothing traceable at all stops the build.
//!
//! ## Reading Fonts Back
//!
//! With the default `fontations` feature, [`verify`] parses finished
//! binaries through read-fonts and skrifa, re-checks every checksum and
//! reports names, codepoints and outlines.
//!
//! ---
//!
//! Crafted with care at FontLab https://www.fontlab.com/

pub mod assemble;
pub mod error;
pub mod extract;
pub mod glyph_id;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod source;
pub mod trace;
#[cfg(feature = "fontations")]
pub mod verify;

pub use error::{SynthError, SynthResult, Warning, WarningKind};
pub use glyph_id::GlyphId;
pub use pipeline::{synthesize, FontArtifact, PipelineOptions};
pub use request::{FontRequest, OutputFormat};
