//! Pipeline orchestration: validate, fan out per character, fan back in (made by FontLab https://www.fontlab.com/)

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::assemble::name::FontNames;
use crate::assemble::{AssembledFont, FontAssembler, MAX_UNITS_PER_EM, MIN_UNITS_PER_EM};
use crate::error::{SynthError, SynthResult, Warning};
use crate::extract::extract_region;
use crate::glyph_id::GlyphId;
use crate::metrics::{glyph_metrics, resolve_kerning, GlyphMetrics};
use crate::normalize::{normalize, BBox, GlyphOutline};
use crate::report::BuildReport;
use crate::request::{CharacterMapping, FontMetadata, FontRequest, KernPair, OutputFormat};
use crate::trace::trace_bitmap;

/// Knobs that belong to the build rather than to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Worker threads for per-character work; `None` uses rayon's global pool.
    pub jobs: Option<usize>,
    pub units_per_em: u16,
    /// Add an empty U+0020 glyph when the request has none.
    pub ensure_space: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            units_per_em: 1000,
            ensure_space: false,
        }
    }
}

/// A finished font and everything worth reporting about it.
#[derive(Debug, Clone)]
pub struct FontArtifact {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub metadata: FontMetadata,
    pub postscript_name: String,
    pub units_per_em: u16,
    /// Requested characters that made it into the font.
    pub glyph_count: usize,
    /// Every glyph in the binary, `.notdef` and an added space included.
    pub total_glyphs: usize,
    pub bbox: BBox,
    pub warnings: Vec<Warning>,
}

impl FontArtifact {
    /// `PostScriptName.ttf` / `.otf`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.postscript_name, self.format.extension())
    }

    pub fn report(&self) -> BuildReport {
        BuildReport::from_artifact(self)
    }
}

#[derive(Debug)]
struct BuiltGlyph {
    glyph: GlyphId,
    outline: GlyphOutline,
    metrics: GlyphMetrics,
    warnings: Vec<Warning>,
}

/// Turn a validated request into a font binary.
pub fn synthesize(request: &FontRequest, options: &PipelineOptions) -> SynthResult<FontArtifact> {
    validate(request, options)?;
    info!(
        "synthesizing {} characters into {} ({})",
        request.character_mappings.len(),
        request.metadata.family_name,
        request.format.extension()
    );

    let run = || -> Vec<SynthResult<BuiltGlyph>> {
        request
            .character_mappings
            .par_iter()
            .map(|mapping| build_glyph(request, mapping, options.units_per_em))
            .collect()
    };
    let results = match options.jobs {
        Some(jobs) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(jobs)
                .build()
                .map_err(|err| SynthError::pipeline(format!("worker pool: {err}"), None))?;
            pool.install(run)
        }
        None => run(),
    };

    let mut warnings = Vec::new();
    let mut built = Vec::new();
    let mut first_failure = None;
    for result in results {
        match result {
            Ok(glyph) => {
                warnings.extend(glyph.warnings.iter().cloned());
                built.push(glyph);
            }
            Err(err) if err.is_recoverable() => {
                warn!("{err}");
                warnings.push(Warning::from(&err));
                first_failure.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }

    if built.is_empty() {
        return Err(SynthError::pipeline(
            "no character produced a glyph",
            first_failure,
        ));
    }
    let glyph_count = built.len();

    let mut glyphs: BTreeMap<GlyphId, (GlyphOutline, GlyphMetrics)> = built
        .into_iter()
        .map(|g| (g.glyph, (g.outline, g.metrics)))
        .collect();
    let space = GlyphId::Char(' ');
    // A named glyph called `space` also blocks the insert; names must stay unique.
    let has_space = glyphs.keys().any(|g| g.glyph_name() == space.glyph_name());
    if options.ensure_space && !has_space {
        debug!("adding empty space glyph");
        let advance = options.units_per_em / 4;
        glyphs.insert(space, (GlyphOutline::default(), GlyphMetrics::blank(advance)));
    }

    let present: BTreeSet<GlyphId> = glyphs.keys().cloned().collect();
    let (kerning, kern_warnings) = resolve_kerning(&request.adjustments.kerning, &present);
    for w in &kern_warnings {
        warn!("{}", w.message);
    }
    warnings.extend(kern_warnings);

    let assembled = assemble(request, options, glyphs, kerning)
        .map_err(|err| SynthError::pipeline("font assembly failed", Some(err)))?;

    let (font, postscript_name) = assembled;
    info!(
        "built {} glyphs, {} bytes, {} warnings",
        font.num_glyphs,
        font.bytes.len(),
        warnings.len()
    );
    Ok(FontArtifact {
        total_glyphs: usize::from(font.num_glyphs),
        bytes: font.bytes,
        format: request.format,
        metadata: request.metadata.clone(),
        postscript_name,
        units_per_em: options.units_per_em,
        glyph_count,
        bbox: font.bbox,
        warnings,
    })
}

fn assemble(
    request: &FontRequest,
    options: &PipelineOptions,
    glyphs: BTreeMap<GlyphId, (GlyphOutline, GlyphMetrics)>,
    kerning: Vec<KernPair>,
) -> SynthResult<(AssembledFont, String)> {
    let mut assembler = FontAssembler::new(
        request.format,
        options.units_per_em,
        &request.metadata,
        glyphs.keys().cloned(),
    )?;
    let postscript_name = assembler.names().postscript_name.clone();
    for (glyph, (outline, metrics)) in glyphs {
        assembler.add_glyph(glyph, outline, metrics)?;
    }
    assembler.set_kerning(kerning)?;
    Ok((assembler.assemble()?, postscript_name))
}

fn build_glyph(
    request: &FontRequest,
    mapping: &CharacterMapping,
    units_per_em: u16,
) -> SynthResult<BuiltGlyph> {
    let glyph = &mapping.glyph;
    let image = request.source_images.get(&mapping.image).ok_or_else(|| {
        SynthError::InvalidRequest(format!("image {:?} is not loaded", mapping.image))
    })?;
    let settings = request.tracing_for(mapping);

    let region = extract_region(image, mapping, settings.threshold)?;
    let contours = trace_bitmap(&region.bitmap, settings).map_err(|err| SynthError::TracingFailed {
        glyph: glyph.clone(),
        reason: err.to_string(),
    })?;
    debug!("{glyph}: {} contours", contours.len());

    let normalized = normalize(
        glyph,
        &contours,
        region.bitmap.height(),
        units_per_em,
        &request.adjustments,
    );
    let mut warnings = Vec::new();
    if let Some(overflow) = &normalized.overflow {
        warn!("{overflow}");
        warnings.push(Warning::from(overflow));
    }
    let metrics = glyph_metrics(&normalized.outline, &request.adjustments);

    Ok(BuiltGlyph {
        glyph: glyph.clone(),
        outline: normalized.outline,
        metrics,
        warnings,
    })
}

/// Checks that must pass before any pixel is looked at.
fn validate(request: &FontRequest, options: &PipelineOptions) -> SynthResult<()> {
    let invalid = |msg: String| Err(SynthError::InvalidRequest(msg));

    if request.character_mappings.is_empty() {
        return invalid("no character mappings".to_string());
    }
    if !(MIN_UNITS_PER_EM..=MAX_UNITS_PER_EM).contains(&options.units_per_em) {
        return invalid(format!(
            "units per em must be within {MIN_UNITS_PER_EM}..={MAX_UNITS_PER_EM}, got {}",
            options.units_per_em
        ));
    }
    FontNames::from_metadata(&request.metadata)?;

    let mut seen = BTreeSet::new();
    let mut names = BTreeMap::new();
    for mapping in &request.character_mappings {
        let glyph = &mapping.glyph;
        if !request.source_images.contains_key(&mapping.image) {
            return invalid(format!(
                "{glyph} references unknown image {:?}",
                mapping.image
            ));
        }
        if !seen.insert(glyph.clone()) {
            return invalid(format!("duplicate character {glyph}"));
        }
        let name = glyph.glyph_name();
        if name == ".notdef" {
            return invalid(format!("{glyph} uses the reserved glyph name .notdef"));
        }
        if let Some(other) = names.insert(name.clone(), glyph.clone()) {
            return invalid(format!("{other} and {glyph} share the glyph name {name}"));
        }
    }

    let adj = &request.adjustments;
    if !adj.char_width.is_finite() || adj.char_width < 0.0 {
        return invalid(format!("char width {} must be a non-negative number", adj.char_width));
    }
    if let Some((glyph, scale)) = adj
        .char_width_overrides
        .iter()
        .find(|(_, s)| !s.is_finite() || **s <= 0.0)
    {
        return invalid(format!("width override {scale} for {glyph} must be positive"));
    }
    if let Some((glyph, _)) = adj
        .char_positions
        .iter()
        .find(|(_, p)| !p.x.is_finite() || !p.y.is_finite())
    {
        return invalid(format!("position of {glyph} is not finite"));
    }
    Ok(())
}
