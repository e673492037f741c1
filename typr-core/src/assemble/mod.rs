//! Font table assembler (made by FontLab https://www.fontlab.com/)
//!
//! A small state machine that fans the per-character results back in:
//!
//! 1. **Collecting glyphs**: every requested glyph must arrive exactly once.
//! 2. **Computing offsets**: glyph order is fixed, outlines are encoded and
//!    `loca` offsets derived.
//! 3. **Encoding tables**: every remaining table is serialized, `head` with a
//!    zero checksum adjustment.
//! 4. **Computing checksums**: directory records, offsets and table sums.
//! 5. **Finalizing header**: the file is written and the whole-file
//!    adjustment patched into `head`.
//!
//! Calling a step out of order fails with
//! [`SynthError::AssemblyOutOfOrder`](crate::error::SynthError).

pub mod cff;
pub mod cmap;
pub mod glyf;
pub mod name;
pub mod sfnt;
pub mod tables;
pub mod writer;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::error::{AssemblyStage, SynthError, SynthResult};
use crate::glyph_id::GlyphId;
use crate::metrics::GlyphMetrics;
use crate::normalize::{BBox, FontPoint, GlyphOutline, OutlineContour, OutlineSegment};
use crate::request::{FontMetadata, KernPair, OutputFormat};

use self::cff::{CffGlyph, CffNames};
use self::glyf::{EncodedGlyph, GlyphTables};
use self::name::FontNames;
use self::sfnt::TableRecord;
use self::tables::{GlyphRow, LineMetrics, Os2Input};
use self::writer::Tag;

pub const MIN_UNITS_PER_EM: u16 = 16;
pub const MAX_UNITS_PER_EM: u16 = 16384;

/// A finished font binary plus what the report needs from it.
#[derive(Debug, Clone)]
pub struct AssembledFont {
    pub bytes: Vec<u8>,
    /// Glyphs in the font, `.notdef` included.
    pub num_glyphs: u16,
    pub bbox: BBox,
    pub tables: Vec<TableRecord>,
    pub checksum_adjustment: u32,
}

#[derive(Debug, Clone)]
struct OrderedGlyph {
    id: Option<GlyphId>,
    name: String,
    outline: GlyphOutline,
    advance: u16,
}

#[derive(Debug)]
enum Outlines {
    TrueType {
        encoded: Vec<EncodedGlyph>,
        tables: GlyphTables,
    },
    Cff,
}

#[derive(Debug)]
pub struct FontAssembler {
    stage: AssemblyStage,
    format: OutputFormat,
    units_per_em: u16,
    names: FontNames,
    expected: BTreeSet<GlyphId>,
    collected: BTreeMap<GlyphId, (GlyphOutline, GlyphMetrics)>,
    kerning: Vec<KernPair>,
    order: Vec<OrderedGlyph>,
    outlines: Option<Outlines>,
    tables: Vec<(Tag, Vec<u8>)>,
    records: Vec<TableRecord>,
    font: Vec<u8>,
    bbox: BBox,
    checksum_adjustment: u32,
}

/// Hollow rectangle shown for unmapped characters.
fn notdef(units_per_em: u16) -> (GlyphOutline, u16) {
    let em = i32::from(units_per_em);
    let advance = em / 2;
    let stroke = (em / 20).max(1);
    let (x0, x1) = (stroke, advance - stroke);
    let (y0, y1) = (0, em * 7 / 10);
    let rect = |x0: i32, y0: i32, x1: i32, y1: i32, hole: bool| {
        let corners = if hole {
            [(x1, y0), (x1, y1), (x0, y1), (x0, y0)]
        } else {
            [(x0, y1), (x1, y1), (x1, y0), (x0, y0)]
        };
        OutlineContour {
            start: FontPoint::new(x0, y0),
            segments: corners
                .iter()
                .map(|&(x, y)| OutlineSegment::Line(FontPoint::new(x, y)))
                .collect(),
            is_hole: hole,
        }
    };
    let mut contours = vec![rect(x0, y0, x1, y1, false)];
    if x1 - x0 > 2 * stroke && y1 - y0 > 2 * stroke {
        contours.push(rect(x0 + stroke, y0 + stroke, x1 - stroke, y1 - stroke, true));
    }
    (GlyphOutline { contours }, advance as u16)
}

impl FontAssembler {
    /// Validate metadata and sizing; nothing is encoded yet.
    pub fn new(
        format: OutputFormat,
        units_per_em: u16,
        metadata: &FontMetadata,
        expected: impl IntoIterator<Item = GlyphId>,
    ) -> SynthResult<Self> {
        if !(MIN_UNITS_PER_EM..=MAX_UNITS_PER_EM).contains(&units_per_em) {
            return Err(SynthError::InvalidRequest(format!(
                "units per em must be within {MIN_UNITS_PER_EM}..={MAX_UNITS_PER_EM}, got {units_per_em}"
            )));
        }
        let names = FontNames::from_metadata(metadata)?;
        let expected: BTreeSet<GlyphId> = expected.into_iter().collect();
        if expected.len() >= usize::from(u16::MAX) {
            return Err(SynthError::InvalidRequest(format!(
                "{} glyphs exceed the 65535 glyph limit",
                expected.len() + 1
            )));
        }

        Ok(Self {
            stage: AssemblyStage::CollectingGlyphs,
            format,
            units_per_em,
            names,
            expected,
            collected: BTreeMap::new(),
            kerning: Vec::new(),
            order: Vec::new(),
            outlines: None,
            tables: Vec::new(),
            records: Vec::new(),
            font: Vec::new(),
            bbox: BBox::at(FontPoint::new(0, 0)),
            checksum_adjustment: 0,
        })
    }

    pub fn stage(&self) -> AssemblyStage {
        self.stage
    }

    pub fn names(&self) -> &FontNames {
        &self.names
    }

    fn expect_stage(&self, expected: AssemblyStage) -> SynthResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(SynthError::AssemblyOutOfOrder {
                expected,
                actual: self.stage,
            })
        }
    }

    pub fn add_glyph(
        &mut self,
        glyph: GlyphId,
        outline: GlyphOutline,
        metrics: GlyphMetrics,
    ) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::CollectingGlyphs)?;
        if !self.expected.contains(&glyph) {
            return Err(SynthError::InvalidRequest(format!(
                "glyph {glyph} was not part of the glyph set"
            )));
        }
        if self.collected.contains_key(&glyph) {
            return Err(SynthError::InvalidRequest(format!(
                "glyph {glyph} added twice"
            )));
        }
        self.collected.insert(glyph, (outline, metrics));
        Ok(())
    }

    /// Kerning pairs; both glyphs must be in the glyph set.
    pub fn set_kerning(&mut self, pairs: Vec<KernPair>) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::CollectingGlyphs)?;
        if let Some(pair) = pairs
            .iter()
            .find(|p| !self.expected.contains(&p.left) || !self.expected.contains(&p.right))
        {
            return Err(SynthError::InvalidRequest(format!(
                "kerning pair {} {} references glyphs outside the glyph set",
                pair.left, pair.right
            )));
        }
        self.kerning = pairs;
        Ok(())
    }

    /// Fix glyph order and encode outlines; fails if any glyph is missing.
    pub fn compute_offsets(&mut self) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::CollectingGlyphs)?;

        let missing: Vec<GlyphId> = self
            .expected
            .iter()
            .filter(|g| !self.collected.contains_key(*g))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SynthError::IncompleteGlyphSet { missing });
        }

        let (notdef_outline, notdef_advance) = notdef(self.units_per_em);
        self.order = std::iter::once(OrderedGlyph {
            id: None,
            name: ".notdef".to_string(),
            outline: notdef_outline,
            advance: notdef_advance,
        })
        .chain(
            std::mem::take(&mut self.collected)
                .into_iter()
                .map(|(id, (outline, metrics))| OrderedGlyph {
                    name: id.glyph_name(),
                    id: Some(id),
                    outline,
                    advance: metrics.advance,
                }),
        )
        .collect();

        self.outlines = Some(match self.format {
            OutputFormat::Ttf => {
                let encoded: Vec<EncodedGlyph> = self
                    .order
                    .iter()
                    .map(|g| glyf::encode_glyph(&g.outline))
                    .collect();
                let tables = glyf::build_glyf_loca(&encoded.iter().collect::<Vec<_>>());
                debug!(
                    "glyf: {} bytes, {} loca",
                    tables.glyf.len(),
                    if tables.short_loca { "short" } else { "long" }
                );
                Outlines::TrueType { encoded, tables }
            }
            OutputFormat::Otf => Outlines::Cff,
        });

        self.stage = AssemblyStage::ComputingOffsets;
        Ok(())
    }

    fn rows(&self) -> Vec<GlyphRow> {
        match &self.outlines {
            Some(Outlines::TrueType { encoded, .. }) => self
                .order
                .iter()
                .zip(encoded)
                .map(|(g, e)| GlyphRow {
                    advance: g.advance,
                    bbox: e.bbox,
                })
                .collect(),
            _ => self
                .order
                .iter()
                .map(|g| GlyphRow {
                    advance: g.advance,
                    bbox: g.outline.bounds(),
                })
                .collect(),
        }
    }

    fn glyph_height(&self, rows: &[GlyphRow], c: char) -> Option<i32> {
        self.order
            .iter()
            .position(|g| g.id == Some(GlyphId::Char(c)))
            .and_then(|i| rows[i].bbox)
            .map(|b| b.y_max)
    }

    fn kern_pairs(&self) -> Vec<(u16, u16, i16)> {
        let gids: BTreeMap<&GlyphId, u16> = self
            .order
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.id.as_ref().map(|id| (id, i as u16)))
            .collect();
        let mut pairs: Vec<(u16, u16, i16)> = self
            .kerning
            .iter()
            .filter(|p| p.value != 0)
            .filter_map(|p| Some((*gids.get(&p.left)?, *gids.get(&p.right)?, p.value)))
            .collect();
        pairs.sort_by_key(|(l, r, _)| (*l, *r));
        pairs.dedup_by_key(|(l, r, _)| (*l, *r));
        if pairs.len() > tables::KERN_MAX_PAIRS {
            warn!(
                "{} kerning pairs exceed the kern table limit, keeping {}",
                pairs.len(),
                tables::KERN_MAX_PAIRS
            );
        }
        pairs
    }

    /// Serialize every table for the chosen outline format.
    pub fn encode_tables(&mut self) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::ComputingOffsets)?;

        let rows = self.rows();
        let num_glyphs = self.order.len() as u16;
        let upem = self.units_per_em;
        let font_bbox = rows
            .iter()
            .filter_map(|r| r.bbox)
            .reduce(BBox::union);
        self.bbox = font_bbox.unwrap_or(BBox::at(FontPoint::new(0, 0)));

        let line = LineMetrics::derive(
            upem,
            font_bbox,
            self.glyph_height(&rows, 'x'),
            self.glyph_height(&rows, 'H'),
        );

        let mut mapping: Vec<(u32, u16)> = self
            .order
            .iter()
            .enumerate()
            .filter_map(|(gid, g)| Some((g.id.as_ref()?.codepoint()?, gid as u16)))
            .collect();
        mapping.sort_unstable();
        let codepoints: Vec<u32> = mapping.iter().map(|(cp, _)| *cp).collect();
        let kern = self.kern_pairs();

        let mut out: Vec<(Tag, Vec<u8>)> = Vec::with_capacity(12);
        out.push((*b"cmap", cmap::build_cmap(&mapping)));
        out.push((*b"hhea", tables::build_hhea(&line, &rows)));
        out.push((*b"hmtx", tables::build_hmtx(&rows)));
        out.push((*b"name", name::build_name(&self.names)));
        out.push((
            *b"OS/2",
            tables::build_os2(&Os2Input {
                units_per_em: upem,
                line,
                rows: &rows,
                codepoints: &codepoints,
                bold: self.names.bold,
                italic: self.names.italic,
                has_kerning: !kern.is_empty(),
            }),
        ));
        if !kern.is_empty() {
            out.push((*b"kern", tables::build_kern(&kern)));
        }

        match &self.outlines {
            Some(Outlines::TrueType { encoded, tables: glyph_tables }) => {
                let max_points = encoded.iter().map(|e| e.points).max().unwrap_or(0);
                let max_contours = encoded.iter().map(|e| e.contours).max().unwrap_or(0);
                out.push((
                    *b"head",
                    tables::build_head(&self.names, upem, self.bbox, glyph_tables.short_loca),
                ));
                out.push((*b"glyf", glyph_tables.glyf.clone()));
                out.push((*b"loca", glyph_tables.loca.clone()));
                out.push((
                    *b"maxp",
                    tables::build_maxp_truetype(num_glyphs, max_points, max_contours),
                ));
                let glyph_names: Vec<String> = self.order.iter().map(|g| g.name.clone()).collect();
                out.push((
                    *b"post",
                    tables::build_post_v2(&glyph_names, upem, self.names.italic),
                ));
            }
            Some(Outlines::Cff) => {
                let cff_names = CffNames {
                    postscript_name: &self.names.postscript_name,
                    full_name: &self.names.full_name,
                    family_name: &self.names.family,
                    weight: if self.names.bold { "Bold" } else { "Regular" },
                    version: &self.names.version_string["Version ".len()..],
                    notice: self.names.copyright.as_deref(),
                };
                let glyphs: Vec<CffGlyph<'_>> = self
                    .order
                    .iter()
                    .map(|g| CffGlyph {
                        name: &g.name,
                        outline: &g.outline,
                        advance: g.advance,
                    })
                    .collect();
                out.push((*b"CFF ", cff::build_cff(&cff_names, &glyphs, self.bbox, upem)));
                out.push((*b"head", tables::build_head(&self.names, upem, self.bbox, true)));
                out.push((*b"maxp", tables::build_maxp_cff(num_glyphs)));
                out.push((*b"post", tables::build_post_v3(upem, self.names.italic)));
            }
            None => {
                return Err(SynthError::AssemblyOutOfOrder {
                    expected: AssemblyStage::ComputingOffsets,
                    actual: self.stage,
                })
            }
        }

        debug!("encoded {} tables for {} glyphs", out.len(), num_glyphs);
        self.tables = out;
        self.stage = AssemblyStage::EncodingTables;
        Ok(())
    }

    /// Lay out the directory and sum every table.
    pub fn compute_checksums(&mut self) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::EncodingTables)?;
        self.records = sfnt::layout(&self.tables);
        self.stage = AssemblyStage::ComputingChecksums;
        Ok(())
    }

    /// Write the file and patch `head.checkSumAdjustment`.
    pub fn finalize_header(&mut self) -> SynthResult<()> {
        self.expect_stage(AssemblyStage::ComputingChecksums)?;
        let version = match self.format {
            OutputFormat::Ttf => sfnt::TRUETYPE_VERSION,
            OutputFormat::Otf => sfnt::CFF_VERSION,
        };
        let mut font = sfnt::write_font(version, &self.tables, &self.records);
        let head = self
            .records
            .iter()
            .find(|r| &r.tag == b"head")
            .copied()
            .ok_or_else(|| SynthError::pipeline("head table missing from directory", None))?;
        self.checksum_adjustment = sfnt::patch_checksum_adjustment(&mut font, &head);
        self.font = font;
        self.stage = AssemblyStage::FinalizingHeader;
        Ok(())
    }

    /// Hand the finished binary out; the assembler is spent afterwards.
    pub fn finish(&mut self) -> SynthResult<AssembledFont> {
        self.expect_stage(AssemblyStage::FinalizingHeader)?;
        self.stage = AssemblyStage::Done;
        Ok(AssembledFont {
            bytes: std::mem::take(&mut self.font),
            num_glyphs: self.order.len() as u16,
            bbox: self.bbox,
            tables: std::mem::take(&mut self.records),
            checksum_adjustment: self.checksum_adjustment,
        })
    }

    /// Run every remaining step in order.
    pub fn assemble(mut self) -> SynthResult<AssembledFont> {
        self.compute_offsets()?;
        self.encode_tables()?;
        self.compute_checksums()?;
        self.finalize_header()?;
        self.finish()
    }
}
