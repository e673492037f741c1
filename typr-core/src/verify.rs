//! Read a produced font back and check it (made by FontLab https://www.fontlab.com/)
//!
//! Parsing goes through `read-fonts`/`skrifa` so the checks see the binary
//! the way font consumers do, independently of the assembler's own writers.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use read_fonts::tables::name::NameId;
use read_fonts::{FontRef, TableProvider};
use serde::{Deserialize, Serialize};
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlinePen};
use skrifa::{FontRef as SkrifaFontRef, MetadataProvider};

use crate::assemble::sfnt::{table_checksum, HEAD_ADJUSTMENT_OFFSET};

const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub tag: String,
    pub offset: u32,
    pub length: u32,
    pub stored_checksum: u32,
    pub computed_checksum: u32,
}

impl TableSummary {
    pub fn checksum_ok(&self) -> bool {
        self.stored_checksum == self.computed_checksum
    }
}

/// What a font looks like from the outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSummary {
    pub tables: Vec<TableSummary>,
    pub names: Vec<String>,
    pub codepoints: Vec<char>,
    pub num_glyphs: u16,
    pub units_per_em: u16,
    pub checksum_adjustment: u32,
    /// `sum(file with adjustment zeroed) + adjustment == 0xB1B0AFBA`.
    pub file_checksum_ok: bool,
}

impl FontSummary {
    pub fn checksums_ok(&self) -> bool {
        self.file_checksum_ok && self.tables.iter().all(TableSummary::checksum_ok)
    }

    pub fn has_table(&self, tag: &str) -> bool {
        self.tables.iter().any(|t| t.tag == tag)
    }
}

pub fn inspect_path(path: &Path) -> Result<FontSummary> {
    let data = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    inspect(&data).with_context(|| format!("inspecting {}", path.display()))
}

pub fn inspect(data: &[u8]) -> Result<FontSummary> {
    let font = FontRef::new(data)?;
    let sfont = SkrifaFontRef::new(data)?;
    let head = font.head()?;

    let mut tables = Vec::new();
    let mut head_offset = None;
    for rec in font.table_directory.table_records() {
        let offset = rec.offset();
        let length = rec.length();
        let start = offset as usize;
        let end = start
            .checked_add(length as usize)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| anyhow!("table {} runs past the end of the file", rec.tag()))?;

        let mut bytes = data[start..end].to_vec();
        if rec.tag() == read_fonts::types::Tag::new(b"head") {
            head_offset = Some(start);
            if bytes.len() >= HEAD_ADJUSTMENT_OFFSET + 4 {
                bytes[HEAD_ADJUSTMENT_OFFSET..HEAD_ADJUSTMENT_OFFSET + 4].fill(0);
            }
        }
        tables.push(TableSummary {
            tag: rec.tag().to_string(),
            offset,
            length,
            stored_checksum: rec.checksum(),
            computed_checksum: table_checksum(&bytes),
        });
    }

    let file_checksum_ok = match head_offset {
        Some(at) => {
            let mut zeroed = data.to_vec();
            let field = at + HEAD_ADJUSTMENT_OFFSET;
            zeroed[field..field + 4].fill(0);
            table_checksum(&zeroed).wrapping_add(head.checksum_adjustment()) == CHECKSUM_MAGIC
        }
        None => false,
    };

    Ok(FontSummary {
        tables,
        names: collect_names(&font),
        codepoints: collect_codepoints(&sfont),
        num_glyphs: font.maxp()?.num_glyphs(),
        units_per_em: head.units_per_em(),
        checksum_adjustment: head.checksum_adjustment(),
        file_checksum_ok,
    })
}

fn collect_names(font: &FontRef) -> Vec<String> {
    let mut names = Vec::new();

    if let Ok(name_table) = font.name() {
        let data = name_table.string_data();
        let wanted = [
            NameId::FAMILY_NAME,
            NameId::SUBFAMILY_NAME,
            NameId::FULL_NAME,
            NameId::POSTSCRIPT_NAME,
        ];

        for record in name_table.name_record() {
            if !record.is_unicode() || !wanted.contains(&record.name_id()) {
                continue;
            }
            if let Ok(entry) = record.string(data) {
                let rendered = entry.to_string();
                if !rendered.trim().is_empty() {
                    names.push(rendered);
                }
            }
        }
    }

    names
}

fn collect_codepoints(font: &SkrifaFontRef) -> Vec<char> {
    let mut cps: Vec<char> = font
        .charmap()
        .mappings()
        .filter_map(|(cp, _)| char::from_u32(cp))
        .collect();
    cps.sort_unstable();
    cps.dedup();
    cps
}

/// Unscaled advance width of the glyph mapped to `ch`.
pub fn advance_width(data: &[u8], ch: char) -> Result<Option<f32>> {
    let font = SkrifaFontRef::new(data)?;
    let Some(gid) = font.charmap().map(ch) else {
        return Ok(None);
    };
    Ok(font
        .glyph_metrics(Size::unscaled(), LocationRef::default())
        .advance_width(gid))
}

/// Drawing commands counted while rendering one glyph outline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineStats {
    pub contours: usize,
    pub lines: usize,
    pub quads: usize,
    pub curves: usize,
}

impl OutlineStats {
    pub fn is_empty(&self) -> bool {
        self.contours == 0
    }
}

impl OutlinePen for OutlineStats {
    fn move_to(&mut self, _x: f32, _y: f32) {
        self.contours += 1;
    }

    fn line_to(&mut self, _x: f32, _y: f32) {
        self.lines += 1;
    }

    fn quad_to(&mut self, _cx0: f32, _cy0: f32, _x: f32, _y: f32) {
        self.quads += 1;
    }

    fn curve_to(&mut self, _cx0: f32, _cy0: f32, _cx1: f32, _cy1: f32, _x: f32, _y: f32) {
        self.curves += 1;
    }

    fn close(&mut self) {}
}

/// Outline statistics for the glyph mapped to `ch`.
pub fn outline_stats(data: &[u8], ch: char) -> Result<Option<OutlineStats>> {
    let font = SkrifaFontRef::new(data)?;
    let Some(gid) = font.charmap().map(ch) else {
        return Ok(None);
    };
    let outlines = font.outline_glyphs();
    let glyph = outlines
        .get(gid)
        .ok_or_else(|| anyhow!("no outline for glyph {}", gid.to_u32()))?;
    let mut stats = OutlineStats::default();
    glyph
        .draw(
            DrawSettings::unhinted(Size::unscaled(), LocationRef::default()),
            &mut stats,
        )
        .map_err(|err| anyhow!("drawing {ch:?}: {err}"))?;
    Ok(Some(stats))
}
