//! Bare CFF (version 1) encoder for OpenType/CFF output.
//!
//! One font, no subroutines, charset format 0 and Type 2 charstrings built
//! from `rmoveto`/`rlineto`/`rrcurveto`. Top DICT offsets use the fixed
//! five-byte integer form so the dictionary length does not depend on them.

use crate::normalize::{BBox, GlyphOutline, OutlineSegment};

use super::writer::TableWriter;

/// Index of the first custom string ID.
const FIRST_CUSTOM_SID: u16 = 391;

mod op {
    pub const VERSION: u8 = 0;
    pub const NOTICE: u8 = 1;
    pub const FULL_NAME: u8 = 2;
    pub const FAMILY_NAME: u8 = 3;
    pub const WEIGHT: u8 = 4;
    pub const FONT_BBOX: u8 = 5;
    pub const CHARSET: u8 = 15;
    pub const CHAR_STRINGS: u8 = 17;
    pub const PRIVATE: u8 = 18;
    pub const DEFAULT_WIDTH_X: u8 = 20;
    pub const NOMINAL_WIDTH_X: u8 = 21;
    pub const ESCAPE: u8 = 12;
    pub const FONT_MATRIX: u8 = 7;

    pub const RLINETO: u8 = 5;
    pub const RRCURVETO: u8 = 8;
    pub const ENDCHAR: u8 = 14;
    pub const RMOVETO: u8 = 21;
}

/// Everything the CFF table needs about one glyph.
#[derive(Debug, Clone)]
pub struct CffGlyph<'a> {
    pub name: &'a str,
    pub outline: &'a GlyphOutline,
    pub advance: u16,
}

#[derive(Debug, Clone)]
pub struct CffNames<'a> {
    pub postscript_name: &'a str,
    pub full_name: &'a str,
    pub family_name: &'a str,
    pub weight: &'a str,
    pub version: &'a str,
    pub notice: Option<&'a str>,
}

/// Standard string IDs for the glyph names this crate generates.
fn standard_sid(name: &str) -> Option<u16> {
    match name {
        ".notdef" => Some(0),
        "space" => Some(1),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c @ 'A'..='Z'), None) => Some(34 + (c as u16 - 'A' as u16)),
                (Some(c @ 'a'..='z'), None) => Some(66 + (c as u16 - 'a' as u16)),
                _ => None,
            }
        }
    }
}

#[derive(Default)]
struct Strings {
    custom: Vec<String>,
}

impl Strings {
    fn sid(&mut self, s: &str) -> u16 {
        if let Some(sid) = standard_sid(s) {
            return sid;
        }
        if let Some(pos) = self.custom.iter().position(|c| c == s) {
            return FIRST_CUSTOM_SID + pos as u16;
        }
        self.custom.push(s.to_string());
        FIRST_CUSTOM_SID + (self.custom.len() - 1) as u16
    }
}

fn index<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let mut w = TableWriter::new();
    w.u16(items.len() as u16);
    if items.is_empty() {
        return w.into_inner();
    }
    let data_len: usize = items.iter().map(|i| i.as_ref().len()).sum();
    let last = data_len + 1;
    let off_size: u8 = match last {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    w.u8(off_size);

    let mut offset = 1usize;
    let put = |w: &mut TableWriter, v: usize| {
        let bytes = (v as u32).to_be_bytes();
        w.bytes(&bytes[4 - off_size as usize..]);
    };
    put(&mut w, offset);
    for item in items {
        offset += item.as_ref().len();
        put(&mut w, offset);
    }
    for item in items {
        w.bytes(item.as_ref());
    }
    w.into_inner()
}

/// Compact DICT/charstring integer operand.
fn push_int(out: &mut Vec<u8>, v: i32) {
    match v {
        -107..=107 => out.push((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            out.push((v / 256 + 247) as u8);
            out.push((v % 256) as u8);
        }
        -1131..=-108 => {
            let v = -v - 108;
            out.push((v / 256 + 251) as u8);
            out.push((v % 256) as u8);
        }
        -32768..=32767 => {
            out.push(28);
            out.extend_from_slice(&(v as i16).to_be_bytes());
        }
        _ => {
            out.push(29);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
}

/// Five-byte DICT integer; used for offsets patched after layout.
fn push_fixed_int(out: &mut Vec<u8>, v: i32) {
    out.push(29);
    out.extend_from_slice(&v.to_be_bytes());
}

/// DICT real number, nibble encoded.
fn push_real(out: &mut Vec<u8>, v: f64) {
    let text = format!("{v}");
    let mut nibbles: Vec<u8> = Vec::with_capacity(text.len() + 1);
    for ch in text.chars() {
        nibbles.push(match ch {
            '0'..='9' => ch as u8 - b'0',
            '.' => 0xA,
            '-' => 0xE,
            _ => continue,
        });
    }
    nibbles.push(0xF);
    if nibbles.len() % 2 == 1 {
        nibbles.push(0xF);
    }
    out.push(30);
    for pair in nibbles.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
}

/// Type 2 charstring for one glyph. CFF winds outer contours
/// counter-clockwise, so every contour is reversed on the way in.
fn charstring(outline: &GlyphOutline, advance: u16) -> Vec<u8> {
    let mut cs = Vec::new();
    // Type 2 operands top out at 16.16 fixed; hmtx carries the real width.
    if advance != 0 {
        push_int(&mut cs, i32::from(advance).min(i32::from(i16::MAX)));
    }

    let mut cur = (0i32, 0i32);
    for contour in &outline.contours {
        let contour = contour.reversed();
        let start = contour.start;
        push_int(&mut cs, start.x - cur.0);
        push_int(&mut cs, start.y - cur.1);
        cs.push(op::RMOVETO);
        cur = (start.x, start.y);

        let n = contour.segments.len();
        for (i, seg) in contour.segments.iter().enumerate() {
            match *seg {
                OutlineSegment::Line(p) => {
                    // Contours close implicitly.
                    if i + 1 == n && p == start {
                        continue;
                    }
                    push_int(&mut cs, p.x - cur.0);
                    push_int(&mut cs, p.y - cur.1);
                    cs.push(op::RLINETO);
                    cur = (p.x, p.y);
                }
                OutlineSegment::Cubic(a, b, p) => {
                    for q in [a, b, p] {
                        push_int(&mut cs, q.x - cur.0);
                        push_int(&mut cs, q.y - cur.1);
                        cur = (q.x, q.y);
                    }
                    cs.push(op::RRCURVETO);
                }
            }
        }
    }

    cs.push(op::ENDCHAR);
    cs
}

fn top_dict(
    strings: &mut Strings,
    names: &CffNames<'_>,
    bbox: BBox,
    units_per_em: u16,
    offsets: (i32, i32, i32, i32),
) -> Vec<u8> {
    let (charset, char_strings, private_size, private_offset) = offsets;
    let mut d = Vec::new();

    push_int(&mut d, i32::from(strings.sid(names.version)));
    d.push(op::VERSION);
    if let Some(notice) = names.notice {
        push_int(&mut d, i32::from(strings.sid(notice)));
        d.push(op::NOTICE);
    }
    push_int(&mut d, i32::from(strings.sid(names.full_name)));
    d.push(op::FULL_NAME);
    push_int(&mut d, i32::from(strings.sid(names.family_name)));
    d.push(op::FAMILY_NAME);
    push_int(&mut d, i32::from(strings.sid(names.weight)));
    d.push(op::WEIGHT);

    if units_per_em != 1000 {
        let s = 1.0 / f64::from(units_per_em);
        for v in [s, 0.0, 0.0, s, 0.0, 0.0] {
            push_real(&mut d, v);
        }
        d.push(op::ESCAPE);
        d.push(op::FONT_MATRIX);
    }

    for v in [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max] {
        push_int(&mut d, v);
    }
    d.push(op::FONT_BBOX);

    push_fixed_int(&mut d, charset);
    d.push(op::CHARSET);
    push_fixed_int(&mut d, char_strings);
    d.push(op::CHAR_STRINGS);
    push_fixed_int(&mut d, private_size);
    push_fixed_int(&mut d, private_offset);
    d.push(op::PRIVATE);
    d
}

/// Encode the complete `CFF ` table; glyph 0 must be `.notdef`.
pub fn build_cff(names: &CffNames<'_>, glyphs: &[CffGlyph<'_>], bbox: BBox, units_per_em: u16) -> Vec<u8> {
    let header = [1u8, 0, 4, 4];
    let name_index = index(&[names.postscript_name.as_bytes()]);

    let mut strings = Strings::default();
    let mut charset = vec![0u8];
    for g in glyphs.iter().skip(1) {
        charset.extend_from_slice(&strings.sid(g.name).to_be_bytes());
    }

    let char_strings: Vec<Vec<u8>> = glyphs
        .iter()
        .map(|g| charstring(g.outline, g.advance))
        .collect();
    let char_strings_index = index(&char_strings);

    let mut private = Vec::new();
    push_int(&mut private, 0);
    private.push(op::DEFAULT_WIDTH_X);
    push_int(&mut private, 0);
    private.push(op::NOMINAL_WIDTH_X);

    // First pass fixes the string table and the Top DICT length.
    let sizing = top_dict(&mut strings, names, bbox, units_per_em, (0, 0, 0, 0));
    let top_index_len = index(&[&sizing]).len();
    let string_index = index(&strings.custom.iter().map(String::as_bytes).collect::<Vec<_>>());
    let global_subrs = index::<&[u8]>(&[]);

    let charset_offset =
        header.len() + name_index.len() + top_index_len + string_index.len() + global_subrs.len();
    let char_strings_offset = charset_offset + charset.len();
    let private_offset = char_strings_offset + char_strings_index.len();

    let top = top_dict(
        &mut strings,
        names,
        bbox,
        units_per_em,
        (
            charset_offset as i32,
            char_strings_offset as i32,
            private.len() as i32,
            private_offset as i32,
        ),
    );
    let top_index = index(&[&top]);

    let mut w = TableWriter::with_capacity(private_offset + private.len());
    w.bytes(&header)
        .bytes(&name_index)
        .bytes(&top_index)
        .bytes(&string_index)
        .bytes(&global_subrs)
        .bytes(&charset)
        .bytes(&char_strings_index)
        .bytes(&private);
    w.into_inner()
}
