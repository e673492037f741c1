//! `cmap`: format 4 for the BMP, format 12 once anything lies beyond it or
//! the BMP needs more segments than format 4 can hold.

use super::writer::{search_params, TableWriter};

/// Run of consecutive code points mapped to consecutive glyph ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32,
    end: u32,
    glyph: u16,
}

fn runs(mapping: &[(u32, u16)]) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::new();
    for &(cp, gid) in mapping {
        if let Some(last) = out.last_mut() {
            if cp == last.end + 1 && u32::from(gid) == u32::from(last.glyph) + (cp - last.start) {
                last.end = cp;
                continue;
            }
        }
        out.push(Run {
            start: cp,
            end: cp,
            glyph: gid,
        });
    }
    out
}

/// Segments (terminator included) that keep a format 4 `length` within u16.
const FORMAT4_MAX_SEGMENTS: usize = (u16::MAX as usize - 16) / 8;

/// Format 4 subtable and whether it covers every BMP mapping.
///
/// Past [`FORMAT4_MAX_SEGMENTS`] only the leading runs are kept; the caller
/// then relies on format 12 for the rest.
fn format4(mapping: &[(u32, u16)]) -> (Vec<u8>, bool) {
    let bmp: Vec<(u32, u16)> = mapping
        .iter()
        .copied()
        .filter(|(cp, _)| *cp < 0xFFFF)
        .collect();
    let mut segments = runs(&bmp);
    let complete = segments.len() < FORMAT4_MAX_SEGMENTS;
    segments.truncate(FORMAT4_MAX_SEGMENTS - 1);
    // Mandatory terminator segment.
    segments.push(Run {
        start: 0xFFFF,
        end: 0xFFFF,
        glyph: 0,
    });

    let seg_count = segments.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(seg_count, 2);
    let length = 16 + 8 * usize::from(seg_count);

    let mut w = TableWriter::with_capacity(length);
    w.u16(4)
        .u16(length as u16)
        .u16(0)
        .u16(seg_count * 2)
        .u16(search_range)
        .u16(entry_selector)
        .u16(range_shift);
    for s in &segments {
        w.u16(s.end as u16);
    }
    w.u16(0);
    for s in &segments {
        w.u16(s.start as u16);
    }
    for s in &segments {
        let delta = if s.start == 0xFFFF {
            1
        } else {
            (u32::from(s.glyph).wrapping_sub(s.start) & 0xFFFF) as u16
        };
        w.u16(delta);
    }
    for _ in &segments {
        w.u16(0);
    }
    (w.into_inner(), complete)
}

fn format12(mapping: &[(u32, u16)]) -> Vec<u8> {
    let groups = runs(mapping);
    let length = 16 + 12 * groups.len();
    let mut w = TableWriter::with_capacity(length);
    w.u16(12)
        .u16(0)
        .u32(length as u32)
        .u32(0)
        .u32(groups.len() as u32);
    for g in &groups {
        w.u32(g.start).u32(g.end).u32(u32::from(g.glyph));
    }
    w.into_inner()
}

/// Build `cmap` from `(code point, glyph id)` pairs sorted by code point.
pub fn build_cmap(mapping: &[(u32, u16)]) -> Vec<u8> {
    let (bmp, complete) = format4(mapping);
    let needs_full = !complete || mapping.iter().any(|(cp, _)| *cp > 0xFFFF);
    let full = needs_full.then(|| format12(mapping));

    // (platform, encoding, subtable) sorted by platform then encoding.
    let mut records: Vec<(u16, u16, usize)> = vec![(0, 3, 0)];
    if full.is_some() {
        records.push((0, 4, 1));
    }
    records.push((3, 1, 0));
    if full.is_some() {
        records.push((3, 10, 1));
    }

    let header_len = 4 + 8 * records.len();
    let offsets = [header_len, header_len + bmp.len()];

    let mut w = TableWriter::new();
    w.u16(0).u16(records.len() as u16);
    for (platform, encoding, subtable) in &records {
        w.u16(*platform).u16(*encoding).u32(offsets[*subtable] as u32);
    }
    w.bytes(&bmp);
    if let Some(full) = &full {
        w.bytes(full);
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn consecutive_code_points_share_a_segment() {
        let r = runs(&[(0x41, 1), (0x42, 2), (0x43, 3), (0x61, 4), (0x63, 5)]);
        assert_eq!(r.len(), 3);
        assert_eq!((r[0].start, r[0].end, r[0].glyph), (0x41, 0x43, 1));
    }

    #[test]
    fn bmp_only_has_two_records() {
        let cmap = build_cmap(&[(0x20, 1), (0x41, 2)]);
        assert_eq!(BigEndian::read_u16(&cmap[2..4]), 2);
        // Both records point at the same format 4 subtable.
        assert_eq!(&cmap[4..8], &[0, 0, 0, 3]);
        assert_eq!(&cmap[12..16], &[0, 3, 0, 1]);
        let offset = BigEndian::read_u32(&cmap[8..12]) as usize;
        assert_eq!(offset, BigEndian::read_u32(&cmap[16..20]) as usize);
        assert_eq!(BigEndian::read_u16(&cmap[offset..]), 4);
        // 2 runs plus the 0xFFFF terminator.
        assert_eq!(BigEndian::read_u16(&cmap[offset + 6..]), 6);
    }

    #[test]
    fn astral_code_points_add_format12() {
        let cmap = build_cmap(&[(0x41, 1), (0x1F600, 2)]);
        assert_eq!(BigEndian::read_u16(&cmap[2..4]), 4);
        let twelve = BigEndian::read_u32(&cmap[4 + 8 + 4..]) as usize;
        assert_eq!(BigEndian::read_u16(&cmap[twelve..]), 12);
        assert_eq!(BigEndian::read_u32(&cmap[twelve + 12..]), 2);
        assert_eq!(twelve + 16 + 24, cmap.len());
    }

    #[test]
    fn format4_delta_wraps_modulo_65536() {
        let (table, complete) = format4(&[(0x4E00, 3)]);
        assert!(complete);
        // endCode[2], pad, startCode[2], idDelta[2]
        let delta_at = 14 + 4 + 2 + 4;
        let delta = BigEndian::read_u16(&table[delta_at..]);
        assert_eq!(0x4E00u16.wrapping_add(delta), 3);
    }

    #[test]
    fn too_many_bmp_segments_fall_back_to_format12() {
        let mapping: Vec<(u32, u16)> = (0..8200u32)
            .map(|i| (0x4E00 + 2 * i, i as u16 + 1))
            .collect();
        let cmap = build_cmap(&mapping);
        assert_eq!(BigEndian::read_u16(&cmap[2..4]), 4);

        let four = BigEndian::read_u32(&cmap[8..12]) as usize;
        let twelve = BigEndian::read_u32(&cmap[16..20]) as usize;
        assert_eq!(BigEndian::read_u16(&cmap[four..]), 4);
        assert_eq!(BigEndian::read_u16(&cmap[twelve..]), 12);

        // The format 4 length field matches the bytes it actually occupies.
        let length = usize::from(BigEndian::read_u16(&cmap[four + 2..]));
        assert_eq!(length, twelve - four);
        let seg_count = usize::from(BigEndian::read_u16(&cmap[four + 6..])) / 2;
        assert_eq!(seg_count, FORMAT4_MAX_SEGMENTS);
        assert_eq!(length, 16 + 8 * seg_count);
        // Last segment is still the 0xFFFF terminator.
        assert_eq!(BigEndian::read_u16(&cmap[four + 14 + 2 * (seg_count - 1)..]), 0xFFFF);

        // Format 12 carries every mapping.
        assert_eq!(BigEndian::read_u32(&cmap[twelve + 12..]), 8200);
        assert_eq!(twelve + 16 + 12 * 8200, cmap.len());
    }
}
