//! Table directory, checksums and the two-pass `checkSumAdjustment` patch.
//!
//! Table checksums are taken over each table padded to four bytes, with the
//! `head` adjustment field still zero. Only once the whole file is laid out
//! is `0xB1B0AFBA - sum(file)` written back into `head`.

use byteorder::{BigEndian, ByteOrder};

use super::writer::{search_params, TableWriter, Tag};

pub const TRUETYPE_VERSION: u32 = 0x0001_0000;
/// `OTTO`
pub const CFF_VERSION: u32 = 0x4F54_544F;

const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
/// Byte offset of `checkSumAdjustment` inside `head`.
pub const HEAD_ADJUSTMENT_OFFSET: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// Wrapping sum of big-endian u32 words, zero-padding the tail.
pub fn table_checksum(data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(4);
    let mut sum = chunks
        .by_ref()
        .fold(0u32, |acc, word| acc.wrapping_add(BigEndian::read_u32(word)));
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        sum = sum.wrapping_add(BigEndian::read_u32(&last));
    }
    sum
}

fn directory_len(num_tables: usize) -> usize {
    12 + 16 * num_tables
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Records for `tables` in tag order, with 4-byte aligned offsets.
pub fn layout(tables: &[(Tag, Vec<u8>)]) -> Vec<TableRecord> {
    let mut sorted: Vec<&(Tag, Vec<u8>)> = tables.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut offset = directory_len(tables.len());
    sorted
        .into_iter()
        .map(|(tag, data)| {
            let record = TableRecord {
                tag: *tag,
                checksum: table_checksum(data),
                offset: offset as u32,
                length: data.len() as u32,
            };
            offset += padded(data.len());
            record
        })
        .collect()
}

/// Serialize the offset table, directory and padded table data.
pub fn write_font(sfnt_version: u32, tables: &[(Tag, Vec<u8>)], records: &[TableRecord]) -> Vec<u8> {
    let total = records
        .last()
        .map(|r| r.offset as usize + padded(r.length as usize))
        .unwrap_or_else(|| directory_len(0));
    let mut w = TableWriter::with_capacity(total);

    let (search_range, entry_selector, range_shift) = search_params(records.len() as u16, 16);
    w.u32(sfnt_version)
        .u16(records.len() as u16)
        .u16(search_range)
        .u16(entry_selector)
        .u16(range_shift);
    for r in records {
        w.tag(r.tag).u32(r.checksum).u32(r.offset).u32(r.length);
    }

    for r in records {
        if let Some((_, data)) = tables.iter().find(|(tag, _)| *tag == r.tag) {
            w.bytes(data).align(4);
        }
    }
    w.into_inner()
}

/// `0xB1B0AFBA - sum(file)` with the adjustment field still zero.
pub fn checksum_adjustment(font: &[u8]) -> u32 {
    CHECKSUM_MAGIC.wrapping_sub(table_checksum(font))
}

/// Compute and write the file checksum adjustment into `head`; returns it.
pub fn patch_checksum_adjustment(font: &mut [u8], head: &TableRecord) -> u32 {
    let at = head.offset as usize + HEAD_ADJUSTMENT_OFFSET;
    BigEndian::write_u32(&mut font[at..at + 4], 0);
    let adjustment = checksum_adjustment(font);
    BigEndian::write_u32(&mut font[at..at + 4], adjustment);
    adjustment
}
