//! Big-endian byte sink shared by every table encoder.

use byteorder::{BigEndian, ByteOrder};

pub type Tag = [u8; 4];

#[derive(Debug, Default, Clone)]
pub struct TableWriter {
    buf: Vec<u8>,
}

impl TableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.buf.push(v as u8);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        let mut b = [0u8; 4];
        BigEndian::write_i32(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    /// `LONGDATETIME`: seconds since 1904-01-01.
    pub fn i64(&mut self, v: i64) -> &mut Self {
        let mut b = [0u8; 8];
        BigEndian::write_i64(&mut b, v);
        self.buf.extend_from_slice(&b);
        self
    }

    pub fn tag(&mut self, tag: Tag) -> &mut Self {
        self.buf.extend_from_slice(&tag);
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Zero-pad to a multiple of `align`.
    pub fn align(&mut self, align: usize) -> &mut Self {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
        self
    }

    pub fn patch_u16(&mut self, at: usize, v: u16) {
        BigEndian::write_u16(&mut self.buf[at..at + 2], v);
    }

    pub fn patch_u32(&mut self, at: usize, v: u32) {
        BigEndian::write_u32(&mut self.buf[at..at + 4], v);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Clamp into `i16`, saturating at the bounds.
pub(crate) fn sat_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Clamp into `u16`, saturating at the bounds.
pub(crate) fn sat_u16(v: i64) -> u16 {
    v.clamp(0, i64::from(u16::MAX)) as u16
}

/// `(searchRange, entrySelector, rangeShift)` for a binary-searchable array
/// of `count` items of `unit` bytes each.
pub(crate) fn search_params(count: u16, unit: u16) -> (u16, u16, u16) {
    if count == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - count.leading_zeros() as u16;
    let search_range = (1u32 << entry_selector) * u32::from(unit);
    let total = u32::from(count) * u32::from(unit);
    (
        search_range as u16,
        entry_selector,
        total.saturating_sub(search_range) as u16,
    )
}
