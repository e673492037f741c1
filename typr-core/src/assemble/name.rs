//! Naming: metadata validation, derived names and the `name` table.

use chrono::{DateTime, Datelike};

use crate::error::{SynthError, SynthResult};
use crate::request::FontMetadata;

use super::writer::TableWriter;

/// PostScript names are limited to 63 printable ASCII characters.
const PS_NAME_MAX: usize = 63;

/// Seconds between 1904-01-01 and 1970-01-01.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Validated names plus the parsed font revision.
#[derive(Debug, Clone, PartialEq)]
pub struct FontNames {
    pub family: String,
    pub subfamily: String,
    pub full_name: String,
    pub postscript_name: String,
    pub unique_id: String,
    pub version_string: String,
    pub copyright: Option<String>,
    pub designer: Option<String>,
    pub description: Option<String>,
    /// `head.fontRevision` as 16.16 fixed.
    pub revision: u32,
    /// Seconds since 1904 for `head.created`/`modified`.
    pub timestamp: i64,
    pub bold: bool,
    pub italic: bool,
}

fn invalid(msg: impl Into<String>) -> SynthError {
    SynthError::InvalidMetadata(msg.into())
}

fn check_text(field: &str, value: &str) -> SynthResult<()> {
    if value.chars().any(char::is_control) {
        return Err(invalid(format!("{field} contains control characters")));
    }
    Ok(())
}

/// `major.minor` into 16.16 fixed plus the `Version x.yyy` string.
fn parse_version(version: &str) -> SynthResult<(u32, String)> {
    let unparsable = || invalid(format!("version {version:?} is not major.minor"));
    let (major, minor) = match version.split_once('.') {
        Some((a, b)) => (a, b),
        None => (version, "0"),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(major) || !digits(minor) {
        return Err(unparsable());
    }
    let major: u16 = major.parse().map_err(|_| unparsable())?;
    if major > 0x7FFF {
        return Err(unparsable());
    }
    let minor_value: f64 = format!("0.{minor}").parse().map_err(|_| unparsable())?;
    let fraction = ((minor_value * 65536.0).round() as u32).min(0xFFFF);
    let revision = (u32::from(major) << 16) | fraction;
    let shown = format!("{:03}", (minor_value * 1000.0).round() as u32);
    Ok((revision, format!("Version {major}.{shown}")))
}

fn postscript_name(family: &str, subfamily: &str) -> SynthResult<String> {
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_graphic() && !"[](){}<>/%".contains(*c))
            .collect()
    };
    let family = clean(family);
    if family.is_empty() {
        return Err(invalid(
            "family name has no characters usable in a PostScript name",
        ));
    }
    let style = clean(subfamily);
    let mut name = if style.is_empty() {
        family
    } else {
        format!("{family}-{style}")
    };
    name.truncate(PS_NAME_MAX);
    Ok(name)
}

impl FontNames {
    pub fn from_metadata(meta: &FontMetadata) -> SynthResult<Self> {
        let family = meta.family_name.trim();
        if family.is_empty() {
            return Err(invalid("family name is empty"));
        }
        check_text("family name", family)?;
        let subfamily = match meta.subfamily.trim() {
            "" => "Regular",
            s => s,
        };
        check_text("subfamily", subfamily)?;
        for (field, value) in [
            ("author", &meta.author),
            ("description", &meta.description),
            ("copyright", &meta.copyright),
        ] {
            if let Some(v) = value {
                check_text(field, v)?;
            }
        }

        let (revision, version_string) = parse_version(meta.version.trim())?;
        let postscript_name = postscript_name(family, subfamily)?;

        let copyright = match (&meta.copyright, meta.created) {
            (Some(c), _) => Some(c.clone()),
            (None, Some(ts)) => {
                let year = DateTime::from_timestamp(ts, 0)
                    .ok_or_else(|| invalid(format!("creation time {ts} is out of range")))?
                    .year();
                let owner = meta.author.as_deref().unwrap_or(family);
                Some(format!("Copyright (c) {year} {owner}"))
            }
            (None, None) => None,
        };

        let full_name = if subfamily == "Regular" {
            family.to_string()
        } else {
            format!("{family} {subfamily}")
        };
        let lower = subfamily.to_ascii_lowercase();

        let names = Self {
            family: family.to_string(),
            subfamily: subfamily.to_string(),
            full_name,
            unique_id: format!("{};NONE;{postscript_name}", &version_string["Version ".len()..]),
            postscript_name,
            version_string,
            copyright,
            designer: meta.author.clone(),
            description: meta.description.clone(),
            revision,
            timestamp: meta.created.map_or(0, |ts| ts + MAC_EPOCH_OFFSET),
            bold: lower.contains("bold"),
            italic: lower.contains("italic") || lower.contains("oblique"),
        };
        names.check_storage()?;
        Ok(names)
    }

    /// Record lengths and offsets are 16-bit, so each UTF-16 string and
    /// the whole string storage must stay within `u16::MAX` bytes.
    fn check_storage(&self) -> SynthResult<()> {
        let limit = usize::from(u16::MAX);
        let mut total = 0usize;
        for (name_id, text) in self.records() {
            let bytes = text.encode_utf16().count() * 2;
            if bytes > limit {
                return Err(invalid(format!(
                    "name {name_id} needs {bytes} bytes of UTF-16, at most {limit} fit"
                )));
            }
            total += bytes;
        }
        if total > limit {
            return Err(invalid(format!(
                "names need {total} bytes of UTF-16 storage, at most {limit} fit"
            )));
        }
        Ok(())
    }

    /// `(nameID, text)` in ascending id order.
    pub fn records(&self) -> Vec<(u16, &str)> {
        let mut out = Vec::new();
        if let Some(c) = &self.copyright {
            out.push((0, c.as_str()));
        }
        out.push((1, self.family.as_str()));
        out.push((2, self.subfamily.as_str()));
        out.push((3, self.unique_id.as_str()));
        out.push((4, self.full_name.as_str()));
        out.push((5, self.version_string.as_str()));
        out.push((6, self.postscript_name.as_str()));
        if let Some(d) = &self.designer {
            out.push((9, d.as_str()));
        }
        if let Some(d) = &self.description {
            out.push((10, d.as_str()));
        }
        out
    }
}

/// Format 0 `name` table with Windows Unicode BMP English records.
pub fn build_name(names: &FontNames) -> Vec<u8> {
    let records = names.records();
    let storage_offset = 6 + 12 * records.len();

    let mut strings = TableWriter::new();
    let mut w = TableWriter::with_capacity(storage_offset);
    w.u16(0).u16(records.len() as u16).u16(storage_offset as u16);
    for (name_id, text) in &records {
        let offset = strings.len();
        for unit in text.encode_utf16() {
            strings.u16(unit);
        }
        let length = strings.len() - offset;
        w.u16(3)
            .u16(1)
            .u16(0x0409)
            .u16(*name_id)
            .u16(length as u16)
            .u16(offset as u16);
    }
    w.bytes(&strings.into_inner());
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(family: &str) -> FontMetadata {
        FontMetadata::new(family)
    }

    #[test]
    fn derives_names_from_family() {
        let names = FontNames::from_metadata(&meta("My Hand")).unwrap();
        assert_eq!(names.postscript_name, "MyHand-Regular");
        assert_eq!(names.full_name, "My Hand");
        assert_eq!(names.version_string, "Version 1.000");
        assert_eq!(names.revision, 0x0001_0000);
        assert_eq!(names.unique_id, "1.000;NONE;MyHand-Regular");
        assert_eq!(names.timestamp, 0);
        assert!(names.copyright.is_none());
    }

    #[test]
    fn empty_family_is_rejected() {
        assert!(matches!(
            FontNames::from_metadata(&meta("   ")),
            Err(SynthError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn control_characters_are_rejected() {
        let mut m = meta("Hand");
        m.author = Some("bad\u{7}name".into());
        assert!(matches!(
            FontNames::from_metadata(&m),
            Err(SynthError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn family_without_postscript_characters_is_rejected() {
        let err = FontNames::from_metadata(&meta("手書き")).unwrap_err();
        assert!(err.to_string().contains("PostScript"));
    }

    #[test]
    fn versions_parse_into_fixed() {
        assert_eq!(parse_version("2.5").unwrap(), (0x0002_8000, "Version 2.500".into()));
        assert_eq!(parse_version("3").unwrap().0, 0x0003_0000);
        assert!(parse_version("v1").is_err());
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn copyright_year_comes_from_creation_time() {
        let mut m = meta("Hand");
        m.author = Some("Ada".into());
        m.created = Some(1_700_000_000);
        let names = FontNames::from_metadata(&m).unwrap();
        assert_eq!(names.copyright.as_deref(), Some("Copyright (c) 2023 Ada"));
        assert_eq!(names.timestamp, 1_700_000_000 + MAC_EPOCH_OFFSET);
    }

    #[test]
    fn bold_italic_flags_follow_subfamily() {
        let mut m = meta("Hand");
        m.subfamily = "Bold Italic".into();
        let names = FontNames::from_metadata(&m).unwrap();
        assert!(names.bold && names.italic);
        assert_eq!(names.full_name, "Hand Bold Italic");
        assert_eq!(names.postscript_name, "Hand-BoldItalic");
    }

    #[test]
    fn name_table_stores_utf16() {
        let names = FontNames::from_metadata(&meta("Ab")).unwrap();
        let table = build_name(&names);
        let count = u16::from_be_bytes([table[2], table[3]]) as usize;
        assert_eq!(count, 6);
        let storage = u16::from_be_bytes([table[4], table[5]]) as usize;
        assert_eq!(storage, 6 + 12 * count);
        // Without a copyright the family name is the first record.
        let rec = 6;
        assert_eq!(u16::from_be_bytes([table[rec + 6], table[rec + 7]]), 1);
        let off = u16::from_be_bytes([table[rec + 10], table[rec + 11]]) as usize;
        assert_eq!(&table[storage + off..storage + off + 4], &[0, b'A', 0, b'b']);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut m = meta("Hand");
        m.description = Some("x".repeat(40_000));
        let err = FontNames::from_metadata(&m).unwrap_err();
        assert!(matches!(err, SynthError::InvalidMetadata(_)));
        assert!(err.to_string().contains("name 10"));
    }

    #[test]
    fn overfull_name_storage_is_rejected() {
        let mut m = meta("Hand");
        m.author = Some("a".repeat(12_000));
        m.description = Some("d".repeat(12_000));
        m.copyright = Some("c".repeat(12_000));
        let err = FontNames::from_metadata(&m).unwrap_err();
        assert!(err.to_string().contains("storage"));
    }

    #[test]
    fn long_names_within_limits_keep_their_lengths() {
        let mut m = meta("Hand");
        m.description = Some("x".repeat(20_000));
        let names = FontNames::from_metadata(&m).unwrap();
        let table = build_name(&names);
        let count = u16::from_be_bytes([table[2], table[3]]) as usize;
        let last = 6 + 12 * (count - 1);
        assert_eq!(u16::from_be_bytes([table[last + 6], table[last + 7]]), 10);
        assert_eq!(u16::from_be_bytes([table[last + 8], table[last + 9]]), 40_000);
    }
}
