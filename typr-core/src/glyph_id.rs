//! Glyph identities: Unicode scalars or named glyphs (made by FontLab https://www.fontlab.com/)

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One logical glyph in a request.
///
/// Characters are ordered before named glyphs; characters by code point,
/// names lexically. That ordering is also the glyph order in the font.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlyphId {
    Char(char),
    Named(String),
}

impl GlyphId {
    pub fn codepoint(&self) -> Option<u32> {
        match self {
            GlyphId::Char(ch) => Some(*ch as u32),
            GlyphId::Named(_) => None,
        }
    }

    /// PostScript glyph name used by `post` and `CFF `.
    pub fn glyph_name(&self) -> String {
        match self {
            GlyphId::Char(' ') => "space".to_string(),
            GlyphId::Char(ch) if ch.is_ascii_alphabetic() => ch.to_string(),
            GlyphId::Char(ch) if (*ch as u32) <= 0xFFFF => format!("uni{:04X}", *ch as u32),
            GlyphId::Char(ch) => format!("u{:05X}", *ch as u32),
            GlyphId::Named(name) => name.clone(),
        }
    }
}

impl fmt::Display for GlyphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphId::Char(ch) if ch.is_whitespace() || ch.is_control() => {
                write!(f, "U+{:04X}", *ch as u32)
            }
            GlyphId::Char(ch) => write!(f, "{ch}"),
            GlyphId::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for GlyphId {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self> {
        parse_glyph_id(token)
    }
}

impl From<char> for GlyphId {
    fn from(ch: char) -> Self {
        GlyphId::Char(ch)
    }
}

impl Serialize for GlyphId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GlyphId::Char(ch) => serializer.serialize_str(&ch.to_string()),
            GlyphId::Named(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for GlyphId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_glyph_id(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse `A`, `U+0041` or a glyph name such as `a.alt` into a [`GlyphId`].
pub fn parse_glyph_id(token: &str) -> Result<GlyphId> {
    let mut chars = token.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Ok(GlyphId::Char(ch));
    }

    if let Some(hex) = token
        .strip_prefix("U+")
        .or_else(|| token.strip_prefix("u+"))
    {
        let cp = u32::from_str_radix(hex, 16).map_err(|_| anyhow!("invalid codepoint: {token}"))?;
        return char::from_u32(cp)
            .map(GlyphId::Char)
            .ok_or_else(|| anyhow!("invalid Unicode scalar: U+{cp:04X}"));
    }

    if token == ".notdef" {
        return Err(anyhow!(".notdef is reserved for glyph 0"));
    }
    if token.len() > 63 || !glyph_name_pattern().is_match(token) {
        return Err(anyhow!("invalid glyph name: {token:?}"));
    }
    Ok(GlyphId::Named(token.to_string()))
}

fn glyph_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_.][A-Za-z0-9_.]*$").expect("static regex"))
}
