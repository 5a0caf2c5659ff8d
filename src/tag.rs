//! Four byte OpenType tags.
//!
//! Script, language system and feature tags are compared as big-endian `u32` values, so `latn`
//! is `0x6C61746E`.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte tag from byte string
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    (chars[3] as u32)
        | ((chars[2] as u32) << 8)
        | ((chars[1] as u32) << 16)
        | ((chars[0] as u32) << 24)
}

/// Convert a string of up to four ASCII characters into a tag, padding with spaces.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut tag: u32 = 0;
    let mut count = 0;

    for c in s.chars() {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }

        tag = (tag << 8) | (c as u32);
        count += 1;
    }

    while count < 4 {
        tag = (tag << 8) | (' ' as u32);
        count += 1;
    }

    Ok(tag)
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.0;
        let mut s = String::with_capacity(4);
        s.push(char::from((tag >> 24) as u8));
        s.push(char::from(((tag >> 16) & 255) as u8));
        s.push(char::from(((tag >> 8) & 255) as u8));
        s.push(char::from((tag & 255) as u8));
        if s.chars().any(|c| !c.is_ascii() || c.is_ascii_control()) {
            write!(f, "0x{:08x}", tag)
        } else {
            s.fmt(f)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

// Tables
pub const GDEF: u32 = tag!(b"GDEF");
pub const GSUB: u32 = tag!(b"GSUB");

// Scripts and language systems
pub const ARAB: u32 = tag!(b"arab");
pub const CYRL: u32 = tag!(b"cyrl");
pub const DEV2: u32 = tag!(b"dev2");
pub const DFLT: u32 = tag!(b"DFLT");
pub const GREK: u32 = tag!(b"grek");
pub const HEBR: u32 = tag!(b"hebr");
pub const LATN: u32 = tag!(b"latn");
pub const SYRC: u32 = tag!(b"syrc");
pub const TRK: u32 = tag!(b"TRK ");

// Substitution features
pub const AALT: u32 = tag!(b"aalt");
pub const C2SC: u32 = tag!(b"c2sc");
pub const CALT: u32 = tag!(b"calt");
pub const CCMP: u32 = tag!(b"ccmp");
pub const CLIG: u32 = tag!(b"clig");
pub const DLIG: u32 = tag!(b"dlig");
pub const FINA: u32 = tag!(b"fina");
pub const FRAC: u32 = tag!(b"frac");
pub const INIT: u32 = tag!(b"init");
pub const ISOL: u32 = tag!(b"isol");
pub const LIGA: u32 = tag!(b"liga");
pub const LOCL: u32 = tag!(b"locl");
pub const MEDI: u32 = tag!(b"medi");
pub const ONUM: u32 = tag!(b"onum");
pub const RLIG: u32 = tag!(b"rlig");
pub const SALT: u32 = tag!(b"salt");
pub const SMCP: u32 = tag!(b"smcp");
pub const SS01: u32 = tag!(b"ss01");
pub const SWSH: u32 = tag!(b"swsh");
pub const VERT: u32 = tag!(b"vert");
