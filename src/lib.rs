#![warn(rust_2018_idioms)]

//! OpenType glyph substitution.
//!
//! Reads the `GSUB` table directly from font data and applies its lookups to a sequence of
//! glyphs, as selected by script, language and feature tags. See [gsub::gsub_process].

/// Reading of binary data.
pub mod binary;
pub mod context;
pub mod error;
pub mod gdef;
pub mod gsub;
pub mod layout;
pub mod size;
pub mod tag;
