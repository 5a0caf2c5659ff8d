//! `GDEF` font table parsing and glyph class utilities.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gdef>

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::layout::{ClassDef, Coverage};
use crate::size;

pub const GLYPH_CLASS_NONE: u16 = 0;
pub const GLYPH_CLASS_BASE: u16 = 1;
pub const GLYPH_CLASS_LIGATURE: u16 = 2;
pub const GLYPH_CLASS_MARK: u16 = 3;
pub const GLYPH_CLASS_COMPONENT: u16 = 4;

pub struct GDEFTable {
    pub opt_glyph_classdef: Option<ClassDef>,
    pub opt_mark_attach_classdef: Option<ClassDef>,
    /// Mark glyph sets, present from version 1.2. Indexed by a lookup's mark filtering set.
    pub opt_mark_glyph_sets: Option<Vec<Coverage>>,
}

impl ReadBinary for GDEFTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let minor_version = ctxt.read_u16be()?;
        let glyph_classdef_offset = usize::from(ctxt.read_u16be()?);
        let _attach_list_offset = ctxt.read_u16be()?;
        let _lig_caret_list_offset = ctxt.read_u16be()?;
        // Version 1.0 tables in the wild carry this field too, so it is always read.
        let mark_attach_classdef_offset = usize::from(ctxt.read_u16be()?);
        let mut gdef_header_size = 6 * size::U16;

        let mark_glyph_sets_offset = if minor_version >= 2 {
            gdef_header_size += size::U16;
            usize::from(ctxt.read_u16be()?)
        } else {
            0
        };
        if minor_version >= 3 {
            let _item_var_store_offset = ctxt.read_u32be()?;
            gdef_header_size += size::U32;
        }

        let opt_glyph_classdef = if glyph_classdef_offset < gdef_header_size {
            None
        } else {
            Some(table.offset(glyph_classdef_offset).read::<ClassDef>()?)
        };

        let opt_mark_attach_classdef = if mark_attach_classdef_offset < gdef_header_size {
            None
        } else {
            Some(
                table
                    .offset(mark_attach_classdef_offset)
                    .read::<ClassDef>()?,
            )
        };

        let opt_mark_glyph_sets = if mark_glyph_sets_offset < gdef_header_size {
            None
        } else {
            let mut ctxt = table.offset(mark_glyph_sets_offset).ctxt();
            let mark_glyph_sets_table = ctxt.scope();
            let format = ctxt.read_u16be()?;
            ctxt.check_version(format == 1)?;
            let mark_glyph_set_count = usize::from(ctxt.read_u16be()?);
            let coverage_offsets = ctxt.read_array::<U32Be>(mark_glyph_set_count)?;
            let mut mark_glyph_sets = Vec::with_capacity(mark_glyph_set_count);
            for coverage_offset in &coverage_offsets {
                let coverage = mark_glyph_sets_table
                    .offset(usize::try_from(coverage_offset)?)
                    .read::<Coverage>()?;
                mark_glyph_sets.push(coverage);
            }
            Some(mark_glyph_sets)
        };

        Ok(GDEFTable {
            opt_glyph_classdef,
            opt_mark_attach_classdef,
            opt_mark_glyph_sets,
        })
    }
}

pub fn gdef_is_mark(opt_gdef_table: Option<&GDEFTable>, glyph_index: u16) -> bool {
    glyph_class(opt_gdef_table, glyph_index) == GLYPH_CLASS_MARK
}

pub fn glyph_class(opt_gdef_table: Option<&GDEFTable>, glyph: u16) -> u16 {
    opt_gdef_table
        .and_then(|gdef| gdef.opt_glyph_classdef.as_ref())
        .map(|glyph_classdef| glyph_classdef.glyph_class_value(glyph))
        .unwrap_or(GLYPH_CLASS_NONE)
}

pub fn mark_attach_class(opt_gdef_table: Option<&GDEFTable>, glyph: u16) -> u16 {
    opt_gdef_table
        .and_then(|gdef| gdef.opt_mark_attach_classdef.as_ref())
        .map(|mark_attach_classdef| mark_attach_classdef.glyph_class_value(glyph))
        .unwrap_or(GLYPH_CLASS_NONE)
}

/// Whether `glyph` is a mark that belongs to the mark glyph set at `index`.
pub fn glyph_is_mark_in_set(opt_gdef_table: Option<&GDEFTable>, glyph: u16, index: usize) -> bool {
    gdef_is_mark(opt_gdef_table, glyph)
        && opt_gdef_table
            .and_then(|gdef| gdef.opt_mark_glyph_sets.as_ref())
            .and_then(|mark_glyph_sets| mark_glyph_sets.get(index))
            .is_some_and(|mark_set| mark_set.glyph_coverage_value(glyph).is_some())
}
