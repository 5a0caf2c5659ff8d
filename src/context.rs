//! Glyph matching for lookups: lookup flags, skipping of ignored glyphs, and the backtrack, input
//! and lookahead sequences of contextual rules.

use std::rc::Rc;

use crate::gdef::{self, GDEFTable};
use crate::layout::{ClassDef, Coverage, SubstLookupRecord};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LookupFlag(pub u16);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IgnoreMarks {
    NoIgnoreMarks,
    IgnoreAllMarks,
    /// Only marks in this GDEF mark glyph set are considered.
    UseMarkFilteringSet(u16),
    /// Only marks with this mark attachment class are considered.
    IgnoreMarksExcept(u8),
}

/// Caller supplied predicate for glyphs that lookups must skip over.
pub trait GlyphFilter {
    fn excludes(&self, glyph: u16) -> bool;
}

impl<F> GlyphFilter for F
where
    F: Fn(u16) -> bool,
{
    fn excludes(&self, glyph: u16) -> bool {
        self(glyph)
    }
}

/// Which glyphs a lookup considers when matching. Everything else is skipped.
#[derive(Copy, Clone)]
pub struct MatchType<'f> {
    ignore_bases: bool,
    ignore_ligatures: bool,
    ignore_marks: IgnoreMarks,
    opt_filter: Option<&'f dyn GlyphFilter>,
}

pub enum GlyphTable<'a> {
    Empty,
    ById(&'a [u16]),
    ByClassDef(Rc<ClassDef>, &'a [u16]),
    ByCoverage(&'a [Rc<Coverage>]),
}

impl<'a> GlyphTable<'a> {
    pub fn len(&self) -> usize {
        match self {
            GlyphTable::Empty => 0,
            GlyphTable::ById(ref arr) => arr.len(),
            GlyphTable::ByClassDef(_, ref arr) => arr.len(),
            GlyphTable::ByCoverage(ref vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The sequences a contextual rule requires around the current glyph.
///
/// The input table excludes the first input glyph, which the subtable's coverage already matched.
/// The backtrack table is ordered outwards from the current glyph.
pub struct MatchContext<'a> {
    pub backtrack_table: GlyphTable<'a>,
    pub input_table: GlyphTable<'a>,
    pub lookahead_table: GlyphTable<'a>,
}

/// A matched contextual rule with the nested lookups to apply.
pub struct ContextLookupHelper<'a> {
    pub match_context: MatchContext<'a>,
    pub lookup_array: &'a [SubstLookupRecord],
}

impl<'a> ContextLookupHelper<'a> {
    pub fn new(
        match_context: MatchContext<'a>,
        lookup_array: &'a [SubstLookupRecord],
    ) -> ContextLookupHelper<'a> {
        ContextLookupHelper {
            match_context,
            lookup_array,
        }
    }
}

pub trait Glyph {
    fn get_glyph_index(&self) -> u16;

    /// Glyphs removed by an earlier substitution in the same pass are never matched.
    fn is_deleted(&self) -> bool {
        false
    }
}

impl LookupFlag {
    pub fn get_rtl(self) -> bool {
        (self.0 & 0x0001) != 0
    }

    pub fn get_ignore_bases(self) -> bool {
        (self.0 & 0x0002) != 0
    }

    pub fn get_ignore_ligatures(self) -> bool {
        (self.0 & 0x0004) != 0
    }

    pub fn get_use_mark_filtering_set(self) -> bool {
        (self.0 & 0x0010) != 0
    }

    pub fn get_ignore_marks(self, opt_mark_filtering_set: Option<u16>) -> IgnoreMarks {
        if (self.0 & 0x8) != 0 {
            IgnoreMarks::IgnoreAllMarks
        } else if let (true, Some(set_index)) =
            (self.get_use_mark_filtering_set(), opt_mark_filtering_set)
        {
            IgnoreMarks::UseMarkFilteringSet(set_index)
        } else if self.0 & 0xFF00 != 0 {
            IgnoreMarks::IgnoreMarksExcept((self.0 >> 8) as u8)
        } else {
            IgnoreMarks::NoIgnoreMarks
        }
    }
}

impl<'f> MatchType<'f> {
    pub fn from_lookup_flag(
        lookup_flag: LookupFlag,
        opt_mark_filtering_set: Option<u16>,
        opt_filter: Option<&'f dyn GlyphFilter>,
    ) -> MatchType<'f> {
        MatchType {
            ignore_bases: lookup_flag.get_ignore_bases(),
            ignore_ligatures: lookup_flag.get_ignore_ligatures(),
            ignore_marks: lookup_flag.get_ignore_marks(opt_mark_filtering_set),
            opt_filter,
        }
    }

    pub fn match_glyph<G: Glyph>(self, opt_gdef_table: Option<&GDEFTable>, glyph: &G) -> bool {
        if glyph.is_deleted() {
            return false;
        }
        let glyph_index = glyph.get_glyph_index();
        if let Some(filter) = self.opt_filter {
            if filter.excludes(glyph_index) {
                return false;
            }
        }
        if !self.ignore_bases
            && !self.ignore_ligatures
            && self.ignore_marks == IgnoreMarks::NoIgnoreMarks
        {
            // fast path that doesn't require checking glyph_class
            return true;
        }
        let glyph_class = gdef::glyph_class(opt_gdef_table, glyph_index);
        if self.ignore_bases && glyph_class == gdef::GLYPH_CLASS_BASE {
            return false;
        }
        if self.ignore_ligatures && glyph_class == gdef::GLYPH_CLASS_LIGATURE {
            return false;
        }
        if glyph_class != gdef::GLYPH_CLASS_MARK {
            return true;
        }
        match self.ignore_marks {
            IgnoreMarks::NoIgnoreMarks => true,
            IgnoreMarks::IgnoreAllMarks => false,
            IgnoreMarks::UseMarkFilteringSet(set_index) => {
                gdef::glyph_is_mark_in_set(opt_gdef_table, glyph_index, usize::from(set_index))
            }
            IgnoreMarks::IgnoreMarksExcept(keep_class) => {
                gdef::mark_attach_class(opt_gdef_table, glyph_index) == u16::from(keep_class)
            }
        }
    }

    // searches backwards from glyphs[index-1]
    pub fn find_prev<G: Glyph>(
        self,
        opt_gdef_table: Option<&GDEFTable>,
        glyphs: &[G],
        mut index: usize,
    ) -> Option<usize> {
        while index > 0 {
            index -= 1;
            if self.match_glyph(opt_gdef_table, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }

    // searches forwards from glyphs[index+1]
    pub fn find_next<G: Glyph>(
        self,
        opt_gdef_table: Option<&GDEFTable>,
        glyphs: &[G],
        mut index: usize,
    ) -> Option<usize> {
        while index + 1 < glyphs.len() {
            index += 1;
            if self.match_glyph(opt_gdef_table, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }

    // count == 0 will return current index
    pub fn find_nth<G: Glyph>(
        self,
        opt_gdef_table: Option<&GDEFTable>,
        glyphs: &[G],
        mut index: usize,
        count: usize,
    ) -> Option<usize> {
        for _ in 0..count {
            match self.find_next(opt_gdef_table, glyphs, index) {
                Some(next_index) => index = next_index,
                None => return None,
            }
        }
        Some(index)
    }

    // searches backwards from glyphs[index-1]
    pub fn match_back<G: Glyph>(
        self,
        opt_gdef_table: Option<&GDEFTable>,
        glyph_table: &GlyphTable<'_>,
        glyphs: &[G],
        mut index: usize,
    ) -> bool {
        for i in 0..glyph_table.len() {
            match self.find_prev(opt_gdef_table, glyphs, index) {
                Some(prev_index) => {
                    index = prev_index;
                    let glyph_index = glyphs[index].get_glyph_index();
                    if !check_glyph_table(glyph_table, i, glyph_index) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    // searches forwards from glyphs[index+1]
    pub fn match_front<G: Glyph>(
        self,
        opt_gdef_table: Option<&GDEFTable>,
        glyph_table: &GlyphTable<'_>,
        glyphs: &[G],
        mut index: usize,
        last_index: &mut usize,
    ) -> bool {
        for i in 0..glyph_table.len() {
            match self.find_next(opt_gdef_table, glyphs, index) {
                Some(next_index) => {
                    index = next_index;
                    let glyph_index = glyphs[index].get_glyph_index();
                    if !check_glyph_table(glyph_table, i, glyph_index) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        *last_index = index;
        true
    }
}

impl<'a> MatchContext<'a> {
    pub fn matches<G: Glyph>(
        &self,
        opt_gdef_table: Option<&GDEFTable>,
        match_type: MatchType<'_>,
        glyphs: &[G],
        index: usize,
    ) -> bool {
        let mut front_index = index;
        match_type.match_back(opt_gdef_table, &self.backtrack_table, glyphs, index)
            && match_type.match_front(
                opt_gdef_table,
                &self.input_table,
                glyphs,
                index,
                &mut front_index,
            )
            && match_type.match_front(
                opt_gdef_table,
                &self.lookahead_table,
                glyphs,
                front_index,
                &mut front_index,
            )
    }
}

fn check_glyph_table(glyph_table: &GlyphTable<'_>, i: usize, glyph_index: u16) -> bool {
    match *glyph_table {
        GlyphTable::Empty => false,
        GlyphTable::ById(ref table) => table[i] == glyph_index,
        GlyphTable::ByClassDef(ref classdef, ref table) => {
            classdef.glyph_class_value(glyph_index) == table[i]
        }
        GlyphTable::ByCoverage(ref vec) => vec[i].glyph_coverage_value(glyph_index).is_some(),
    }
}
