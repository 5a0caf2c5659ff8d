//! Glyph substitution (`gsub`) implementation.
//!
//! > The Glyph Substitution (GSUB) table provides data for substition of glyphs for appropriate
//! > rendering of scripts, such as cursively-connecting forms in Arabic script, or for advanced
//! > typographic effects, such as ligatures.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/gsub>

use std::cmp;
use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use log::{debug, trace, warn};
use tinyvec::TinyVec;

use crate::context::{ContextLookupHelper, Glyph, GlyphFilter, GlyphTable, MatchType};
use crate::error::{ParseError, SubstError};
use crate::gdef::{self, GDEFTable};
use crate::layout::{
    chain_context_lookup_info, context_lookup_info, AlternateSet, AlternateSubst,
    ChainContextLookup, ContextLookup, LangSys, LayoutCache, LayoutTable, Ligature,
    LigatureSubst, LookupCacheItem, LookupList, MultipleSubst, ReverseChainSingleSubst,
    SequenceTable, SingleSubst, SubstLookup, GSUB,
};
use crate::tag::DisplayTag;

/// How deeply contextual lookups may nest other contextual lookups.
///
/// Positions where the limit is reached are left as they are and processing moves on.
pub const SUBST_RECURSION_LIMIT: usize = 8;

/// One entry of the caller's feature map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeatureInfo {
    pub feature_tag: u32,
    pub enabled: bool,
    /// Index into alternate sets for alternate substitutions made by this feature. Defaults
    /// to the first alternate.
    pub alternate: Option<usize>,
}

impl FeatureInfo {
    pub fn new(feature_tag: u32) -> FeatureInfo {
        FeatureInfo {
            feature_tag,
            enabled: true,
            alternate: None,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct GlyphFlags: u8 {
        /// Consumed by a ligature or an empty sequence. Removed when the lookup finishes.
        const DELETED = 0x01;
        const SUBSTITUTED = 0x02;
        const LIGATURE = 0x04;
        /// Second or later output of a multiple substitution.
        const MULTI_SUBST_DUP = 0x08;
    }
}

#[derive(Clone, Debug)]
pub struct RawGlyph<T> {
    pub glyph_index: u16,
    /// Indices of the characters this glyph was made from, ascending.
    pub char_indices: TinyVec<[usize; 2]>,
    pub liga_component_pos: u16,
    pub flags: GlyphFlags,
    pub extra_data: T,
}

/// `merge` is called during ligature substitution (i.e. merging of glyphs),
/// and determines how the `RawGlyph.extra_data` field should be merged
pub trait GlyphData: Clone {
    fn merge(data1: Self, data2: Self) -> Self;
}

impl GlyphData for () {
    fn merge(_data1: (), _data2: ()) {}
}

impl<T> RawGlyph<T> {
    pub fn new(glyph_index: u16, char_index: usize, extra_data: T) -> RawGlyph<T> {
        let mut char_indices = TinyVec::new();
        char_indices.push(char_index);
        RawGlyph {
            glyph_index,
            char_indices,
            liga_component_pos: 0,
            flags: GlyphFlags::empty(),
            extra_data,
        }
    }

    fn substitute(&mut self, glyph_index: u16) {
        self.glyph_index = glyph_index;
        self.flags.insert(GlyphFlags::SUBSTITUTED);
    }
}

impl<T> Glyph for RawGlyph<T> {
    fn get_glyph_index(&self) -> u16 {
        self.glyph_index
    }

    fn is_deleted(&self) -> bool {
        self.flags.contains(GlyphFlags::DELETED)
    }
}

impl Ligature {
    /// Returns the index of the last component when the ligature matches at `i`.
    pub fn matches<T>(
        &self,
        match_type: MatchType<'_>,
        opt_gdef_table: Option<&GDEFTable>,
        i: usize,
        glyphs: &[RawGlyph<T>],
    ) -> Option<usize> {
        let mut last_index = i;
        match_type
            .match_front(
                opt_gdef_table,
                &GlyphTable::ById(&self.component_glyphs),
                glyphs,
                i,
                &mut last_index,
            )
            .then_some(last_index)
    }

    /// Form the ligature at `i`, returning the number of positions it spans.
    ///
    /// Components after the first are flagged as deleted. Skipped marks and marks directly
    /// following the ligature record the component they attach to.
    pub fn apply<T: GlyphData>(
        &self,
        match_type: MatchType<'_>,
        opt_gdef_table: Option<&GDEFTable>,
        i: usize,
        glyphs: &mut [RawGlyph<T>],
    ) -> usize {
        let mut index = i + 1;
        let mut matched = 0;
        while matched < self.component_glyphs.len() && index < glyphs.len() {
            if match_type.match_glyph(opt_gdef_table, &glyphs[index]) {
                matched += 1;
                let component = glyphs[index].clone();
                for char_index in component.char_indices {
                    if !glyphs[i].char_indices.contains(&char_index) {
                        glyphs[i].char_indices.push(char_index);
                    }
                }
                glyphs[i].extra_data =
                    GlyphData::merge(glyphs[i].extra_data.clone(), component.extra_data);
                glyphs[index].flags.insert(GlyphFlags::DELETED);
            } else if !glyphs[index].is_deleted() {
                glyphs[index].liga_component_pos = matched as u16;
            }
            index += 1;
        }
        let span = index - i;
        while index < glyphs.len()
            && !glyphs[index].is_deleted()
            && gdef::gdef_is_mark(opt_gdef_table, glyphs[index].glyph_index)
        {
            glyphs[index].liga_component_pos = matched as u16;
            index += 1;
        }
        glyphs[i].char_indices.sort_unstable();
        glyphs[i].substitute(self.ligature_glyph);
        glyphs[i].flags.insert(GlyphFlags::LIGATURE);
        span
    }
}

/// Whether applying `feature_tag` would change the glyph at `i`.
///
/// Lookups of unsupported types are ignored.
pub fn gsub_feature_would_apply<T: GlyphData>(
    cache: &LayoutCache<GSUB>,
    gsub_table: &LayoutTable<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    langsys: &LangSys,
    feature_tag: u32,
    glyphs: &[RawGlyph<T>],
    i: usize,
) -> Result<bool, SubstError> {
    if let Some(feature_table) = gsub_table.find_langsys_feature(langsys, feature_tag)? {
        if let Some(ref lookup_list) = gsub_table.opt_lookup_list {
            for lookup_index in &feature_table.lookup_indices {
                let lookup_index = usize::from(*lookup_index);
                let lookup = match lookup_list.lookup_cache_gsub(cache, lookup_index) {
                    Ok(lookup) => lookup,
                    Err(SubstError::UnsupportedSubtableType(_)) => continue,
                    Err(err) => return Err(err),
                };
                if gsub_lookup_would_apply(opt_gdef_table, opt_filter, &lookup, glyphs, i)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Whether `lookup` would change the glyph at `i`. Nested lookups are not consulted.
pub fn gsub_lookup_would_apply<T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    lookup: &LookupCacheItem<SubstLookup>,
    glyphs: &[RawGlyph<T>],
    i: usize,
) -> Result<bool, SubstError> {
    let match_type =
        MatchType::from_lookup_flag(lookup.lookup_flag, lookup.mark_filtering_set, opt_filter);
    if i >= glyphs.len() || !match_type.match_glyph(opt_gdef_table, &glyphs[i]) {
        return Ok(false);
    }
    let would_apply = match lookup.lookup_subtables {
        SubstLookup::SingleSubst(ref subtables) => {
            singlesubst_would_apply(subtables, i, glyphs)?.is_some()
        }
        SubstLookup::MultipleSubst(ref subtables) => {
            multiplesubst_would_apply(subtables, i, glyphs)?.is_some()
        }
        SubstLookup::AlternateSubst(ref subtables) => {
            alternatesubst_would_apply(subtables, i, glyphs)?.is_some()
        }
        SubstLookup::LigatureSubst(ref subtables) => {
            ligaturesubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)?.is_some()
        }
        SubstLookup::ContextSubst(ref subtables) => {
            contextsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)?.is_some()
        }
        SubstLookup::ChainContextSubst(ref subtables) => {
            chaincontextsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)?
                .is_some()
        }
        SubstLookup::ReverseChainSingleSubst(ref subtables) => {
            reversechainsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)?
                .is_some()
        }
    };
    Ok(would_apply)
}

/// Apply one lookup across the whole glyph sequence.
///
/// The pass runs in logical order. If `right_to_left` differs from the lookup's own
/// right-to-left flag the glyphs are taken to be stored in reverse, so the pass runs from the
/// end of the vector. Deleted glyphs are removed before returning, even on error. Returns the
/// new glyph count.
pub fn gsub_apply_lookup<T: GlyphData>(
    cache: &LayoutCache<GSUB>,
    lookup_list: &LookupList<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    lookup_index: usize,
    feature_tag: u32,
    opt_alternate: Option<usize>,
    right_to_left: bool,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<usize, SubstError> {
    let lookup = lookup_list.lookup_cache_gsub(cache, lookup_index)?;
    let reversed = right_to_left ^ lookup.lookup_flag.get_rtl();
    trace!(
        "lookup {} ('{}'){}",
        lookup_index,
        DisplayTag(feature_tag),
        if reversed { " reversed" } else { "" }
    );

    if reversed {
        glyphs.reverse();
    }
    let result = apply_lookup_pass(
        cache,
        lookup_list,
        opt_gdef_table,
        opt_filter,
        &lookup,
        opt_alternate,
        glyphs,
    );
    if reversed {
        glyphs.reverse();
    }
    glyphs.retain(|glyph| !glyph.is_deleted());
    result.map(|()| glyphs.len())
}

fn apply_lookup_pass<T: GlyphData>(
    cache: &LayoutCache<GSUB>,
    lookup_list: &LookupList<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    lookup: &LookupCacheItem<SubstLookup>,
    opt_alternate: Option<usize>,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<(), SubstError> {
    let match_type =
        MatchType::from_lookup_flag(lookup.lookup_flag, lookup.mark_filtering_set, opt_filter);
    if let SubstLookup::ReverseChainSingleSubst(ref subtables) = lookup.lookup_subtables {
        for i in (0..glyphs.len()).rev() {
            if match_type.match_glyph(opt_gdef_table, &glyphs[i]) {
                reversechainsubst(opt_gdef_table, subtables, match_type, i, glyphs)?;
            }
        }
        return Ok(());
    }

    let mut i = 0;
    while i < glyphs.len() {
        if !match_type.match_glyph(opt_gdef_table, &glyphs[i]) {
            i += 1;
            continue;
        }
        let result = apply_subst_lookup(
            SUBST_RECURSION_LIMIT,
            cache,
            lookup_list,
            opt_gdef_table,
            opt_filter,
            lookup,
            opt_alternate,
            i,
            glyphs,
        );
        let consumed = match result? {
            Some((length, _changes)) => length,
            None => 1,
        };
        i += cmp::max(consumed, 1);
    }
    Ok(())
}

/// Apply `lookup` at position `i`.
///
/// On success returns the number of positions the substitution spans after it was made, and
/// the change in the length of `glyphs`.
fn apply_subst_lookup<T: GlyphData>(
    recursion_limit: usize,
    cache: &LayoutCache<GSUB>,
    lookup_list: &LookupList<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    lookup: &LookupCacheItem<SubstLookup>,
    opt_alternate: Option<usize>,
    i: usize,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<Option<(usize, isize)>, SubstError> {
    let match_type =
        MatchType::from_lookup_flag(lookup.lookup_flag, lookup.mark_filtering_set, opt_filter);
    match lookup.lookup_subtables {
        SubstLookup::SingleSubst(ref subtables) => Ok(singlesubst(subtables, i, glyphs)?),
        SubstLookup::MultipleSubst(ref subtables) => Ok(multiplesubst(subtables, i, glyphs)?),
        SubstLookup::AlternateSubst(ref subtables) => {
            let alternate = opt_alternate.unwrap_or(0);
            Ok(alternatesubst(subtables, alternate, i, glyphs)?)
        }
        SubstLookup::LigatureSubst(ref subtables) => Ok(ligaturesubst(
            opt_gdef_table,
            subtables,
            match_type,
            i,
            glyphs,
        )?),
        SubstLookup::ContextSubst(ref subtables) => {
            match contextsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)? {
                Some(subst) => apply_subst_context(
                    recursion_limit,
                    cache,
                    lookup_list,
                    opt_gdef_table,
                    opt_filter,
                    match_type,
                    opt_alternate,
                    &subst,
                    i,
                    glyphs,
                ),
                None => Ok(None),
            }
        }
        SubstLookup::ChainContextSubst(ref subtables) => {
            match chaincontextsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)?
            {
                Some(subst) => apply_subst_context(
                    recursion_limit,
                    cache,
                    lookup_list,
                    opt_gdef_table,
                    opt_filter,
                    match_type,
                    opt_alternate,
                    &subst,
                    i,
                    glyphs,
                ),
                None => Ok(None),
            }
        }
        SubstLookup::ReverseChainSingleSubst(ref subtables) => Ok(reversechainsubst(
            opt_gdef_table,
            subtables,
            match_type,
            i,
            glyphs,
        )?),
    }
}

fn singlesubst_would_apply<T: GlyphData>(
    subtables: &[SingleSubst],
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<u16>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for single_subst in subtables {
        if let Some(glyph_index) = single_subst.apply_glyph(glyph_index)? {
            return Ok(Some(glyph_index));
        }
    }
    Ok(None)
}

fn singlesubst<T: GlyphData>(
    subtables: &[SingleSubst],
    i: usize,
    glyphs: &mut [RawGlyph<T>],
) -> Result<Option<(usize, isize)>, ParseError> {
    match singlesubst_would_apply(subtables, i, glyphs)? {
        Some(output_glyph) => {
            glyphs[i].substitute(output_glyph);
            Ok(Some((1, 0)))
        }
        None => Ok(None),
    }
}

fn multiplesubst_would_apply<'a, T: GlyphData>(
    subtables: &'a [MultipleSubst],
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<&'a SequenceTable>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for multiple_subst in subtables {
        if let Some(sequence_table) = multiple_subst.apply_glyph(glyph_index)? {
            return Ok(Some(sequence_table));
        }
    }
    Ok(None)
}

fn multiplesubst<T: GlyphData>(
    subtables: &[MultipleSubst],
    i: usize,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<Option<(usize, isize)>, ParseError> {
    let sequence_table = match multiplesubst_would_apply(subtables, i, glyphs)? {
        Some(sequence_table) => sequence_table,
        None => return Ok(None),
    };
    match sequence_table.substitute_glyphs.split_first() {
        Some((&first_glyph_index, rest)) => {
            glyphs[i].substitute(first_glyph_index);
            for (j, &output_glyph_index) in rest.iter().enumerate() {
                let mut glyph = glyphs[i].clone();
                glyph.glyph_index = output_glyph_index;
                glyph.liga_component_pos = 0;
                glyph.flags.insert(GlyphFlags::MULTI_SUBST_DUP);
                glyphs.insert(i + j + 1, glyph);
            }
            let count = sequence_table.substitute_glyphs.len();
            Ok(Some((count, count as isize - 1)))
        }
        None => {
            // Empty sequences are not allowed by OpenType, but fonts contain them
            glyphs[i].flags.insert(GlyphFlags::DELETED);
            Ok(Some((1, 0)))
        }
    }
}

fn alternatesubst_would_apply<'a, T: GlyphData>(
    subtables: &'a [AlternateSubst],
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<&'a AlternateSet>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for alternate_subst in subtables {
        if let Some(alternate_set) = alternate_subst.apply_glyph(glyph_index)? {
            return Ok(Some(alternate_set));
        }
    }
    Ok(None)
}

fn alternatesubst<T: GlyphData>(
    subtables: &[AlternateSubst],
    alternate: usize,
    i: usize,
    glyphs: &mut [RawGlyph<T>],
) -> Result<Option<(usize, isize)>, ParseError> {
    if let Some(alternateset) = alternatesubst_would_apply(subtables, i, glyphs)? {
        if let Some(&alternate_glyph) = alternateset.alternate_glyphs.get(alternate) {
            glyphs[i].substitute(alternate_glyph);
            return Ok(Some((1, 0)));
        }
    }
    Ok(None)
}

fn ligaturesubst_would_apply<'a, T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &'a [LigatureSubst],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<&'a Ligature>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for ligature_subst in subtables {
        if let Some(ligatureset) = ligature_subst.apply_glyph(glyph_index)? {
            for ligature in &ligatureset.ligatures {
                if ligature
                    .matches(match_type, opt_gdef_table, i, glyphs)
                    .is_some()
                {
                    return Ok(Some(ligature));
                }
            }
        }
    }
    Ok(None)
}

fn ligaturesubst<T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &[LigatureSubst],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &mut [RawGlyph<T>],
) -> Result<Option<(usize, isize)>, ParseError> {
    match ligaturesubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)? {
        Some(ligature) => Ok(Some((
            ligature.apply(match_type, opt_gdef_table, i, glyphs),
            0,
        ))),
        None => Ok(None),
    }
}

fn contextsubst_would_apply<'a, T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &'a [ContextLookup],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<ContextLookupHelper<'a>>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for context_lookup in subtables {
        if let Some(context) = context_lookup_info(context_lookup, glyph_index, |context| {
            context.matches(opt_gdef_table, match_type, glyphs, i)
        })? {
            return Ok(Some(context));
        }
    }
    Ok(None)
}

fn chaincontextsubst_would_apply<'a, T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &'a [ChainContextLookup],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<ContextLookupHelper<'a>>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for chain_context_lookup in subtables {
        if let Some(context) =
            chain_context_lookup_info(chain_context_lookup, glyph_index, |context| {
                context.matches(opt_gdef_table, match_type, glyphs, i)
            })?
        {
            return Ok(Some(context));
        }
    }
    Ok(None)
}

fn reversechainsubst_would_apply<T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &[ReverseChainSingleSubst],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &[RawGlyph<T>],
) -> Result<Option<u16>, ParseError> {
    let glyph_index = glyphs[i].glyph_index;
    for reverse_chain in subtables {
        if let Some(output_glyph) = reverse_chain.apply_glyph(glyph_index, |context| {
            context.matches(opt_gdef_table, match_type, glyphs, i)
        })? {
            return Ok(Some(output_glyph));
        }
    }
    Ok(None)
}

fn reversechainsubst<T: GlyphData>(
    opt_gdef_table: Option<&GDEFTable>,
    subtables: &[ReverseChainSingleSubst],
    match_type: MatchType<'_>,
    i: usize,
    glyphs: &mut [RawGlyph<T>],
) -> Result<Option<(usize, isize)>, ParseError> {
    match reversechainsubst_would_apply(opt_gdef_table, subtables, match_type, i, glyphs)? {
        Some(output_glyph) => {
            glyphs[i].substitute(output_glyph);
            Ok(Some((1, 0)))
        }
        None => Ok(None),
    }
}

fn apply_subst_context<T: GlyphData>(
    recursion_limit: usize,
    cache: &LayoutCache<GSUB>,
    lookup_list: &LookupList<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    match_type: MatchType<'_>,
    opt_alternate: Option<usize>,
    subst: &ContextLookupHelper<'_>,
    i: usize,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<Option<(usize, isize)>, SubstError> {
    let len = match match_type.find_nth(
        opt_gdef_table,
        glyphs,
        i,
        subst.match_context.input_table.len(),
    ) {
        Some(last) => last - i + 1,
        None => return Ok(None),
    };
    if subst.lookup_array.is_empty() {
        return Ok(Some((len, 0)));
    }
    if recursion_limit == 0 {
        return Err(SubstError::RecursionLimitExceeded);
    }
    // Nested lookups only touch positions from `i` on, so the outermost context saves those to
    // undo the whole position if the nesting limit is reached further down
    let mut opt_saved = if recursion_limit == SUBST_RECURSION_LIMIT {
        Some(glyphs[i..].to_vec())
    } else {
        None
    };
    let mut changes = 0;
    for (subst_index, subst_lookup_index) in subst.lookup_array {
        let result = apply_subst(
            recursion_limit - 1,
            cache,
            lookup_list,
            opt_gdef_table,
            opt_filter,
            match_type,
            opt_alternate,
            usize::from(*subst_index),
            usize::from(*subst_lookup_index),
            i,
            glyphs,
        );
        match result {
            Ok(Some(change)) => changes += change,
            Ok(None) => {}
            Err(SubstError::UnsupportedSubtableType(lookup_type)) => warn!(
                "skipping nested lookup {}: unsupported subtable type {}",
                subst_lookup_index, lookup_type
            ),
            Err(SubstError::RecursionLimitExceeded) => match opt_saved.take() {
                Some(saved) => {
                    debug!("lookup nesting limit reached at glyph position {}", i);
                    glyphs.truncate(i);
                    glyphs.extend(saved);
                    return Ok(None);
                }
                None => return Err(SubstError::RecursionLimitExceeded),
            },
            Err(err) => return Err(err),
        }
    }
    // Nested substitutions may delete positions, but they are only removed after the lookup
    let new_len = cmp::max(len as isize + changes, 0) as usize;
    Ok(Some((new_len, changes)))
}

fn apply_subst<T: GlyphData>(
    recursion_limit: usize,
    cache: &LayoutCache<GSUB>,
    lookup_list: &LookupList<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    parent_match_type: MatchType<'_>,
    opt_alternate: Option<usize>,
    subst_index: usize,
    lookup_index: usize,
    index: usize,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<Option<isize>, SubstError> {
    // A sequence index past the matched glyphs is ignored
    let i = match parent_match_type.find_nth(opt_gdef_table, glyphs, index, subst_index) {
        Some(i) => i,
        None => return Ok(None),
    };
    let lookup = lookup_list.lookup_cache_gsub(cache, lookup_index)?;
    let match_type =
        MatchType::from_lookup_flag(lookup.lookup_flag, lookup.mark_filtering_set, opt_filter);
    if !match_type.match_glyph(opt_gdef_table, &glyphs[i]) {
        return Ok(None);
    }
    let result = apply_subst_lookup(
        recursion_limit,
        cache,
        lookup_list,
        opt_gdef_table,
        opt_filter,
        &lookup,
        opt_alternate,
        i,
        glyphs,
    )?;
    Ok(result.map(|(_length, change)| change))
}

/// Resolve the enabled features of `features` to the lookups to apply, in order.
///
/// With `feature_order` each enabled feature contributes its lookups in ascending index order,
/// one feature after another, so a lookup selected by two features runs twice. Without it the
/// lookups of all enabled features are merged and each runs once in ascending index order,
/// attributed to the first feature that selected it.
pub fn build_lookups<'f>(
    gsub_table: &LayoutTable<'_, GSUB>,
    langsys: &LangSys,
    features: &'f [FeatureInfo],
    feature_order: bool,
) -> Result<Vec<(usize, &'f FeatureInfo)>, ParseError> {
    let enabled_features = features.iter().filter(|feature_info| feature_info.enabled);
    if feature_order {
        let mut lookups = Vec::new();
        for feature_info in enabled_features {
            if let Some(feature_table) =
                gsub_table.find_langsys_feature(langsys, feature_info.feature_tag)?
            {
                let lookup_indices = feature_table
                    .lookup_indices
                    .iter()
                    .map(|lookup_index| usize::from(*lookup_index))
                    .collect::<BTreeSet<_>>();
                lookups.extend(
                    lookup_indices
                        .into_iter()
                        .map(|lookup_index| (lookup_index, feature_info)),
                );
            }
        }
        Ok(lookups)
    } else {
        let mut lookups = BTreeMap::new();
        for feature_info in enabled_features {
            if let Some(feature_table) =
                gsub_table.find_langsys_feature(langsys, feature_info.feature_tag)?
            {
                for lookup_index in &feature_table.lookup_indices {
                    lookups
                        .entry(usize::from(*lookup_index))
                        .or_insert(feature_info);
                }
            }
        }
        // note: into_iter() returns sorted by key
        Ok(lookups.into_iter().collect())
    }
}

/// Apply the enabled features of `features` to `glyphs` for the given script and language.
///
/// Unknown scripts and languages fall back to the default entries of the table. If there is
/// no applicable language system nothing is done. Lookups of unsupported types are skipped.
/// Returns the new glyph count, or an error if the table is malformed, in which case `glyphs`
/// holds the result of the lookups applied so far.
pub fn gsub_process<T: GlyphData>(
    gsub_table: &LayoutTable<'_, GSUB>,
    opt_gdef_table: Option<&GDEFTable>,
    opt_filter: Option<&dyn GlyphFilter>,
    script_tag: u32,
    opt_lang_tag: Option<u32>,
    features: &[FeatureInfo],
    feature_order: bool,
    right_to_left: bool,
    glyphs: &mut Vec<RawGlyph<T>>,
) -> Result<usize, SubstError> {
    let lookup_list = match gsub_table.opt_lookup_list {
        Some(ref lookup_list) => lookup_list,
        None => return Ok(glyphs.len()),
    };
    let opt_langsys = gsub_table
        .find_script_or_default(script_tag)
        .and_then(|script| script.find_langsys_or_default(opt_lang_tag));
    let langsys = match opt_langsys {
        Some(langsys) => langsys,
        None => return Ok(glyphs.len()),
    };

    let lookups = build_lookups(gsub_table, langsys, features, feature_order)?;
    let cache = LayoutCache::new();
    for (lookup_index, feature_info) in lookups {
        let result = gsub_apply_lookup(
            &cache,
            lookup_list,
            opt_gdef_table,
            opt_filter,
            lookup_index,
            feature_info.feature_tag,
            feature_info.alternate,
            right_to_left,
            glyphs,
        );
        match result {
            Ok(_) => {}
            Err(SubstError::UnsupportedSubtableType(lookup_type)) => warn!(
                "skipping lookup {} ('{}'): unsupported subtable type {}",
                lookup_index,
                DisplayTag(feature_info.feature_tag),
                lookup_type
            ),
            Err(err) => return Err(err),
        }
    }
    Ok(glyphs.len())
}
