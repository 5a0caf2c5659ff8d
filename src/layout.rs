//! Common layout table structures: script, feature and lookup lists, coverage and class
//! definition tables, and the GSUB lookup subtables.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2>

use crate::context::{ContextLookupHelper, GlyphTable, LookupFlag, MatchContext};
use crate::error::{ParseError, SubstError};

use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCache, ReadCtxt, ReadFixedSizeDep,
    ReadFrom, ReadScope,
};
use crate::binary::U16Be;
use crate::size;
use crate::tag::{self, DisplayTag};
use itertools::Itertools;
use log::debug;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::rc::Rc;

pub enum GSUB {}

/// A GSUB style table: script list, feature list and lookup list.
///
/// The script and feature lists are small and read eagerly. Lookups are read on demand from the
/// borrowed table data and memoised in a `LayoutCache`.
pub struct LayoutTable<'a, T> {
    pub opt_script_list: Option<ScriptList>,
    pub opt_feature_list: Option<FeatureList>,
    pub opt_lookup_list: Option<LookupList<'a, T>>,
}

pub struct ScriptList {
    script_records: Vec<ScriptRecord>,
}

pub struct ScriptRecord {
    pub script_tag: u32,
    script_table: ScriptTable,
}

pub struct ScriptTable {
    opt_default_langsys: Option<LangSys>,
    langsys_records: Vec<LangSysRecord>,
}

pub struct LangSysRecord {
    pub langsys_tag: u32,
    langsys_table: LangSys,
}

pub struct LangSys {
    required_feature_index: u16,
    feature_indices: Vec<u16>,
}

pub struct FeatureList {
    feature_records: Vec<FeatureRecord>,
}

pub struct FeatureRecord {
    pub feature_tag: u32,
    feature_table: FeatureTable,
}

pub struct FeatureTable {
    pub lookup_indices: Vec<u16>,
}

pub struct LookupList<'a, T> {
    scope: ReadScope<'a>,
    lookup_offsets: ReadArray<'a, U16Be>,
    phantom: PhantomData<T>,
}

pub struct Lookup<'a, T: LayoutTableType> {
    scope: ReadScope<'a>,
    pub lookup_type: u16,
    pub lookup_flag: u16,
    subtable_offsets: ReadArray<'a, U16Be>,
    pub mark_filtering_set: Option<u16>,
    phantom: PhantomData<T>,
}

pub struct ExtensionSubst<'a, T: LayoutTableType> {
    scope: ReadScope<'a>,
    extension_lookup_type: T::BaseLookupType,
    extension_offset: u32,
}

pub struct LookupSubtableIter<'a, 'b, T: LayoutTableType> {
    lookup: &'b Lookup<'a, T>,
    index: usize,
}

pub struct ExtensionLookupSubtableIter<'a, 'b, T: LayoutTableType> {
    lookup_type: T::BaseLookupType,
    iter: LookupSubtableIter<'a, 'b, T>,
}

pub enum SmartLookupSubtableIter<'a, 'b, T: LayoutTableType> {
    Normal(T::BaseLookupType, LookupSubtableIter<'a, 'b, T>),
    Extension(ExtensionLookupSubtableIter<'a, 'b, T>),
}

pub enum LookupType<T: LayoutTableType> {
    Normal(T::BaseLookupType),
    Extension,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SubstLookupType {
    SingleSubst = 1,
    MultipleSubst = 2,
    AlternateSubst = 3,
    LigatureSubst = 4,
    ContextSubst = 5,
    ChainContextSubst = 6,
    ReverseChainSingleSubst = 8,
}

/// The subtables of one lookup, tagged by lookup type.
pub enum SubstLookup {
    SingleSubst(Vec<SingleSubst>),
    MultipleSubst(Vec<MultipleSubst>),
    AlternateSubst(Vec<AlternateSubst>),
    LigatureSubst(Vec<LigatureSubst>),
    ContextSubst(Vec<ContextLookup>),
    ChainContextSubst(Vec<ChainContextLookup>),
    ReverseChainSingleSubst(Vec<ReverseChainSingleSubst>),
}

pub trait LayoutTableType: Sized {
    type LookupType;
    type BaseLookupType: Copy + PartialEq + Into<u16>;

    fn check_lookup_type(lookup_type: u16) -> Result<LookupType<Self>, SubstError>;

    /// Whether subtables of `lookup_type` in the given format can be read.
    fn supports_format(lookup_type: Self::BaseLookupType, format: u16) -> bool;
}

impl From<SubstLookupType> for u16 {
    fn from(lookup_type: SubstLookupType) -> u16 {
        lookup_type as u16
    }
}

impl<'b, T: LayoutTableType> ReadBinary for LayoutTable<'b, T> {
    type HostType<'a> = LayoutTable<'a, T>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);

        // We handle versions 1.x
        ctxt.check_version(major_version == 1)?;

        let opt_script_list = if script_list_offset == 0 {
            None
        } else {
            Some(table.sub_region(script_list_offset)?.read::<ScriptList>()?)
        };

        let opt_feature_list = if feature_list_offset == 0 {
            None
        } else {
            Some(table.sub_region(feature_list_offset)?.read::<FeatureList>()?)
        };

        let opt_lookup_list = if lookup_list_offset == 0 {
            None
        } else {
            Some(
                table
                    .sub_region(lookup_list_offset)?
                    .read::<LookupList<'_, T>>()?,
            )
        };

        // Version 1.1 also includes an offset to a FeatureVariations table, which is not used.

        Ok(LayoutTable {
            opt_script_list,
            opt_feature_list,
            opt_lookup_list,
        })
    }
}

impl ReadBinary for ScriptList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let script_count = usize::from(ctxt.read_u16be()?);
        let script_records = ctxt
            .read_array_dep::<ScriptRecord>(script_count, scope)?
            .read_to_vec()?;
        Ok(ScriptList { script_records })
    }
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_u32be()?;
        let script_offset = usize::from(ctxt.read_u16be()?);
        let script_table = scope.sub_region(script_offset)?.read::<ScriptTable>()?;
        Ok(ScriptRecord {
            script_tag,
            script_table,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for ScriptTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let default_langsys_offset = usize::from(ctxt.read_u16be()?);
        let opt_default_langsys = if default_langsys_offset != 0 {
            Some(scope.sub_region(default_langsys_offset)?.read::<LangSys>()?)
        } else {
            None
        };
        let langsys_count = usize::from(ctxt.read_u16be()?);
        let langsys_records = ctxt
            .read_array_dep::<LangSysRecord>(langsys_count, scope)?
            .read_to_vec()?;
        Ok(ScriptTable {
            opt_default_langsys,
            langsys_records,
        })
    }
}

impl ReadBinaryDep for LangSysRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LangSysRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let langsys_tag = ctxt.read_u32be()?;
        let langsys_offset = usize::from(ctxt.read_u16be()?);
        let langsys_table = scope.sub_region(langsys_offset)?.read::<LangSys>()?;
        Ok(LangSysRecord {
            langsys_tag,
            langsys_table,
        })
    }
}

impl ReadFixedSizeDep for LangSysRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _lookup_order = ctxt.read_u16be()?; // reserved, should be zero
        let required_feature_index = ctxt.read_u16be()?;
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            required_feature_index,
            feature_indices,
        })
    }
}

impl ReadBinary for FeatureList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let feature_count = usize::from(ctxt.read_u16be()?);
        let feature_records = ctxt
            .read_array_dep::<FeatureRecord>(feature_count, scope)?
            .read_to_vec()?;
        Ok(FeatureList { feature_records })
    }
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_u32be()?;
        let feature_offset = usize::from(ctxt.read_u16be()?);
        let feature_table = scope.sub_region(feature_offset)?.read::<FeatureTable>()?;
        Ok(FeatureRecord {
            feature_tag,
            feature_table,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for FeatureTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _feature_params = ctxt.read_u16be()?;
        let lookup_index_count = usize::from(ctxt.read_u16be()?);
        let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
        Ok(FeatureTable { lookup_indices })
    }
}

impl<'b, T> ReadBinary for LookupList<'b, T> {
    type HostType<'a> = LookupList<'a, T>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;
        Ok(LookupList {
            scope,
            lookup_offsets,
            phantom: PhantomData,
        })
    }
}

impl<'a, T> LayoutTable<'a, T> {
    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.opt_script_list
            .as_ref()
            .and_then(|script_list| script_list.find_script(script_tag))
    }

    /// Find the script for `script_tag`, falling back to the `DFLT` script.
    pub fn find_script_or_default(&self, script_tag: u32) -> Option<&ScriptTable> {
        let script_list = self.opt_script_list.as_ref()?;
        match script_list.find_script(script_tag) {
            Some(script_table) => Some(script_table),
            None => {
                debug!(
                    "script '{}' not found, falling back to '{}'",
                    DisplayTag(script_tag),
                    DisplayTag(tag::DFLT)
                );
                script_list.find_script(tag::DFLT)
            }
        }
    }

    pub fn find_langsys_feature(
        &self,
        langsys: &LangSys,
        feature_tag: u32,
    ) -> Result<Option<&FeatureTable>, ParseError> {
        if let Some(ref feature_list) = self.opt_feature_list {
            for feature_index in langsys.feature_indices_iter() {
                let feature_record =
                    feature_list.nth_feature_record(usize::from(*feature_index))?;
                if feature_record.feature_tag == feature_tag {
                    return Ok(Some(&feature_record.feature_table));
                }
            }
        }
        Ok(None)
    }
}

impl ScriptList {
    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.script_records
            .iter()
            .find(|script_record| script_record.script_tag == script_tag)
            .map(|script_record| &script_record.script_table)
    }
}

impl ScriptTable {
    pub fn default_langsys_record(&self) -> Option<&LangSys> {
        self.opt_default_langsys.as_ref()
    }

    pub fn find_langsys(&self, langsys_tag: u32) -> Option<&LangSys> {
        self.langsys_records
            .iter()
            .find(|langsys_record| langsys_record.langsys_tag == langsys_tag)
            .map(|langsys_record| &langsys_record.langsys_table)
    }

    /// Find the language system for `opt_lang_tag`, falling back to the default language system.
    pub fn find_langsys_or_default(&self, opt_lang_tag: Option<u32>) -> Option<&LangSys> {
        match opt_lang_tag.and_then(|lang_tag| self.find_langsys(lang_tag)) {
            Some(langsys) => Some(langsys),
            None => {
                if let Some(lang_tag) = opt_lang_tag {
                    debug!(
                        "language system '{}' not found, using default",
                        DisplayTag(lang_tag)
                    );
                }
                self.default_langsys_record()
            }
        }
    }
}

impl LangSys {
    pub fn feature_indices_iter(&self) -> impl Iterator<Item = &u16> {
        self.feature_indices.iter()
    }

    /// The index of the feature required by this language system, if any.
    ///
    /// Substitution never applies this feature on its own. Callers that want it can look up
    /// its tag with [FeatureList::nth_feature_record] and add it to their feature map.
    pub fn required_feature_index(&self) -> Option<u16> {
        match self.required_feature_index {
            0xFFFF => None,
            index => Some(index),
        }
    }
}

impl FeatureList {
    pub fn nth_feature_record(&self, index: usize) -> Result<&FeatureRecord, ParseError> {
        self.feature_records.check_index(index)?;
        Ok(&self.feature_records[index])
    }
}

impl<'a, T: LayoutTableType> LookupList<'a, T> {
    pub fn len(&self) -> usize {
        self.lookup_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup_offsets.is_empty()
    }

    pub fn lookup(&self, lookup_index: usize) -> Result<Lookup<'a, T>, ParseError> {
        let lookup_table_offset = self
            .lookup_offsets
            .get_item(lookup_index)
            .ok_or(ParseError::BadIndex)?;
        self.scope
            .sub_region(usize::from(lookup_table_offset))?
            .read::<Lookup<'_, T>>()
    }
}

impl<'a> LookupList<'a, GSUB> {
    pub fn lookup_cache_gsub(
        &self,
        cache: &LayoutCache<GSUB>,
        lookup_index: usize,
    ) -> Result<Rc<LookupCacheItem<SubstLookup>>, SubstError> {
        let lookup_vec = &mut cache.lookup_cache.borrow_mut();
        if lookup_index >= lookup_vec.len() {
            lookup_vec.resize(lookup_index + 1, None);
        }
        if let Some(ref lookup_cache_item) = lookup_vec[lookup_index] {
            Ok(Rc::clone(lookup_cache_item))
        } else {
            let lookup_cache_item = Rc::new(self.read_lookup_gsub(cache, lookup_index)?);
            lookup_vec[lookup_index] = Some(Rc::clone(&lookup_cache_item));
            Ok(lookup_cache_item)
        }
    }

    fn read_lookup_gsub(
        &self,
        cache: &LayoutCache<GSUB>,
        lookup_index: usize,
    ) -> Result<LookupCacheItem<SubstLookup>, SubstError> {
        let lookup = self.lookup(lookup_index)?;
        let lookup_flag = LookupFlag(lookup.lookup_flag);
        let lookup_type = lookup.get_lookup_type()?;
        let lookup_subtables = match lookup_type {
            SubstLookupType::SingleSubst => {
                SubstLookup::SingleSubst(lookup.read_subtables::<SingleSubst>(cache)?)
            }
            SubstLookupType::MultipleSubst => {
                SubstLookup::MultipleSubst(lookup.read_subtables::<MultipleSubst>(cache)?)
            }
            SubstLookupType::AlternateSubst => {
                SubstLookup::AlternateSubst(lookup.read_subtables::<AlternateSubst>(cache)?)
            }
            SubstLookupType::LigatureSubst => {
                SubstLookup::LigatureSubst(lookup.read_subtables::<LigatureSubst>(cache)?)
            }
            SubstLookupType::ContextSubst => {
                SubstLookup::ContextSubst(lookup.read_subtables::<ContextLookup>(cache)?)
            }
            SubstLookupType::ChainContextSubst => SubstLookup::ChainContextSubst(
                lookup.read_subtables::<ChainContextLookup>(cache)?,
            ),
            SubstLookupType::ReverseChainSingleSubst => SubstLookup::ReverseChainSingleSubst(
                lookup.read_subtables::<ReverseChainSingleSubst>(cache)?,
            ),
        };
        Ok(LookupCacheItem {
            lookup_flag,
            mark_filtering_set: lookup.mark_filtering_set,
            lookup_subtables,
        })
    }
}

impl<'a, T: LayoutTableType> Lookup<'a, T> {
    fn subtable_iter<'b>(&'b self) -> LookupSubtableIter<'a, 'b, T> {
        LookupSubtableIter {
            lookup: self,
            index: 0,
        }
    }

    pub fn smart_subtable_iter<'b>(
        &'b self,
    ) -> Result<SmartLookupSubtableIter<'a, 'b, T>, SubstError> {
        match T::check_lookup_type(self.lookup_type)? {
            LookupType::Normal(lookup_type) => {
                let iter = self.subtable_iter();
                Ok(SmartLookupSubtableIter::Normal(lookup_type, iter))
            }
            LookupType::Extension => {
                // All subtables of an extension lookup share the type of the first one
                let subtable = match self.subtable_iter().next() {
                    Some(subtable) => subtable?,
                    None => return Err(SubstError::MalformedTable(ParseError::MissingValue)),
                };
                let ext_subtable = ExtensionSubst::<T>::read_extension(subtable)?;
                let iter = ExtensionLookupSubtableIter {
                    lookup_type: ext_subtable.extension_lookup_type,
                    iter: self.subtable_iter(),
                };
                Ok(SmartLookupSubtableIter::Extension(iter))
            }
        }
    }

    pub fn get_lookup_type(&self) -> Result<T::BaseLookupType, SubstError> {
        let subtables = self.smart_subtable_iter()?;
        Ok(subtables.get_lookup_type())
    }

    /// Read every subtable of the lookup, following extension subtables to their target.
    ///
    /// Fails with `UnsupportedSubtableType` if any subtable has a format that cannot be read.
    pub fn read_subtables<'c, S: ReadBinaryDep>(
        &self,
        args: S::Args<'c>,
    ) -> Result<Vec<S::HostType<'c>>, SubstError>
    where
        'a: 'c,
    {
        let subtable_iter = self.smart_subtable_iter()?;
        let lookup_type = subtable_iter.get_lookup_type();
        let mut subtables = Vec::with_capacity(self.subtable_offsets.len());
        for subtable_result in subtable_iter {
            let subtable: ReadScope<'c> = subtable_result?;
            let format = subtable.read_u16(0)?;
            if !T::supports_format(lookup_type, format) {
                return Err(SubstError::UnsupportedSubtableType(lookup_type.into()));
            }
            subtables.push(subtable.read_dep::<S>(args)?);
        }
        Ok(subtables)
    }
}

impl<'b, T: LayoutTableType> ReadBinary for Lookup<'b, T> {
    type HostType<'a> = Lookup<'a, T>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = ctxt.read_u16be()?;
        let lookup_flag = ctxt.read_u16be()?;
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
        let mark_filtering_set = if LookupFlag(lookup_flag).get_use_mark_filtering_set() {
            Some(ctxt.read_u16be()?)
        } else {
            None
        };
        Ok(Lookup {
            scope,
            lookup_type,
            lookup_flag,
            subtable_offsets,
            mark_filtering_set,
            phantom: PhantomData,
        })
    }
}

impl<'a, T: LayoutTableType> ExtensionSubst<'a, T> {
    fn read_extension(scope: ReadScope<'a>) -> Result<Self, SubstError> {
        let subst_format = scope.read_u16(0)?;
        let extension_lookup_type = scope.read_u16(2)?;
        if subst_format != 1 {
            return Err(SubstError::UnsupportedSubtableType(extension_lookup_type));
        }
        let extension_lookup_type = match T::check_lookup_type(extension_lookup_type)? {
            LookupType::Normal(lookup_type) => lookup_type,
            // An extension may not point at another extension
            LookupType::Extension => {
                return Err(SubstError::UnsupportedSubtableType(extension_lookup_type))
            }
        };
        let extension_offset = scope.read_u32(4)?;
        Ok(ExtensionSubst {
            scope,
            extension_lookup_type,
            extension_offset,
        })
    }

    fn subtable(&self) -> Result<ReadScope<'a>, SubstError> {
        let offset = usize::try_from(self.extension_offset)?;
        Ok(self.scope.sub_region(offset)?)
    }
}

impl<'a, 'b, T: LayoutTableType> Iterator for LookupSubtableIter<'a, 'b, T> {
    type Item = Result<ReadScope<'a>, ParseError>;

    fn next(&mut self) -> Option<Result<ReadScope<'a>, ParseError>> {
        let subtable_offset = self.lookup.subtable_offsets.get_item(self.index)?;
        self.index += 1;
        Some(self.lookup.scope.sub_region(usize::from(subtable_offset)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = self
            .lookup
            .subtable_offsets
            .len()
            .saturating_sub(self.index);
        (upper, Some(upper))
    }
}

impl<'a, 'b, T: LayoutTableType> Iterator for ExtensionLookupSubtableIter<'a, 'b, T> {
    type Item = Result<ReadScope<'a>, SubstError>;

    fn next(&mut self) -> Option<Result<ReadScope<'a>, SubstError>> {
        let subtable = match self.iter.next()? {
            Ok(subtable) => subtable,
            Err(err) => return Some(Err(err.into())),
        };
        let result = ExtensionSubst::<T>::read_extension(subtable).and_then(|ext_subtable| {
            if ext_subtable.extension_lookup_type != self.lookup_type {
                return Err(SubstError::MalformedTable(ParseError::BadValue));
            }
            ext_subtable.subtable()
        });
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<'a, 'b, T: LayoutTableType> Iterator for SmartLookupSubtableIter<'a, 'b, T> {
    type Item = Result<ReadScope<'a>, SubstError>;

    fn next(&mut self) -> Option<Result<ReadScope<'a>, SubstError>> {
        match *self {
            SmartLookupSubtableIter::Normal(_, ref mut iter) => {
                iter.next().map(|res| res.map_err(SubstError::from))
            }
            SmartLookupSubtableIter::Extension(ref mut iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            SmartLookupSubtableIter::Normal(_lookup_type, iter) => iter.size_hint(),
            SmartLookupSubtableIter::Extension(iter) => iter.size_hint(),
        }
    }
}

impl<'a, 'b, T: LayoutTableType> SmartLookupSubtableIter<'a, 'b, T> {
    pub fn get_lookup_type(&self) -> T::BaseLookupType {
        match *self {
            SmartLookupSubtableIter::Normal(lookup_type, _) => lookup_type,
            SmartLookupSubtableIter::Extension(ref iter) => iter.lookup_type,
        }
    }
}

impl LayoutTableType for GSUB {
    type LookupType = SubstLookup;
    type BaseLookupType = SubstLookupType;

    fn check_lookup_type(lookup_type: u16) -> Result<LookupType<GSUB>, SubstError> {
        match lookup_type {
            1 => Ok(LookupType::Normal(SubstLookupType::SingleSubst)),
            2 => Ok(LookupType::Normal(SubstLookupType::MultipleSubst)),
            3 => Ok(LookupType::Normal(SubstLookupType::AlternateSubst)),
            4 => Ok(LookupType::Normal(SubstLookupType::LigatureSubst)),
            5 => Ok(LookupType::Normal(SubstLookupType::ContextSubst)),
            6 => Ok(LookupType::Normal(SubstLookupType::ChainContextSubst)),
            7 => Ok(LookupType::Extension),
            8 => Ok(LookupType::Normal(SubstLookupType::ReverseChainSingleSubst)),
            _ => Err(SubstError::UnsupportedSubtableType(lookup_type)),
        }
    }

    fn supports_format(lookup_type: SubstLookupType, format: u16) -> bool {
        match lookup_type {
            SubstLookupType::SingleSubst => matches!(format, 1 | 2),
            SubstLookupType::ContextSubst | SubstLookupType::ChainContextSubst => {
                matches!(format, 1..=3)
            }
            SubstLookupType::MultipleSubst
            | SubstLookupType::AlternateSubst
            | SubstLookupType::LigatureSubst
            | SubstLookupType::ReverseChainSingleSubst => format == 1,
        }
    }
}

pub enum SingleSubst {
    Format1 {
        coverage: Rc<Coverage>,
        delta_glyph_index: i16,
    },
    Format2 {
        coverage: Rc<Coverage>,
        substitute_glyph_array: Vec<u16>,
    },
}

impl ReadBinaryDep for SingleSubst {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let subtable = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = cache.read_coverage(subtable, coverage_offset)?;
                let delta_glyph_index = ctxt.read_i16be()?;
                Ok(SingleSubst::Format1 {
                    coverage,
                    delta_glyph_index,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = cache.read_coverage(subtable, coverage_offset)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyph_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(SingleSubst::Format2 {
                    coverage,
                    substitute_glyph_array,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl SingleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<u16>, ParseError> {
        match *self {
            SingleSubst::Format1 {
                ref coverage,
                delta_glyph_index,
            } => {
                if coverage.glyph_coverage_value(glyph).is_some() {
                    // Addition of deltaGlyphID is modulo 65536
                    Ok(Some(glyph.wrapping_add_signed(delta_glyph_index)))
                } else {
                    Ok(None)
                }
            }
            SingleSubst::Format2 {
                ref coverage,
                ref substitute_glyph_array,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    substitute_glyph_array.check_index(coverage_index)?;
                    Ok(Some(substitute_glyph_array[coverage_index]))
                }
                None => Ok(None),
            },
        }
    }
}

pub struct MultipleSubst {
    coverage: Rc<Coverage>,
    sequences: Vec<SequenceTable>,
}

pub struct SequenceTable {
    pub substitute_glyphs: Vec<u16>,
}

impl ReadBinaryDep for MultipleSubst {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let sequence_count = usize::from(ctxt.read_u16be()?);
                let sequence_offsets = ctxt.read_array::<U16Be>(sequence_count)?;
                let sequences = read_objects::<SequenceTable>(&scope, sequence_offsets)?;
                Ok(MultipleSubst {
                    coverage,
                    sequences,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl MultipleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&SequenceTable>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.sequences.check_index(coverage_index)?;
                Ok(Some(&self.sequences[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for SequenceTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        // An empty sequence is forbidden by the format but occurs in real fonts, it deletes the
        // input glyph.
        let glyph_count = usize::from(ctxt.read_u16be()?);
        let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(SequenceTable { substitute_glyphs })
    }
}

pub struct AlternateSubst {
    coverage: Rc<Coverage>,
    alternatesets: Vec<AlternateSet>,
}

pub struct AlternateSet {
    pub alternate_glyphs: Vec<u16>,
}

impl ReadBinaryDep for AlternateSubst {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let alternateset_count = usize::from(ctxt.read_u16be()?);
                let alternateset_offsets = ctxt.read_array::<U16Be>(alternateset_count)?;
                let alternatesets = read_objects::<AlternateSet>(&scope, alternateset_offsets)?;
                Ok(AlternateSubst {
                    coverage,
                    alternatesets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl AlternateSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&AlternateSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.alternatesets.check_index(coverage_index)?;
                Ok(Some(&self.alternatesets[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for AlternateSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        let alternate_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(AlternateSet { alternate_glyphs })
    }
}

pub struct LigatureSubst {
    coverage: Rc<Coverage>,
    ligaturesets: Vec<LigatureSet>,
}

pub struct LigatureSet {
    pub ligatures: Vec<Ligature>,
}

pub struct Ligature {
    pub ligature_glyph: u16,
    /// Components following the first, which is matched by the coverage table.
    pub component_glyphs: Vec<u16>,
}

impl ReadBinaryDep for LigatureSubst {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let ligatureset_count = usize::from(ctxt.read_u16be()?);
                let ligatureset_offsets = ctxt.read_array::<U16Be>(ligatureset_count)?;
                let ligaturesets = read_objects::<LigatureSet>(&scope, ligatureset_offsets)?;
                Ok(LigatureSubst {
                    coverage,
                    ligaturesets,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl LigatureSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&LigatureSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.ligaturesets.check_index(coverage_index)?;
                Ok(Some(&self.ligaturesets[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for LigatureSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let ligature_count = usize::from(ctxt.read_u16be()?);
        let ligature_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
        let ligatures = read_objects::<Ligature>(&scope, ligature_offsets)?;
        Ok(LigatureSet { ligatures })
    }
}

impl ReadBinary for Ligature {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ligature_glyph = ctxt.read_u16be()?;
        let component_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(component_count > 0)?;
        let component_glyphs = ctxt.read_array::<U16Be>(component_count - 1)?.to_vec();
        Ok(Ligature {
            ligature_glyph,
            component_glyphs,
        })
    }
}

/// A (sequence index, lookup list index) pair naming a nested lookup.
pub type SubstLookupRecord = (u16, u16);

pub enum ContextLookup {
    Format1 {
        coverage: Rc<Coverage>,
        subrulesets: Vec<Option<SubRuleSet>>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        classdef: Rc<ClassDef>,
        subclasssets: Vec<Option<SubClassSet>>,
    },
    Format3 {
        coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<SubstLookupRecord>,
    },
}

pub struct SubRuleSet {
    subrules: Vec<SubRule>,
}

pub struct SubRule {
    input_sequence: Vec<u16>,
    lookup_records: Vec<SubstLookupRecord>,
}

pub struct SubClassSet {
    subclassrules: Vec<SubClassRule>,
}

pub struct SubClassRule {
    input_sequence: Vec<u16>,
    lookup_records: Vec<SubstLookupRecord>,
}

pub enum ChainContextLookup {
    Format1 {
        coverage: Rc<Coverage>,
        chainsubrulesets: Vec<Option<ChainSubRuleSet>>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        backtrack_classdef: Rc<ClassDef>,
        input_classdef: Rc<ClassDef>,
        lookahead_classdef: Rc<ClassDef>,
        chainsubclasssets: Vec<Option<ChainSubClassSet>>,
    },
    Format3 {
        backtrack_coverages: Vec<Rc<Coverage>>,
        input_coverages: Vec<Rc<Coverage>>,
        lookahead_coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<SubstLookupRecord>,
    },
}

pub struct ChainSubRuleSet {
    chainsubrules: Vec<ChainSubRule>,
}

pub struct ChainSubRule {
    backtrack_sequence: Vec<u16>,
    input_sequence: Vec<u16>,
    lookahead_sequence: Vec<u16>,
    lookup_records: Vec<SubstLookupRecord>,
}

pub struct ChainSubClassSet {
    chainsubclassrules: Vec<ChainSubClassRule>,
}

pub struct ChainSubClassRule {
    backtrack_sequence: Vec<u16>,
    input_sequence: Vec<u16>,
    lookahead_sequence: Vec<u16>,
    lookup_records: Vec<SubstLookupRecord>,
}

impl ReadBinaryDep for ContextLookup {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let subruleset_count = usize::from(ctxt.read_u16be()?);
                let subruleset_offsets = ctxt.read_array::<U16Be>(subruleset_count)?;
                let subrulesets = read_objects_nullable::<SubRuleSet>(&scope, subruleset_offsets)?;
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                Ok(ContextLookup::Format1 {
                    coverage,
                    subrulesets,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let classdef_offset = usize::from(ctxt.read_u16be()?);
                let subclassset_count = usize::from(ctxt.read_u16be()?);
                let subclassset_offsets = ctxt.read_array::<U16Be>(subclassset_count)?;
                let subclasssets =
                    read_objects_nullable::<SubClassSet>(&scope, subclassset_offsets)?;
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let classdef = cache.read_classdef(scope, classdef_offset)?;
                Ok(ContextLookup::Format2 {
                    coverage,
                    classdef,
                    subclasssets,
                })
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let coverage_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let coverages = cache.read_coverages(scope, coverage_offsets)?;
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                Ok(ContextLookup::Format3 {
                    coverages,
                    lookup_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinaryDep for ChainContextLookup {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let chainsubruleset_count = usize::from(ctxt.read_u16be()?);
                let chainsubruleset_offsets = ctxt.read_array::<U16Be>(chainsubruleset_count)?;
                let chainsubrulesets =
                    read_objects_nullable::<ChainSubRuleSet>(&scope, chainsubruleset_offsets)?;
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                Ok(ChainContextLookup::Format1 {
                    coverage,
                    chainsubrulesets,
                })
            }
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let backtrack_classdef_offset = usize::from(ctxt.read_u16be()?);
                let input_classdef_offset = usize::from(ctxt.read_u16be()?);
                let lookahead_classdef_offset = usize::from(ctxt.read_u16be()?);
                let chainsubclassset_count = usize::from(ctxt.read_u16be()?);
                let chainsubclassset_offsets = ctxt.read_array::<U16Be>(chainsubclassset_count)?;
                let chainsubclasssets =
                    read_objects_nullable::<ChainSubClassSet>(&scope, chainsubclassset_offsets)?;
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let backtrack_classdef =
                    cache.read_optional_classdef(scope, backtrack_classdef_offset)?;
                let input_classdef = cache.read_classdef(scope, input_classdef_offset)?;
                let lookahead_classdef =
                    cache.read_optional_classdef(scope, lookahead_classdef_offset)?;
                Ok(ChainContextLookup::Format2 {
                    coverage,
                    backtrack_classdef,
                    input_classdef,
                    lookahead_classdef,
                    chainsubclasssets,
                })
            }
            3 => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_coverage_offsets = ctxt.read_array::<U16Be>(input_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                let backtrack_coverages =
                    cache.read_coverages(scope, backtrack_coverage_offsets)?;
                let input_coverages = cache.read_coverages(scope, input_coverage_offsets)?;
                let lookahead_coverages =
                    cache.read_coverages(scope, lookahead_coverage_offsets)?;
                Ok(ChainContextLookup::Format3 {
                    backtrack_coverages,
                    input_coverages,
                    lookahead_coverages,
                    lookup_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

/// GSUB Lookup Type 8 Subtable Formats
pub enum ReverseChainSingleSubst {
    /// Format 1
    Format1 {
        /// Coverage table for the single input glyph
        coverage: Rc<Coverage>,
        /// Array of backtrack sequence coverages, ordered by glyph sequence
        backtrack_coverages: Vec<Rc<Coverage>>,
        /// Array of lookahead sequence coverages, ordered by glyph sequence
        lookahead_coverages: Vec<Rc<Coverage>>,
        /// Array of substitute glyphs, ordered by coverage index
        substitute_glyphs: Vec<u16>,
    },
}

impl ReadBinaryDep for ReverseChainSingleSubst {
    type HostType<'a> = Self;
    type Args<'a> = &'a LayoutCache<GSUB>;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                let coverage = cache.read_coverage(scope, coverage_offset)?;
                let backtrack_coverages =
                    cache.read_coverages(scope, backtrack_coverage_offsets)?;
                let lookahead_coverages =
                    cache.read_coverages(scope, lookahead_coverage_offsets)?;

                ctxt.check(coverage.glyph_count() == glyph_count)?;
                Ok(ReverseChainSingleSubst::Format1 {
                    coverage,
                    backtrack_coverages,
                    lookahead_coverages,
                    substitute_glyphs,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReverseChainSingleSubst {
    /// Apply the substitution to the supplied glyph
    pub fn apply_glyph(
        &self,
        glyph: u16,
        f: impl Fn(&MatchContext<'_>) -> bool,
    ) -> Result<Option<u16>, ParseError> {
        match self {
            ReverseChainSingleSubst::Format1 {
                coverage,
                backtrack_coverages,
                lookahead_coverages,
                substitute_glyphs,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(coverage_index) => {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ByCoverage(backtrack_coverages),
                        input_table: GlyphTable::Empty,
                        lookahead_table: GlyphTable::ByCoverage(lookahead_coverages),
                    };
                    if f(&match_context) {
                        let coverage_index = usize::from(coverage_index);
                        substitute_glyphs.check_index(coverage_index)?;
                        Ok(Some(substitute_glyphs[coverage_index]))
                    } else {
                        Ok(None)
                    }
                }
                None => Ok(None),
            },
        }
    }
}

fn read_objects<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<T::HostType<'a>>, ParseError> {
    offsets
        .iter()
        .map(|offset| {
            scope
                .sub_region(usize::from(offset))
                .and_then(|object| object.read::<T>())
        })
        .collect()
}

// Null offsets are kept as `None` so positions still line up with coverage or class indices
fn read_objects_nullable<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Option<T::HostType<'a>>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let object = match offset {
            0 => None,
            _ => Some(scope.sub_region(usize::from(offset))?.read::<T>()?),
        };
        objects.push(object);
    }
    Ok(objects)
}

impl ReadBinary for SubRuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let subrule_count = usize::from(ctxt.read_u16be()?);
        let subrule_offsets = ctxt.read_array::<U16Be>(subrule_count)?;
        let subrules = read_objects::<SubRule>(&scope, subrule_offsets)?;
        Ok(SubRuleSet { subrules })
    }
}

impl ReadBinary for SubRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(SubRule {
            input_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for SubClassSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let subclassrule_count = usize::from(ctxt.read_u16be()?);
        let subclassrule_offsets = ctxt.read_array::<U16Be>(subclassrule_count)?;
        let subclassrules = read_objects::<SubClassRule>(&scope, subclassrule_offsets)?;
        Ok(SubClassSet { subclassrules })
    }
}

impl ReadBinary for SubClassRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(SubClassRule {
            input_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for ChainSubRuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let chainsubrule_count = usize::from(ctxt.read_u16be()?);
        let chainsubrule_offsets = ctxt.read_array::<U16Be>(chainsubrule_count)?;
        let chainsubrules = read_objects::<ChainSubRule>(&scope, chainsubrule_offsets)?;
        Ok(ChainSubRuleSet { chainsubrules })
    }
}

impl ReadBinary for ChainSubRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let (backtrack_sequence, input_sequence, lookahead_sequence, lookup_records) =
            read_chain_rule(ctxt)?;
        Ok(ChainSubRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for ChainSubClassSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let chainsubclassrule_count = usize::from(ctxt.read_u16be()?);
        let chainsubclassrule_offsets = ctxt.read_array::<U16Be>(chainsubclassrule_count)?;
        let chainsubclassrules =
            read_objects::<ChainSubClassRule>(&scope, chainsubclassrule_offsets)?;
        Ok(ChainSubClassSet { chainsubclassrules })
    }
}

impl ReadBinary for ChainSubClassRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let (backtrack_sequence, input_sequence, lookahead_sequence, lookup_records) =
            read_chain_rule(ctxt)?;
        Ok(ChainSubClassRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

type ChainRuleParts = (Vec<u16>, Vec<u16>, Vec<u16>, Vec<SubstLookupRecord>);

// Glyph and class based chaining rules share a layout
fn read_chain_rule(ctxt: &mut ReadCtxt<'_>) -> Result<ChainRuleParts, ParseError> {
    let backtrack_count = usize::from(ctxt.read_u16be()?);
    let backtrack_sequence = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
    let input_count = usize::from(ctxt.read_u16be()?);
    ctxt.check(input_count > 0)?;
    let input_sequence = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
    let lookahead_count = usize::from(ctxt.read_u16be()?);
    let lookahead_sequence = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
    Ok((
        backtrack_sequence,
        input_sequence,
        lookahead_sequence,
        lookup_records,
    ))
}

/// Find the first rule of a contextual subtable that matches at the current glyph.
///
/// `f` is called with the match context of each candidate rule in turn.
pub fn context_lookup_info<'a>(
    context_lookup: &'a ContextLookup,
    glyph: u16,
    f: impl Fn(&MatchContext<'a>) -> bool,
) -> Result<Option<ContextLookupHelper<'a>>, ParseError> {
    match context_lookup {
        ContextLookup::Format1 {
            coverage,
            subrulesets,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                subrulesets.check_index(coverage_index)?;
                if let Some(ref subruleset) = subrulesets[coverage_index] {
                    for subrule in &subruleset.subrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::Empty,
                            input_table: GlyphTable::ById(&subrule.input_sequence),
                            lookahead_table: GlyphTable::Empty,
                        };
                        if f(&match_context) {
                            return Ok(Some(ContextLookupHelper::new(
                                match_context,
                                &subrule.lookup_records,
                            )));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ContextLookup::Format2 {
            coverage,
            classdef,
            subclasssets,
        } => {
            if coverage.glyph_coverage_value(glyph).is_none() {
                return Ok(None);
            }
            let class_value = usize::from(classdef.glyph_class_value(glyph));
            // Classes without a rule set never match
            if let Some(Some(subclassset)) = subclasssets.get(class_value) {
                for subclassrule in &subclassset.subclassrules {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::Empty,
                        input_table: GlyphTable::ByClassDef(
                            Rc::clone(classdef),
                            &subclassrule.input_sequence,
                        ),
                        lookahead_table: GlyphTable::Empty,
                    };
                    if f(&match_context) {
                        return Ok(Some(ContextLookupHelper::new(
                            match_context,
                            &subclassrule.lookup_records,
                        )));
                    }
                }
            }
            Ok(None)
        }
        ContextLookup::Format3 {
            coverages,
            lookup_records,
        } => match coverages.split_first() {
            Some((first, rest)) if first.glyph_coverage_value(glyph).is_some() => {
                let match_context = MatchContext {
                    backtrack_table: GlyphTable::Empty,
                    input_table: GlyphTable::ByCoverage(rest),
                    lookahead_table: GlyphTable::Empty,
                };
                if f(&match_context) {
                    Ok(Some(ContextLookupHelper::new(match_context, lookup_records)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        },
    }
}

/// Find the first rule of a chaining contextual subtable that matches at the current glyph.
pub fn chain_context_lookup_info<'a>(
    chain_context_lookup: &'a ChainContextLookup,
    glyph: u16,
    f: impl Fn(&MatchContext<'a>) -> bool,
) -> Result<Option<ContextLookupHelper<'a>>, ParseError> {
    match chain_context_lookup {
        ChainContextLookup::Format1 {
            coverage,
            chainsubrulesets,
        } => match coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                chainsubrulesets.check_index(coverage_index)?;
                if let Some(ref chainsubruleset) = chainsubrulesets[coverage_index] {
                    for chainsubrule in &chainsubruleset.chainsubrules {
                        let match_context = MatchContext {
                            backtrack_table: GlyphTable::ById(&chainsubrule.backtrack_sequence),
                            input_table: GlyphTable::ById(&chainsubrule.input_sequence),
                            lookahead_table: GlyphTable::ById(&chainsubrule.lookahead_sequence),
                        };
                        if f(&match_context) {
                            return Ok(Some(ContextLookupHelper::new(
                                match_context,
                                &chainsubrule.lookup_records,
                            )));
                        }
                    }
                }
                Ok(None)
            }
            None => Ok(None),
        },
        ChainContextLookup::Format2 {
            coverage,
            backtrack_classdef,
            input_classdef,
            lookahead_classdef,
            chainsubclasssets,
        } => {
            if coverage.glyph_coverage_value(glyph).is_none() {
                return Ok(None);
            }
            let class_value = usize::from(input_classdef.glyph_class_value(glyph));
            if let Some(Some(chainsubclassset)) = chainsubclasssets.get(class_value) {
                for chainsubclassrule in &chainsubclassset.chainsubclassrules {
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ByClassDef(
                            Rc::clone(backtrack_classdef),
                            &chainsubclassrule.backtrack_sequence,
                        ),
                        input_table: GlyphTable::ByClassDef(
                            Rc::clone(input_classdef),
                            &chainsubclassrule.input_sequence,
                        ),
                        lookahead_table: GlyphTable::ByClassDef(
                            Rc::clone(lookahead_classdef),
                            &chainsubclassrule.lookahead_sequence,
                        ),
                    };
                    if f(&match_context) {
                        return Ok(Some(ContextLookupHelper::new(
                            match_context,
                            &chainsubclassrule.lookup_records,
                        )));
                    }
                }
            }
            Ok(None)
        }
        ChainContextLookup::Format3 {
            backtrack_coverages,
            input_coverages,
            lookahead_coverages,
            lookup_records,
        } => match input_coverages.split_first() {
            Some((first, rest)) if first.glyph_coverage_value(glyph).is_some() => {
                let match_context = MatchContext {
                    backtrack_table: GlyphTable::ByCoverage(backtrack_coverages),
                    input_table: GlyphTable::ByCoverage(rest),
                    lookahead_table: GlyphTable::ByCoverage(lookahead_coverages),
                };
                if f(&match_context) {
                    Ok(Some(ContextLookupHelper::new(match_context, lookup_records)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        },
    }
}

/// A set of glyphs, with the rank of each glyph within the set.
///
/// Both encodings are required to be sorted. Tables that are not sorted are still honoured by
/// scanning in table order and taking the first match.
pub enum Coverage {
    Format1 {
        glyph_array: Vec<u16>,
        sorted: bool,
    },
    Format2 {
        coverage_range_array: Vec<CoverageRangeRecord>,
        sorted: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let glyph_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                let sorted = glyph_array.iter().tuple_windows().all(|(a, b)| a < b);
                Ok(Coverage::Format1 {
                    glyph_array,
                    sorted,
                })
            }
            2 => {
                let coverage_range_count = usize::from(ctxt.read_u16be()?);
                let coverage_range_array = ctxt
                    .read_array::<CoverageRangeRecord>(coverage_range_count)?
                    .to_vec();
                for coverage_range_record in &coverage_range_array {
                    ctxt.check(
                        coverage_range_record.start_glyph <= coverage_range_record.end_glyph,
                    )?
                }
                let sorted = coverage_range_array
                    .iter()
                    .tuple_windows()
                    .all(|(a, b)| a.end_glyph < b.start_glyph);
                Ok(Coverage::Format2 {
                    coverage_range_array,
                    sorted,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl CoverageRangeRecord {
    fn coverage_index(&self, glyph: u16) -> Option<u16> {
        self.start_coverage_index
            .checked_add(glyph - self.start_glyph)
    }

    fn contains(&self, glyph: u16) -> bool {
        (glyph >= self.start_glyph) && (glyph <= self.end_glyph)
    }
}

impl Coverage {
    /// The rank of `glyph` within the set, or `None` if it is not covered.
    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        match *self {
            Coverage::Format1 {
                ref glyph_array,
                sorted,
            } => {
                let index = if sorted {
                    glyph_array.binary_search(&glyph).ok()
                } else {
                    glyph_array.iter().position(|&covered| covered == glyph)
                };
                index.and_then(|index| u16::try_from(index).ok())
            }
            Coverage::Format2 {
                ref coverage_range_array,
                sorted,
            } => {
                let range = if sorted {
                    coverage_range_array
                        .binary_search_by(|range| {
                            if glyph < range.start_glyph {
                                Ordering::Greater
                            } else if glyph > range.end_glyph {
                                Ordering::Less
                            } else {
                                Ordering::Equal
                            }
                        })
                        .ok()
                        .map(|index| &coverage_range_array[index])
                } else {
                    coverage_range_array.iter().find(|range| range.contains(glyph))
                };
                range.and_then(|range| range.coverage_index(glyph))
            }
        }
    }

    /// Convenience method to count the total number of glyphs covered
    pub fn glyph_count(&self) -> usize {
        match self {
            Coverage::Format1 { glyph_array, .. } => glyph_array.len(),
            Coverage::Format2 {
                coverage_range_array,
                ..
            } => coverage_range_array
                .iter()
                .fold(0, |acc, coverage_range_record| {
                    acc + (usize::from(coverage_range_record.end_glyph))
                        - (usize::from(coverage_range_record.start_glyph))
                        + 1
                }),
        }
    }
}

pub enum ClassDef {
    Format1 {
        start_glyph: u16,
        class_value_array: Vec<u16>,
    },
    Format2 {
        class_range_array: Vec<ClassRangeRecord>,
    },
}

pub struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let class_value_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(ClassDef::Format1 {
                    start_glyph,
                    class_value_array,
                })
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_range_array = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)
                    // Some fonts declare more ranges than the table holds, so cap the count to
                    // the bytes that are available.
                    .or_else(|_| ctxt.read_array_upto_hack::<ClassRangeRecord>(class_range_count))?
                    .to_vec();
                Ok(ClassDef::Format2 { class_range_array })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ClassDef {
    /// The class of `glyph`. Glyphs that are not listed are in class 0.
    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        match *self {
            ClassDef::Format1 {
                start_glyph,
                ref class_value_array,
            } => {
                if glyph >= start_glyph {
                    class_value_array
                        .get(usize::from(glyph - start_glyph))
                        .copied()
                        .unwrap_or(0)
                } else {
                    0
                }
            }
            ClassDef::Format2 {
                ref class_range_array,
            } => class_range_array
                .iter()
                .find(|class_range| {
                    (glyph >= class_range.start_glyph) && (glyph <= class_range.end_glyph)
                })
                .map_or(0, |class_range| class_range.class_value),
        }
    }
}

pub type LookupCache<T> = Vec<Option<Rc<LookupCacheItem<T>>>>;

pub struct LookupCacheItem<T> {
    pub lookup_flag: LookupFlag,
    pub mark_filtering_set: Option<u16>,
    pub lookup_subtables: T,
}

/// Tables parsed during one substitution call, shared between the lookups that use them.
///
/// Coverage and class definition tables are keyed by their position in the table data, so a
/// cache must only be used with the table it was first used with.
pub struct LayoutCache<T: LayoutTableType> {
    coverages: RefCell<ReadCache<Coverage>>,
    classdefs: RefCell<ReadCache<ClassDef>>,
    lookup_cache: RefCell<LookupCache<T::LookupType>>,
}

impl<T: LayoutTableType> LayoutCache<T> {
    pub fn new() -> Self {
        LayoutCache {
            coverages: RefCell::new(ReadCache::new()),
            classdefs: RefCell::new(ReadCache::new()),
            lookup_cache: RefCell::new(Vec::new()),
        }
    }
}

impl LayoutCache<GSUB> {
    fn read_coverage(
        &self,
        scope: ReadScope<'_>,
        offset: usize,
    ) -> Result<Rc<Coverage>, ParseError> {
        scope
            .offset(offset)
            .read_cache::<Coverage>(&mut self.coverages.borrow_mut())
    }

    fn read_coverages<'a>(
        &self,
        scope: ReadScope<'a>,
        offsets: ReadArray<'a, U16Be>,
    ) -> Result<Vec<Rc<Coverage>>, ParseError> {
        offsets
            .iter()
            .map(|offset| self.read_coverage(scope, usize::from(offset)))
            .collect()
    }

    fn read_classdef(
        &self,
        scope: ReadScope<'_>,
        offset: usize,
    ) -> Result<Rc<ClassDef>, ParseError> {
        scope
            .offset(offset)
            .read_cache::<ClassDef>(&mut self.classdefs.borrow_mut())
    }

    // A null backtrack or lookahead class definition puts every glyph in class 0
    fn read_optional_classdef(
        &self,
        scope: ReadScope<'_>,
        offset: usize,
    ) -> Result<Rc<ClassDef>, ParseError> {
        match offset {
            0 => Ok(Rc::new(ClassDef::Format2 {
                class_range_array: Vec::new(),
            })),
            _ => self.read_classdef(scope, offset),
        }
    }
}

impl<T: LayoutTableType> Default for LayoutCache<T> {
    fn default() -> Self {
        LayoutCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn read_coverage(data: &[u8]) -> Coverage {
        ReadScope::new(data).read::<Coverage>().unwrap()
    }

    #[test]
    fn coverage_format1_rank() {
        let coverage = read_coverage(&coverage_format1(&[3, 7, 9, 200]));
        assert_eq!(coverage.glyph_coverage_value(3), Some(0));
        assert_eq!(coverage.glyph_coverage_value(9), Some(2));
        assert_eq!(coverage.glyph_coverage_value(200), Some(3));
        assert_eq!(coverage.glyph_coverage_value(8), None);
        assert_eq!(coverage.glyph_count(), 4);
    }

    #[test]
    fn coverage_format2_rank() {
        let coverage = read_coverage(&coverage_format2(&[(10, 12, 0), (20, 21, 3)]));
        assert_eq!(coverage.glyph_coverage_value(10), Some(0));
        assert_eq!(coverage.glyph_coverage_value(12), Some(2));
        assert_eq!(coverage.glyph_coverage_value(21), Some(4));
        assert_eq!(coverage.glyph_coverage_value(13), None);
        assert_eq!(coverage.glyph_coverage_value(9), None);
        assert_eq!(coverage.glyph_count(), 5);
    }

    #[test]
    fn coverage_unsorted_first_match_wins() {
        let coverage = read_coverage(&coverage_format1(&[9, 3, 9]));
        assert_eq!(coverage.glyph_coverage_value(9), Some(0));
        assert_eq!(coverage.glyph_coverage_value(3), Some(1));

        let coverage = read_coverage(&coverage_format2(&[(20, 29, 0), (5, 25, 10)]));
        assert_eq!(coverage.glyph_coverage_value(22), Some(2));
        assert_eq!(coverage.glyph_coverage_value(6), Some(11));
    }

    #[test]
    fn coverage_rank_overflow_is_not_covered() {
        let coverage = read_coverage(&coverage_format2(&[(0, 10, 0xFFFE)]));
        assert_eq!(coverage.glyph_coverage_value(1), Some(0xFFFF));
        assert_eq!(coverage.glyph_coverage_value(2), None);
    }

    #[test]
    fn coverage_inverted_range_is_rejected() {
        let data = coverage_format2(&[(10, 5, 0)]);
        assert_eq!(
            ReadScope::new(&data).read::<Coverage>().err(),
            Some(ParseError::BadValue)
        );
    }

    #[test]
    fn coverage_bad_format() {
        let data = [0, 3, 0, 0];
        assert_eq!(
            ReadScope::new(&data).read::<Coverage>().err(),
            Some(ParseError::BadVersion)
        );
    }

    #[test]
    fn classdef_unlisted_is_class_zero() {
        let data = classdef_format1(5, &[1, 2, 3]);
        let classdef = ReadScope::new(&data).read::<ClassDef>().unwrap();
        assert_eq!(classdef.glyph_class_value(4), 0);
        assert_eq!(classdef.glyph_class_value(6), 2);
        assert_eq!(classdef.glyph_class_value(8), 0);

        let data = classdef_format2(&[(10, 20, 4)]);
        let classdef = ReadScope::new(&data).read::<ClassDef>().unwrap();
        assert_eq!(classdef.glyph_class_value(15), 4);
        assert_eq!(classdef.glyph_class_value(21), 0);
    }

    #[test]
    fn read_gsub_v1_x() {
        let data = [
            0x00, 0x01, // major version
            0x00, 0x01, // minor version
            0x00, 0x00, // script_list_offset
            0x00, 0x00, // feature_list_offset
            0x00, 0x00, // lookup_list_offset
        ];
        let table = ReadScope::new(&data).read::<LayoutTable<'_, GSUB>>().unwrap();
        assert!(table.opt_script_list.is_none());
        assert!(table.opt_lookup_list.is_none());
    }

    #[test]
    fn read_gsub_bad_version() {
        let data = [0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            ReadScope::new(&data)
                .read::<LayoutTable<'_, GSUB>>()
                .err(),
            Some(ParseError::BadVersion)
        );
    }

    #[test]
    fn read_gsub_offset_past_end() {
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
        assert_eq!(
            ReadScope::new(&data)
                .read::<LayoutTable<'_, GSUB>>()
                .err(),
            Some(ParseError::BadOffset)
        );
    }

    #[test]
    fn script_and_langsys_fallback() {
        let data = gsub_table(
            script_list(vec![
                (tag::DFLT, script(Some(langsys(&[0])), vec![])),
                (
                    tag::LATN,
                    script(Some(langsys(&[0])), vec![(tag::TRK, langsys(&[1]))]),
                ),
            ]),
            feature_list(vec![(tag::LIGA, vec![0]), (tag::SMCP, vec![1])]),
            lookup_list(vec![]),
        );
        let table = ReadScope::new(&data).read::<LayoutTable<'_, GSUB>>().unwrap();

        let latn = table.find_script_or_default(tag::LATN).unwrap();
        let trk = latn.find_langsys_or_default(Some(tag::TRK)).unwrap();
        assert_eq!(trk.feature_indices_iter().copied().collect::<Vec<_>>(), vec![1]);
        let missing = latn.find_langsys_or_default(Some(tag::DFLT)).unwrap();
        assert_eq!(missing.feature_indices_iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(missing.required_feature_index(), None);

        assert!(table.find_script(tag::ARAB).is_none());
        assert!(table.find_script_or_default(tag::ARAB).is_some());

        let feature = table.find_langsys_feature(trk, tag::SMCP).unwrap().unwrap();
        assert_eq!(feature.lookup_indices, vec![1]);
        assert!(table.find_langsys_feature(trk, tag::LIGA).unwrap().is_none());
    }

    #[test]
    fn required_feature_is_reported() {
        let langsys_data = table(
            &[Field::Null16, Field::U16(1), Field::U16(1), Field::U16(0)],
            &[],
        );
        let langsys = ReadScope::new(&langsys_data).read::<LangSys>().unwrap();
        assert_eq!(langsys.required_feature_index(), Some(1));

        let feature_data = feature_list(vec![(tag::LIGA, vec![0]), (tag::RLIG, vec![1])]);
        let feature_list = ReadScope::new(&feature_data).read::<FeatureList>().unwrap();
        let required = feature_list.nth_feature_record(1).unwrap();
        assert_eq!(required.feature_tag, tag::RLIG);
    }

    #[test]
    fn feature_index_out_of_range() {
        let data = gsub_table(
            script_list(vec![(tag::DFLT, script(Some(langsys(&[5])), vec![]))]),
            feature_list(vec![(tag::LIGA, vec![0])]),
            lookup_list(vec![]),
        );
        let table = ReadScope::new(&data).read::<LayoutTable<'_, GSUB>>().unwrap();
        let langsys = table
            .find_script_or_default(tag::DFLT)
            .and_then(|script| script.find_langsys_or_default(None))
            .unwrap();
        assert_eq!(
            table.find_langsys_feature(langsys, tag::LIGA).err(),
            Some(ParseError::BadIndex)
        );
    }

    fn read_lookup_list(data: &[u8]) -> LookupList<'_, GSUB> {
        ReadScope::new(data).read::<LookupList<'_, GSUB>>().unwrap()
    }

    #[test]
    fn unknown_lookup_type_is_unsupported() {
        let data = lookup_list(vec![lookup(9, 0, vec![], None)]);
        let lookup_list = read_lookup_list(&data);
        assert_eq!(lookup_list.len(), 1);
        assert!(!lookup_list.is_empty());
        let cache = LayoutCache::new();
        assert_eq!(
            lookup_list.lookup_cache_gsub(&cache, 0).err(),
            Some(SubstError::UnsupportedSubtableType(9))
        );
    }

    #[test]
    fn unknown_subtable_format_is_unsupported() {
        let subtable = vec![0, 3, 0, 0];
        let data = lookup_list(vec![lookup(1, 0, vec![subtable], None)]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        assert_eq!(
            lookup_list.lookup_cache_gsub(&cache, 0).err(),
            Some(SubstError::UnsupportedSubtableType(1))
        );
    }

    #[test]
    fn extension_resolves_to_real_type() {
        let single = single_subst_format1(coverage_format1(&[5]), 10);
        let data = lookup_list(vec![lookup(7, 0, vec![extension(1, single)], None)]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        let item = lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        match item.lookup_subtables {
            SubstLookup::SingleSubst(ref subtables) => {
                assert_eq!(subtables.len(), 1);
                assert_eq!(subtables[0].apply_glyph(5), Ok(Some(15)));
            }
            _ => panic!("expected single substitution"),
        }
    }

    #[test]
    fn nested_extension_is_unsupported() {
        let single = single_subst_format1(coverage_format1(&[5]), 10);
        let data = lookup_list(vec![lookup(
            7,
            0,
            vec![extension(7, extension(1, single))],
            None,
        )]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        assert_eq!(
            lookup_list.lookup_cache_gsub(&cache, 0).err(),
            Some(SubstError::UnsupportedSubtableType(7))
        );
    }

    #[test]
    fn extension_types_must_agree() {
        let single = single_subst_format1(coverage_format1(&[5]), 10);
        let multiple = multiple_subst(coverage_format1(&[5]), vec![vec![1, 2]]);
        let data = lookup_list(vec![lookup(
            7,
            0,
            vec![extension(1, single), extension(2, multiple)],
            None,
        )]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        assert_eq!(
            lookup_list.lookup_cache_gsub(&cache, 0).err(),
            Some(SubstError::MalformedTable(ParseError::BadValue))
        );
    }

    #[test]
    fn subtable_offset_past_end_is_malformed() {
        let mut data = lookup_list(vec![lookup(
            1,
            0,
            vec![single_subst_format1(coverage_format1(&[5]), 1)],
            None,
        )]);
        // lookup list: count, offset; lookup: type, flag, count, subtable offset
        let subtable_offset_pos = 4 + 6;
        data[subtable_offset_pos] = 0x7F;
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        assert_eq!(
            lookup_list.lookup_cache_gsub(&cache, 0).err(),
            Some(SubstError::MalformedTable(ParseError::BadOffset))
        );
    }

    #[test]
    fn mark_filtering_set_is_read() {
        let data = lookup_list(vec![lookup(
            1,
            0x0010,
            vec![single_subst_format2(coverage_format1(&[5]), &[6])],
            Some(3),
        )]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        let item = lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        assert_eq!(item.mark_filtering_set, Some(3));
        assert!(item.lookup_flag.get_use_mark_filtering_set());
    }

    #[test]
    fn shared_coverage_is_read_once() {
        let coverage = coverage_format1(&[1, 2]);
        let data = lookup_list(vec![
            lookup(1, 0, vec![single_subst_format1(coverage.clone(), 1)], None),
            lookup(1, 0, vec![single_subst_format1(coverage, 2)], None),
        ]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        lookup_list.lookup_cache_gsub(&cache, 1).unwrap();
        // Each lookup embeds its own copy of the coverage table
        assert_eq!(cache.coverages.borrow().len(), 2);
        let first = lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        let again = lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn single_subst_delta_wraps() {
        let data = lookup_list(vec![lookup(
            1,
            0,
            vec![single_subst_format1(coverage_format1(&[2, 0xFFFF]), -3)],
            None,
        )]);
        let lookup_list = read_lookup_list(&data);
        let cache = LayoutCache::new();
        let item = lookup_list.lookup_cache_gsub(&cache, 0).unwrap();
        match item.lookup_subtables {
            SubstLookup::SingleSubst(ref subtables) => {
                assert_eq!(subtables[0].apply_glyph(2), Ok(Some(0xFFFF)));
                assert_eq!(subtables[0].apply_glyph(0xFFFF), Ok(Some(0xFFFC)));
                assert_eq!(subtables[0].apply_glyph(3), Ok(None));
            }
            _ => panic!("expected single substitution"),
        }
    }
}
