#![allow(missing_docs)]

//! Parse binary data
//!
//! Every table in this crate is read through a `ReadScope`: a window onto the caller's bytes
//! that remembers where it sits relative to the start of the outermost table. All reads are
//! bounds checked and fail with a `ParseError` instead of reading past the end of the window.

use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::size;
use rustc_hash::FxHashMap;
use std::cmp;
use std::collections::hash_map::Entry;
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    base: usize,
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

/// Memoises values read from a scope, keyed by the absolute position of the scope.
///
/// Layout tables frequently share coverage and class definition tables between subtables, the
/// cache ensures each one is only parsed once.
pub struct ReadCache<T> {
    map: FxHashMap<usize, Rc<T>>,
}

pub trait ReadBinary {
    type HostType<'a>: Sized; // default = Self

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized; // default = Self

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadFixedSizeDep: ReadBinaryDep {
    /// The number of bytes consumed by `ReadBinaryDep::read`.
    fn size(args: Self::Args<'_>) -> usize;
}

/// Read will always succeed if sufficient bytes are available.
pub trait ReadUnchecked {
    type HostType: Sized; // default = Self

    /// The number of bytes consumed by `read_unchecked`.
    const SIZE: usize;

    /// Must read exactly `SIZE` bytes.
    /// Unsafe as it avoids prohibitively expensive per-byte bounds checking.
    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType;
}

pub trait ReadFrom {
    type ReadType: ReadUnchecked;
    fn read_from(value: <Self::ReadType as ReadUnchecked>::HostType) -> Self;
}

impl<T> ReadUnchecked for T
where
    T: ReadFrom,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType {
        let t = T::ReadType::read_unchecked(ctxt);
        T::read_from(t)
    }
}

impl<T> ReadBinary for T
where
    T: ReadUnchecked,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        ctxt.check_avail(T::SIZE)?;
        Ok(unsafe { T::read_unchecked(ctxt) })
        // Safe because we have `SIZE` bytes available.
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

impl<T> ReadFixedSizeDep for T
where
    T: ReadUnchecked,
{
    fn size((): ()) -> usize {
        T::SIZE
    }
}

pub trait CheckIndex {
    fn check_index(&self, index: usize) -> Result<(), ParseError>;
}

#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixedSizeDep> {
    scope: ReadScope<'a>,
    length: usize,
    stride: usize,
    args: T::Args<'a>,
}

pub struct ReadArrayIter<'a, T: ReadUnchecked> {
    scope: ReadScope<'a>,
    index: usize,
    length: usize,
    stride: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayDepIter<'a, 'b, T: ReadFixedSizeDep> {
    array: &'b ReadArray<'a, T>,
    index: usize,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        let base = 0;
        ReadScope { base, data }
    }

    /// Position of this scope relative to the outermost scope it was derived from.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Lenient offset: an offset past the end yields an empty scope, so the failure surfaces as
    /// `BadEof` on the first read from it.
    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let base = self.base + offset;
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { base, data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            if length <= data.len() {
                let base = self.base + offset;
                let data = &data[0..length];
                Ok(ReadScope { base, data })
            } else {
                Err(ParseError::BadEof)
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    /// Strict offset: the sub-region starting at `offset` and extending to the end of this scope.
    ///
    /// Fails with `ParseError::BadOffset` if `offset` does not lie within the scope.
    pub fn sub_region(&self, offset: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() {
            Ok(self.offset(offset))
        } else {
            Err(ParseError::BadOffset)
        }
    }

    /// Read a big-endian `u16` at `offset` without moving any cursor.
    pub fn read_u16(&self, offset: usize) -> Result<u16, ParseError> {
        self.offset_length(offset, size::U16)?.read::<U16Be>()
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16, ParseError> {
        self.read_u16(offset).map(|value| value as i16)
    }

    /// Read a big-endian `u32` at `offset` without moving any cursor.
    pub fn read_u32(&self, offset: usize) -> Result<u32, ParseError> {
        self.offset_length(offset, size::U32)?.read::<U32Be>()
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }

    pub fn read_cache<T>(
        &self,
        cache: &mut ReadCache<T::HostType<'a>>,
    ) -> Result<Rc<T::HostType<'a>>, ParseError>
    where
        T: 'static + ReadBinaryDep<Args<'a> = ()>,
    {
        match cache.map.entry(self.base) {
            Entry::Vacant(entry) => {
                let t = Rc::new(self.read::<T>()?);
                Ok(Rc::clone(entry.insert(t)))
            }
            Entry::Occupied(entry) => Ok(Rc::clone(entry.get())),
        }
    }
}

impl<T> ReadCache<T> {
    pub fn new() -> Self {
        let map = FxHashMap::default();
        ReadCache { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T> Default for ReadCache<T> {
    fn default() -> Self {
        ReadCache::new()
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        require(cond, ParseError::BadValue)
    }

    /// Check a condition, returning `ParseError::BadVersion` if `false`.
    ///
    /// Intended for use in checking versions read from data. Example:
    ///
    /// ```
    /// use glyphsub::binary::read::ReadScope;
    /// use glyphsub::error::ParseError;
    ///
    /// let scope = ReadScope::new(&[0, 2]);
    /// let mut ctxt = scope.ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    ///
    /// assert!(ctxt.check_version(major_version == 2).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 1), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        require(cond, ParseError::BadVersion)
    }

    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    fn check_avail(&self, length: usize) -> Result<(), ReadEof> {
        match self.offset.checked_add(length) {
            Some(endpos) if endpos <= self.scope.data.len() => Ok(()),
            _ => Err(ReadEof {}),
        }
    }

    /// Caller must ensure `N` bytes are available.
    unsafe fn read_unchecked_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0; N];
        bytes.copy_from_slice(
            self.scope
                .data
                .get_unchecked(self.offset..self.offset + N),
        );
        self.offset += N;
        bytes
    }

    unsafe fn read_unchecked_u16be(&mut self) -> u16 {
        u16::from_be_bytes(self.read_unchecked_bytes())
    }

    unsafe fn read_unchecked_u32be(&mut self) -> u32 {
        u32::from_be_bytes(self.read_unchecked_bytes())
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.check_avail(size::U16)?;
        // Safe because we have 2 bytes available.
        Ok(unsafe { self.read_unchecked_u16be() })
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.read_u16be().map(|value| value as i16)
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.check_avail(size::U32)?;
        // Safe because we have 4 bytes available.
        Ok(unsafe { self.read_unchecked_u32be() })
    }

    pub fn read_array<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_length = length.checked_mul(T::SIZE).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_length)?;
        let args = ();
        Ok(ReadArray {
            scope,
            length,
            stride: T::SIZE,
            args,
        })
    }

    pub fn read_array_dep<T: ReadFixedSizeDep>(
        &mut self,
        length: usize,
        args: T::Args<'a>,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let stride = T::size(args);
        let byte_length = length.checked_mul(stride).ok_or(ParseError::BadValue)?;
        let scope = self.read_scope(byte_length)?;
        Ok(ReadArray {
            scope,
            length,
            stride,
            args,
        })
    }

    /// Read an array of at most `length` items, capped to the bytes actually available.
    pub fn read_array_upto_hack<T: ReadUnchecked>(
        &mut self,
        length: usize,
    ) -> Result<ReadArray<'a, T>, ParseError> {
        let avail_bytes = self.scope.data.len().saturating_sub(self.offset);
        let max_length = avail_bytes / T::SIZE;
        let length = cmp::min(length, max_length);
        self.read_array(length)
    }

    fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        if let Ok(scope) = self.scope.offset_length(self.offset, length) {
            self.offset += length;
            Ok(scope)
        } else {
            Err(ReadEof {})
        }
    }
}

impl<'a, T: ReadFixedSizeDep> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType<'a>, ParseError> {
        if index < self.length {
            let offset = index * self.stride;
            let scope = self.scope.offset_length(offset, self.stride)?;
            let mut ctxt = scope.ctxt();
            T::read_dep(&mut ctxt, self.args)
        } else {
            Err(ParseError::BadIndex)
        }
    }

    pub fn get_item(&self, index: usize) -> Option<<T as ReadUnchecked>::HostType>
    where
        T: ReadUnchecked,
    {
        if index < self.length {
            let offset = index * self.stride;
            let scope = self.scope.offset_length(offset, self.stride).ok()?;
            let mut ctxt = scope.ctxt();
            // Safe because we have `SIZE` bytes available.
            Some(unsafe { T::read_unchecked(&mut ctxt) })
        } else {
            None
        }
    }

    pub fn to_vec(&self) -> Vec<<T as ReadUnchecked>::HostType>
    where
        T: ReadUnchecked,
    {
        self.iter().collect()
    }

    pub fn read_to_vec(&self) -> Result<Vec<T::HostType<'a>>, ParseError> {
        self.iter_res().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T>
    where
        T: ReadUnchecked,
    {
        ReadArrayIter {
            scope: self.scope,
            index: 0,
            length: self.length,
            stride: self.stride,
            phantom: PhantomData,
        }
    }

    pub fn iter_res<'b>(&'b self) -> ReadArrayDepIter<'a, 'b, T> {
        ReadArrayDepIter {
            array: self,
            index: 0,
        }
    }
}

impl<'a, T: ReadFixedSizeDep> CheckIndex for ReadArray<'a, T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        require(index < self.len(), ParseError::BadIndex)
    }
}

impl<T> CheckIndex for Vec<T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        require(index < self.len(), ParseError::BadIndex)
    }
}

fn require(cond: bool, err: ParseError) -> Result<(), ParseError> {
    if cond {
        Ok(())
    } else {
        Err(err)
    }
}

impl<'a, 'b, T: ReadUnchecked> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;
    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadUnchecked> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        if self.index >= self.length {
            return None;
        }
        let mut ctxt = self.scope.offset(self.index * self.stride).ctxt();
        ctxt.check_avail(self.stride).ok()?;
        // SAFETY: Ok because we have (at least) `stride` bytes available and T::SIZE is <= stride.
        self.index += 1;
        Some(unsafe { T::read_unchecked(&mut ctxt) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: ReadUnchecked> ExactSizeIterator for ReadArrayIter<'a, T> {}

impl<'a, 'b, T: ReadFixedSizeDep> Iterator for ReadArrayDepIter<'a, 'b, T> {
    type Item = Result<T::HostType<'a>, ParseError>;

    fn next(&mut self) -> Option<Result<T::HostType<'a>, ParseError>> {
        if self.index < self.array.len() {
            let result = self.array.read_item(self.index);
            self.index += 1;
            Some(result)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.index < self.array.len() {
            let length = self.array.len() - self.index;
            (length, Some(length))
        } else {
            (0, Some(0))
        }
    }
}

impl ReadUnchecked for U16Be {
    type HostType = u16;

    const SIZE: usize = size::U16;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> u16 {
        ctxt.read_unchecked_u16be()
    }
}

impl ReadUnchecked for U32Be {
    type HostType = u32;

    const SIZE: usize = size::U32;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> u32 {
        ctxt.read_unchecked_u32be()
    }
}

impl<T1, T2> ReadUnchecked for (T1, T2)
where
    T1: ReadUnchecked,
    T2: ReadUnchecked,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType {
        let t1 = T1::read_unchecked(ctxt);
        let t2 = T2::read_unchecked(ctxt);
        (t1, t2)
    }
}

impl<T1, T2, T3> ReadUnchecked for (T1, T2, T3)
where
    T1: ReadUnchecked,
    T2: ReadUnchecked,
    T3: ReadUnchecked,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    unsafe fn read_unchecked(ctxt: &mut ReadCtxt<'_>) -> Self::HostType {
        let t1 = T1::read_unchecked(ctxt);
        let t2 = T2::read_unchecked(ctxt);
        let t3 = T3::read_unchecked(ctxt);
        (t1, t2, t3)
    }
}
