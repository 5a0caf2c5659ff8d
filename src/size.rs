//! Definitions of the sizes of binary types.

use std::mem;

pub const U16: usize = mem::size_of::<u16>();
pub const U32: usize = mem::size_of::<u32>();
