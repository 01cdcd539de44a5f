/* ************************************************************************ **
** This file is part of elph, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of elph is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Newtyped `usize` indices, so that an index into the list of symmetry
//! operations can't be used to index the list of raw estimates.

use std::fmt::Debug;
use std::hash::Hash;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut, Range};
use std::{fmt, slice, vec};

/// Represents some newtyped `usize` wrapper.
pub trait Idx: Copy + 'static + Eq + Debug + Ord + Hash + Send + Sync {
    fn new(idx: usize) -> Self;
    fn index(self) -> usize;
}

impl Idx for usize {
    #[inline]
    fn new(idx: usize) -> Self { idx }
    #[inline]
    fn index(self) -> usize { self }
}

#[macro_export]
macro_rules! newtype_index {
    ($(#[$meta:meta])* $type:ident) => (
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $type(pub usize);

        impl $crate::Idx for $type {
            #[inline]
            fn new(value: usize) -> Self { $type(value) }

            #[inline]
            fn index(self) -> usize { self.0 }
        }

        impl ::std::fmt::Display for $type {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }
    );
}

/// A Vec that uses newtype indices.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Indexed<I: Idx, T> {
    #[cfg_attr(feature = "serde", serde(skip))]
    _marker: PhantomData<fn(&I)>,
    pub raw: Vec<T>,
}

impl<I: Idx, T: fmt::Debug> fmt::Debug for Indexed<I, T> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.raw, fmt)
    }
}

/// # Construction
impl<I: Idx, T> Indexed<I, T> {
    #[inline]
    pub fn from_raw(raw: Vec<T>) -> Self {
        Indexed { _marker: PhantomData, raw }
    }

    #[inline]
    pub fn new() -> Self {
        Self::from_raw(vec![])
    }

    /// Append an element, returning its index.
    #[inline]
    pub fn push(&mut self, d: T) -> I {
        let idx = I::new(self.len());
        self.raw.push(d);
        idx
    }

    #[inline]
    pub fn into_raw(self) -> Vec<T> {
        self.raw
    }
}

/// # Access
impl<I: Idx, T> Indexed<I, T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[inline]
    pub fn get(&self, index: I) -> Option<&T> {
        self.raw.get(index.index())
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.raw.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.raw.iter_mut()
    }

    #[inline]
    pub fn iter_enumerated(&self) -> impl ExactSizeIterator<Item=(I, &T)> + DoubleEndedIterator + '_ {
        self.raw.iter().enumerate().map(|(i, x)| (I::new(i), x))
    }

    #[inline]
    pub fn into_iter_enumerated(self) -> impl ExactSizeIterator<Item=(I, T)> + DoubleEndedIterator {
        self.raw.into_iter().enumerate().map(|(i, x)| (I::new(i), x))
    }

    #[inline]
    pub fn indices(&self) -> std::iter::Map<Range<usize>, fn(usize) -> I> {
        (0..self.len()).map(I::new as fn(usize) -> I)
    }

    /// Apply a function to each element, preserving indices.
    pub fn map<B, F: FnMut(&T) -> B>(&self, f: F) -> Indexed<I, B> {
        self.raw.iter().map(f).collect()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.raw
    }
}

impl<I: Idx, T> Index<I> for Indexed<I, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: I) -> &T {
        &self.raw[index.index()]
    }
}

impl<I: Idx, T> IndexMut<I> for Indexed<I, T> {
    #[inline]
    fn index_mut(&mut self, index: I) -> &mut T {
        &mut self.raw[index.index()]
    }
}

impl<I: Idx, T> Default for Indexed<I, T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Idx, T> Extend<T> for Indexed<I, T> {
    #[inline]
    fn extend<J: IntoIterator<Item=T>>(&mut self, iter: J) {
        self.raw.extend(iter);
    }
}

impl<I: Idx, T> FromIterator<T> for Indexed<I, T> {
    #[inline]
    fn from_iter<J: IntoIterator<Item=T>>(iter: J) -> Self {
        Indexed::from_raw(FromIterator::from_iter(iter))
    }
}

impl<I: Idx, T> IntoIterator for Indexed<I, T> {
    type Item = T;
    type IntoIter = vec::IntoIter<T>;

    #[inline]
    fn into_iter(self) -> vec::IntoIter<T> {
        self.raw.into_iter()
    }
}

impl<'a, I: Idx, T> IntoIterator for &'a Indexed<I, T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> slice::Iter<'a, T> {
        self.raw.iter()
    }
}
