// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Immutable view over cached bytes.

use std::borrow::Cow;
use std::fmt::{self, Debug, Display};

use bytes::Bytes;
use peercache_lru::Weight;

/// An immutable, cheaply cloneable view of a cached value.
///
/// A `ByteView` never exposes its bytes mutably: [`as_slice`](Self::as_slice) hands
/// out a shared slice and [`to_vec`](Self::to_vec) a private copy, so nothing a caller
/// does to a returned value can alter what the cache holds.
///
/// # Examples
///
/// ```
/// use peercache::ByteView;
///
/// let view = ByteView::from("630");
/// assert_eq!(view.len(), 3);
/// assert_eq!(view.as_slice(), b"630");
///
/// let mut copy = view.to_vec();
/// copy[0] = b'9';
/// assert_eq!(view.to_string(), "630");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteView(Bytes);

impl ByteView {
    /// Returns the number of bytes in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the view holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the bytes as a read-only slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns an owned copy of the bytes.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Returns the bytes as a shared [`Bytes`] handle without copying.
    ///
    /// [`Bytes`] is immutable, so sharing the buffer keeps the cached data intact.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        self.0.clone()
    }

    /// Decodes the bytes as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<Bytes> for ByteView {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for ByteView {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<String> for ByteView {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<[u8]> for ByteView {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl PartialEq<str> for ByteView {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for ByteView {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl Weight for ByteView {
    fn weight(&self) -> usize {
        self.0.len()
    }
}

impl Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByteView").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_from_slice_detaches_from_source() {
        let mut source = b"hello".to_vec();
        let view = ByteView::from(source.as_slice());
        source[0] = b'j';

        assert_eq!(view, "hello");
    }

    #[test]
    fn to_vec_returns_independent_copy() {
        let view = ByteView::from(vec![1, 2, 3]);
        let mut copy = view.to_vec();
        copy.clear();

        assert_eq!(view.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn weight_is_byte_length() {
        assert_eq!(ByteView::from("abcd").weight(), 4);
        assert_eq!(ByteView::default().weight(), 0);
        assert!(ByteView::default().is_empty());
    }

    #[test]
    fn display_is_lossy_utf8() {
        assert_eq!(ByteView::from("630").to_string(), "630");
        assert_eq!(ByteView::from(vec![0x66, 0xff]).to_string(), "f\u{fffd}");
    }
}
