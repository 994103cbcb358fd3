// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Reports how many bytes a value occupies for budget accounting.
///
/// The weight of an entry is its key length plus the weight of its value.
pub trait Weight {
    /// Returns the number of bytes charged for this value.
    fn weight(&self) -> usize;
}

impl Weight for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weight for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weight for Box<[u8]> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weight for bytes::Bytes {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl<T: Weight + ?Sized> Weight for std::sync::Arc<T> {
    fn weight(&self) -> usize {
        (**self).weight()
    }
}
