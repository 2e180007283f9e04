//! Byte order of stored samples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte order of raw sample data on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// The byte order of the running platform.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// The byte order opposite to the running platform's.
    pub const fn non_native() -> Self {
        match Self::native() {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        }
    }

    /// Returns true if this is the platform byte order.
    pub fn is_native(self) -> bool {
        self == Self::native()
    }

    /// Reverse each `width`-byte element of `bytes` in place.
    ///
    /// Used when recoding raw data between byte orders. A trailing partial
    /// element is left untouched.
    pub fn swap_in_place(bytes: &mut [u8], width: usize) {
        if width <= 1 {
            return;
        }
        for chunk in bytes.chunks_exact_mut(width) {
            chunk.reverse();
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => write!(f, "little"),
            ByteOrder::Big => write!(f, "big"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_and_non_native_differ() {
        assert_ne!(ByteOrder::native(), ByteOrder::non_native());
        assert!(ByteOrder::native().is_native());
    }

    #[test]
    fn swap_reverses_each_element() {
        let mut bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        ByteOrder::swap_in_place(&mut bytes, 4);
        assert_eq!(bytes, [4, 3, 2, 1, 8, 7, 6, 5, 9]);
    }
}
