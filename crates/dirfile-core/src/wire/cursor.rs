use super::{TruncatedSnafu, WireError};

/// Positioned reads over a record, in native byte order.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over the provided record bytes.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Total number of bytes in the record.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty record.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads exactly `len` bytes at `offset`.
    pub fn read_exact(&self, offset: usize, len: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[offset..end]),
            _ => TruncatedSnafu {
                field,
                needed: offset.saturating_add(len),
                found: self.bytes.len(),
            }
            .fail(),
        }
    }

    /// Reads a fixed-size byte array at `offset`.
    pub fn read_array<const N: usize>(&self, offset: usize, field: &'static str) -> Result<[u8; N], WireError> {
        let bytes = self.read_exact(offset, N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Reads a `u32`.
    pub fn u32(&self, offset: usize, field: &'static str) -> Result<u32, WireError> {
        Ok(u32::from_ne_bytes(self.read_array(offset, field)?))
    }

    /// Reads an `i32`.
    pub fn i32(&self, offset: usize, field: &'static str) -> Result<i32, WireError> {
        Ok(i32::from_ne_bytes(self.read_array(offset, field)?))
    }

    /// Reads an `i64`.
    pub fn i64(&self, offset: usize, field: &'static str) -> Result<i64, WireError> {
        Ok(i64::from_ne_bytes(self.read_array(offset, field)?))
    }

    /// Reads an `f64`.
    pub fn f64(&self, offset: usize, field: &'static str) -> Result<f64, WireError> {
        Ok(f64::from_ne_bytes(self.read_array(offset, field)?))
    }
}

/// Positioned writes into a zero-filled record buffer, in native byte order.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    /// A zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    /// Writes `data` at `offset`. Offsets come from the record layout and
    /// always fall inside the fixed part of the buffer.
    pub fn put(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Writes a `u32`.
    pub fn u32(&mut self, offset: usize, v: u32) {
        self.put(offset, &v.to_ne_bytes());
    }

    /// Writes an `i32`.
    pub fn i32(&mut self, offset: usize, v: i32) {
        self.put(offset, &v.to_ne_bytes());
    }

    /// Writes an `i64`.
    pub fn i64(&mut self, offset: usize, v: i64) {
        self.put(offset, &v.to_ne_bytes());
    }

    /// Writes an `f64`.
    pub fn f64(&mut self, offset: usize, v: f64) {
        self.put(offset, &v.to_ne_bytes());
    }

    /// Appends bytes past the current end.
    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Current length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The finished buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_end_fail_with_context() {
        let r = ByteReader::new(&[1, 2, 3]);
        let err = r.u32(0, "kind").unwrap_err();
        assert!(matches!(
            err,
            WireError::Truncated {
                field: "kind",
                needed: 4,
                found: 3
            }
        ));
        assert!(r.read_exact(usize::MAX, 2, "x").is_err());
    }

    #[test]
    fn writer_and_reader_agree() {
        let mut w = ByteWriter::zeroed(16);
        w.i32(0, -7);
        w.f64(8, 2.5);
        let bytes = w.into_inner();
        let r = ByteReader::new(&bytes);
        assert_eq!(r.i32(0, "a").expect("i32"), -7);
        assert_eq!(r.f64(8, "b").expect("f64"), 2.5);
    }
}
