//! Bounds-checked access to a contract's linear memory.
//!
//! Host operations never touch a backend's memory object. Each backend wraps
//! its native view in a type implementing [`MemoryAccessor`], and every byte
//! range a host operation derives from guest arguments goes through
//! [`checked_range`] first. A range `[offset, offset + length)` is valid when
//! `offset + length <= size`, computed in 64 bits so it cannot overflow.

use std::ops::Range;

use eei_hostapi::HostError;

/// Validate `[offset, offset + length)` against a buffer of `size` bytes.
///
/// Used for linear memory and for host-side source buffers (call data,
/// code, return data) alike.
pub fn checked_range(offset: u32, length: u32, size: usize) -> Result<Range<usize>, HostError> {
    let end = offset as u64 + length as u64;
    if end > size as u64 {
        return Err(HostError::out_of_bounds(
            offset as u64,
            length as u64,
            size as u64,
        ));
    }
    Ok(offset as usize..end as usize)
}

/// A view over one module instance's linear memory for the duration of a
/// single host call.
pub trait MemoryAccessor {
    /// Current size of the memory in bytes.
    fn size(&self) -> usize;

    /// Borrow `length` bytes at `offset`.
    fn range(&self, offset: u32, length: u32) -> Result<&[u8], HostError>;

    /// Mutably borrow `length` bytes at `offset`.
    fn range_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], HostError>;

    fn read_byte(&self, offset: u32) -> Result<u8, HostError> {
        Ok(self.range(offset, 1)?[0])
    }

    fn write_byte(&mut self, offset: u32, byte: u8) -> Result<(), HostError> {
        self.range_mut(offset, 1)?[0] = byte;
        Ok(())
    }

    /// Copy `length` bytes at `offset` out of memory.
    fn read_vec(&self, offset: u32, length: u32) -> Result<Vec<u8>, HostError> {
        Ok(self.range(offset, length)?.to_vec())
    }

    /// Read a fixed-size value such as an address or a storage word.
    fn read_array<const N: usize>(&self, offset: u32) -> Result<[u8; N], HostError>
    where
        Self: Sized,
    {
        let mut out = [0u8; N];
        out.copy_from_slice(self.range(offset, N as u32)?);
        Ok(out)
    }

    /// Write `data` at `offset`.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), HostError> {
        let len = u32::try_from(data.len())
            .map_err(|_| HostError::out_of_bounds(offset as u64, data.len() as u64, self.size() as u64))?;
        self.range_mut(offset, len)?.copy_from_slice(data);
        Ok(())
    }
}

/// Plain byte-vector memory for exercising host operations without a backend.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct VecMemory(pub Vec<u8>);

#[cfg(test)]
impl VecMemory {
    pub(crate) fn new(size: usize) -> Self {
        Self(vec![0; size])
    }
}

#[cfg(test)]
impl MemoryAccessor for VecMemory {
    fn size(&self) -> usize {
        self.0.len()
    }

    fn range(&self, offset: u32, length: u32) -> Result<&[u8], HostError> {
        let r = checked_range(offset, length, self.0.len())?;
        Ok(&self.0[r])
    }

    fn range_mut(&mut self, offset: u32, length: u32) -> Result<&mut [u8], HostError> {
        let r = checked_range(offset, length, self.0.len())?;
        Ok(&mut self.0[r])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_range_inside() {
        assert_eq!(checked_range(0, 100, 100).unwrap(), 0..100);
        assert_eq!(checked_range(10, 0, 10).unwrap(), 10..10);
    }

    #[test]
    fn test_checked_range_past_end() {
        assert_eq!(
            checked_range(0, 101, 100).unwrap_err(),
            HostError::out_of_bounds(0, 101, 100)
        );
        assert!(checked_range(11, 0, 10).is_err());
    }

    #[test]
    fn test_checked_range_no_overflow() {
        // offset + length overflows u32 but not u64.
        assert_eq!(
            checked_range(u32::MAX, u32::MAX, 1024).unwrap_err(),
            HostError::out_of_bounds(u32::MAX as u64, u32::MAX as u64, 1024)
        );
    }

    #[test]
    fn test_read_write_bytes() {
        let mut mem = VecMemory::new(8);
        mem.write_byte(7, 0xAA).unwrap();
        assert_eq!(mem.read_byte(7).unwrap(), 0xAA);
        assert!(mem.read_byte(8).is_err());
        assert!(mem.write_byte(8, 1).is_err());
    }

    #[test]
    fn test_read_array_and_write() {
        let mut mem = VecMemory::new(32);
        mem.write(4, &[1, 2, 3, 4]).unwrap();
        let arr: [u8; 4] = mem.read_array(4).unwrap();
        assert_eq!(arr, [1, 2, 3, 4]);
        assert_eq!(mem.read_vec(5, 2).unwrap(), vec![2, 3]);
        assert!(mem.write(30, &[0; 4]).is_err());
        // A failed write leaves memory unchanged.
        assert_eq!(&mem.0[28..], &[0, 0, 0, 0]);
    }
}
