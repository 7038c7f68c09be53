use std::io;

use byteorder::{LittleEndian, WriteBytesExt};

/// Extends [`Write`] with methods for writing Smelt wire types.
///
/// [`Write`]: https://doc.rust-lang.org/std/io/trait.Write.html
pub trait WriteSmeltExt: io::Write {
    /// Write a list or byte count as a fixed-width `u32`, little-endian.
    ///
    /// Counts are always a full 32-bit field so batches larger than 255
    /// elements serialize without truncation.
    #[inline]
    fn write_count(&mut self, count: usize) -> io::Result<()> {
        let count = u32::try_from(count).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "count does not fit in u32")
        })?;
        self.write_u32::<LittleEndian>(count)
    }

    /// Convenience method to write exactly 32 u8's.
    #[inline]
    fn write_32_bytes(&mut self, bytes: &[u8; 32]) -> io::Result<()> {
        self.write_all(bytes)
    }

    /// Convenience method to write exactly 64 u8's.
    #[inline]
    fn write_64_bytes(&mut self, bytes: &[u8; 64]) -> io::Result<()> {
        self.write_all(bytes)
    }

    /// Write a presence or boolean flag as a single byte, `0` or `1`.
    #[inline]
    fn write_flag(&mut self, flag: bool) -> io::Result<()> {
        self.write_u8(flag as u8)
    }
}

/// Mark all types implementing `Write` as implementing the extension.
impl<W: io::Write + ?Sized> WriteSmeltExt for W {}
