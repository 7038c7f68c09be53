use std::{convert::TryInto, io};

use byteorder::{LittleEndian, ReadBytesExt};

use super::{SerializationError, MAX_JOB_MESSAGE_LEN};

/// Extends [`Read`] with methods for reading Smelt wire types.
///
/// [`Read`]: https://doc.rust-lang.org/std/io/trait.Read.html
pub trait ReadSmeltExt: io::Read {
    /// Reads a list or byte count as a fixed-width `u32`, little-endian.
    ///
    /// Job payloads carry collections that routinely exceed 255 elements, so
    /// counts are always a full 32-bit field, never a single byte.
    ///
    /// # Security
    ///
    /// Deserialized counts must be validated before being used to size
    /// allocations. Preallocating vectors using untrusted counts allows memory
    /// denial of service attacks, so counts greater than the job message
    /// length limit are rejected here.
    ///
    /// # Examples
    ///
    /// ```
    /// use smelt_chain::serialization::ReadSmeltExt;
    ///
    /// use std::io::Cursor;
    /// assert_eq!(
    ///     0x0102,
    ///     Cursor::new(b"\x02\x01\x00\x00")
    ///         .read_count().unwrap()
    /// );
    /// ```
    #[inline]
    fn read_count(&mut self) -> Result<u32, SerializationError> {
        let count = self.read_u32::<LittleEndian>()?;

        // # Security
        // Defence-in-depth for memory DoS via preallocation: each counted item
        // occupies at least one byte of the message.
        if count as usize > MAX_JOB_MESSAGE_LEN {
            return Err(SerializationError::Parse(
                "count larger than job message limit",
            ));
        }

        Ok(count)
    }

    /// Reads a `read_count()` result as a `usize`.
    #[inline]
    fn read_count_usize(&mut self) -> Result<usize, SerializationError> {
        Ok(self.read_count()?.try_into()?)
    }

    /// Convenience method to read a `[u8; 32]`.
    #[inline]
    fn read_32_bytes(&mut self) -> io::Result<[u8; 32]> {
        let mut bytes = [0; 32];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Convenience method to read a `[u8; 64]`.
    #[inline]
    fn read_64_bytes(&mut self) -> io::Result<[u8; 64]> {
        let mut bytes = [0; 64];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a single presence or boolean flag byte, rejecting values other
    /// than `0` and `1`.
    #[inline]
    fn read_flag(&mut self) -> Result<bool, SerializationError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationError::Parse("flag byte must be 0 or 1")),
        }
    }
}

/// Mark all types implementing `Read` as implementing the extension.
impl<R: io::Read + ?Sized> ReadSmeltExt for R {}
