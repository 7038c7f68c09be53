use std::{convert::TryFrom, io};

use super::{ReadSmeltExt, SerializationError, MAX_JOB_MESSAGE_LEN};

/// Job-critical deserialization for Smelt.
///
/// This trait provides a generic deserialization for the formats that cross
/// worker thread boundaries: job requests, responses, and the chain types
/// embedded in them.
pub trait SmeltDeserialize: Sized {
    /// Try to read `self` from the given `reader`.
    ///
    /// A malformed or truncated buffer fails the whole value: no partially
    /// parsed result is ever returned.
    ///
    /// This function has a `smelt_` prefix to alert the reader that the
    /// serialization in use is the job wire serialization, rather than some
    /// other kind of serialization.
    fn smelt_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError>;
}

/// Deserialize a `Vec`, where the number of items is set by a wide `u32`
/// count prefix in the data. This is the most common format in Smelt job
/// payloads.
///
/// See `smelt_deserialize_external_count` for more details, and usage
/// information.
impl<T: SmeltDeserialize + TrustedPreallocate> SmeltDeserialize for Vec<T> {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = reader.read_count_usize()?;
        smelt_deserialize_external_count(len, reader)
    }
}

/// Implement SmeltDeserialize for Vec<u8> directly instead of using the
/// blanket Vec implementation
///
/// This allows us to optimize the inner loop into a single call to
/// `read_exact()`. Note that we don't implement TrustedPreallocate for u8.
/// This allows the optimization without relying on specialization.
impl SmeltDeserialize for Vec<u8> {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = reader.read_count_usize()?;
        smelt_deserialize_bytes_external_count(len, reader)
    }
}

/// Deserialize a `Vec` containing `external_count` items.
///
/// In Smelt, most arrays are stored as a `u32` count, followed by that number
/// of items of type `T`. A few layouts place the count elsewhere, with other
/// fields between it and the items.
///
/// ## Usage
///
/// Use `smelt_deserialize_external_count` when the array count is determined
/// by other data, and `Vec::smelt_deserialize` for the common
/// count-then-items layout.
pub fn smelt_deserialize_external_count<R: io::Read, T: SmeltDeserialize + TrustedPreallocate>(
    external_count: usize,
    mut reader: R,
) -> Result<Vec<T>, SerializationError> {
    match u64::try_from(external_count) {
        Ok(external_count) if external_count > T::max_allocation() => {
            return Err(SerializationError::Parse(
                "Vector longer than max_allocation",
            ))
        }
        Ok(_) => {}
        // usize is less than or equal to 64 bits on all supported Rust
        // platforms, so in practice this error is impossible. (But the check
        // is required, because Rust is future-proof for 128 bit memory
        // spaces.)
        Err(_) => return Err(SerializationError::Parse("Vector longer than u64::MAX")),
    }
    let mut vec = Vec::with_capacity(external_count);
    for _ in 0..external_count {
        vec.push(T::smelt_deserialize(&mut reader)?);
    }
    Ok(vec)
}

/// `smelt_deserialize_external_count`, specialised for raw bytes.
///
/// This allows us to optimize the inner loop into a single call to
/// `read_exact()`.
pub fn smelt_deserialize_bytes_external_count<R: io::Read>(
    external_count: usize,
    mut reader: R,
) -> Result<Vec<u8>, SerializationError> {
    if external_count > MAX_U8_ALLOCATION {
        return Err(SerializationError::Parse(
            "Byte vector longer than MAX_U8_ALLOCATION",
        ));
    }
    let mut vec = vec![0u8; external_count];
    reader.read_exact(&mut vec)?;
    Ok(vec)
}

/// Helper for deserializing more succinctly via type inference
pub trait SmeltDeserializeInto {
    /// Deserialize based on type inference
    fn smelt_deserialize_into<T>(self) -> Result<T, SerializationError>
    where
        T: SmeltDeserialize;
}

impl<R: io::Read> SmeltDeserializeInto for R {
    fn smelt_deserialize_into<T>(self) -> Result<T, SerializationError>
    where
        T: SmeltDeserialize,
    {
        T::smelt_deserialize(self)
    }
}

/// Blind preallocation of a Vec<T: TrustedPreallocate> is based on a bounded
/// length. This is in contrast to blind preallocation of a generic Vec<T>,
/// which is a DOS vector.
///
/// The max_allocation() function provides a loose upper bound on the size of
/// the Vec<T: TrustedPreallocate> which can possibly be received in a valid
/// job message. If this limit is too low, valid batches are rejected.
pub trait TrustedPreallocate {
    /// Provides a ***loose upper bound*** on the size of the
    /// Vec<T: TrustedPreallocate> which can possibly be received in a valid
    /// job message.
    fn max_allocation() -> u64;
}

/// The length of the longest valid `Vec<u8>` that can appear in a job message
///
/// The `u32` count field takes 4 bytes, so the largest byte vector a valid
/// message can carry is (MAX_JOB_MESSAGE_LEN - 4);
pub(crate) const MAX_U8_ALLOCATION: usize = MAX_JOB_MESSAGE_LEN - 4;
