use std::io;

use super::WriteSmeltExt;

/// Job-critical serialization for Smelt.
///
/// This trait provides a generic serialization for the formats that cross
/// worker thread boundaries: job requests, responses, and the chain types
/// embedded in them. It is intended for use only in those wire contexts; in
/// other contexts, such as configuration, it is preferable to use Serde.
pub trait SmeltSerialize: Sized {
    /// The exact number of bytes [`Self::smelt_serialize`] writes for `self`.
    ///
    /// Implementations compute this arithmetically from the wire layout, so a
    /// buffer of exactly this size can be allocated up front. Writing more or
    /// fewer bytes than `wire_size()` is a programming defect, not a runtime
    /// condition; [`Self::smelt_serialize_to_vec`] checks the bound.
    fn wire_size(&self) -> usize;

    /// Write `self` to the given `writer` using the canonical format.
    ///
    /// This function has a `smelt_` prefix to alert the reader that the
    /// serialization in use is the job wire serialization, rather than some
    /// other kind of serialization.
    ///
    /// Notice that the error type is [`std::io::Error`]; this indicates that
    /// serialization MUST be infallible up to errors in the underlying writer.
    /// In other words, any type implementing `SmeltSerialize` must make
    /// illegal states unrepresentable.
    fn smelt_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error>;

    /// Serialize `self` into a vec of exactly [`Self::wire_size`] bytes.
    ///
    /// # Panics
    ///
    /// If the bytes written differ from `wire_size()`: an over- or
    /// under-write is a defect in the implementing type.
    fn smelt_serialize_to_vec(&self) -> Result<Vec<u8>, io::Error> {
        let expected_size = self.wire_size();
        let mut data = Vec::with_capacity(expected_size);
        self.smelt_serialize(&mut data)?;
        assert_eq!(
            data.len(),
            expected_size,
            "smelt_serialize wrote {} bytes but wire_size() is {}",
            data.len(),
            expected_size,
        );
        Ok(data)
    }
}

/// Serialize a `Vec` as a wide `u32` count of items, then the items. This is
/// the most common format in Smelt job payloads.
///
/// See `smelt_serialize_external_count` for more details, and usage
/// information.
impl<T: SmeltSerialize> SmeltSerialize for Vec<T> {
    fn wire_size(&self) -> usize {
        4 + self.iter().map(SmeltSerialize::wire_size).sum::<usize>()
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_count(self.len())?;
        smelt_serialize_external_count(self, writer)
    }
}

/// Serialize a byte vector as a wide `u32` count, then the bytes.
///
/// # Correctness
///
/// Some Smelt types have specific rules about serialization of `Vec<u8>`s.
/// Check the wire layout before using this function.
//
// we specifically want to serialize `Vec`s here, rather than generic slices
#[allow(clippy::ptr_arg)]
pub fn smelt_serialize_bytes<W: io::Write>(vec: &Vec<u8>, mut writer: W) -> Result<(), io::Error> {
    writer.write_count(vec.len())?;
    writer.write_all(vec)
}

/// The serialized size of a byte vector written by [`smelt_serialize_bytes`].
pub fn smelt_serialized_bytes_size(vec: &[u8]) -> usize {
    4 + vec.len()
}

/// Serialize a typed `Vec` **without** writing the number of items as a
/// count field.
///
/// In Smelt, most arrays are stored as a `u32` count, followed by that number
/// of items of type `T`. A few layouts place the count elsewhere, with other
/// fields between it and the items.
///
/// ## Usage
///
/// Use `smelt_serialize_external_count` when the array count is written
/// separately from the items, and `Vec::smelt_serialize` for the common
/// count-then-items layout.
///
/// This function has a `smelt_` prefix to alert the reader that the
/// serialization in use is the job wire serialization, rather than some
/// other kind of serialization.
//
// we specifically want to serialize `Vec`s here, rather than generic slices
#[allow(clippy::ptr_arg)]
pub fn smelt_serialize_external_count<W: io::Write, T: SmeltSerialize>(
    vec: &Vec<T>,
    mut writer: W,
) -> Result<(), io::Error> {
    for x in vec {
        x.smelt_serialize(&mut writer)?;
    }
    Ok(())
}

/// The maximum length of a Smelt job message, in bytes.
///
/// This value is used to calculate safe preallocation limits for job payload
/// types. Wallet rescans submit batches of several hundred candidates against
/// hundreds of accounts, so the limit is far looser than a network protocol
/// message would allow; it only exists to bound memory when a message header
/// is corrupt.
pub const MAX_JOB_MESSAGE_LEN: usize = 64 * 1024 * 1024;
