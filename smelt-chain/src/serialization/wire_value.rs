//! Typed wire primitives with exact pre-computed sizes.
//!
//! Fixed-layout preimages (like the block header hash input) are built from
//! these values so the byte budget is explicit at the call site: every value
//! knows its [`size`](WireValue::size) before writing, and
//! [`serialize`] allocates exactly that many bytes.

use std::io;

use byteorder::{LittleEndian, WriteBytesExt};
use primitive_types::U256;

/// A typed wire primitive.
///
/// All multi-byte integers are little-endian, the single byte order declared
/// for the whole protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireValue {
    /// A fixed 4-byte unsigned integer.
    U32(u32),
    /// A fixed 8-byte unsigned integer.
    U64(u64),
    /// A fixed 32-byte hash or digest.
    Hash([u8; 32]),
    /// An arbitrary-precision unsigned integer, encoded least-significant
    /// byte first and zero-padded to `width` bytes.
    ///
    /// Construct with [`WireValue::big_int_le`], which checks that `value`
    /// fits in `width` bytes.
    BigIntLe {
        /// The integer value.
        value: U256,
        /// The declared encoded width, in bytes.
        width: usize,
    },
    /// A concatenation of child values, written in order.
    ///
    /// A list's size is the sum of its children's sizes; it carries no
    /// implicit length prefix. Callers needing variable-length collections
    /// must write an explicit wide count field themselves.
    List(Vec<WireValue>),
}

impl WireValue {
    /// Build a [`WireValue::BigIntLe`] with a declared byte width.
    ///
    /// # Panics
    ///
    /// If `value` does not fit in `width` bytes. Declaring a too-narrow
    /// width is a programming defect, not a runtime condition.
    pub fn big_int_le(value: U256, width: usize) -> WireValue {
        let needed = value.bits().div_ceil(8);
        assert!(
            needed <= width,
            "big int needs {needed} bytes but declared width is {width}",
        );
        WireValue::BigIntLe { value, width }
    }

    /// The exact number of bytes [`Self::write`] produces for this value.
    pub fn size(&self) -> usize {
        match self {
            WireValue::U32(_) => 4,
            WireValue::U64(_) => 8,
            WireValue::Hash(_) => 32,
            WireValue::BigIntLe { width, .. } => *width,
            WireValue::List(children) => children.iter().map(WireValue::size).sum(),
        }
    }

    /// Write this value to `writer`, producing exactly [`Self::size`] bytes.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            WireValue::U32(n) => writer.write_u32::<LittleEndian>(*n),
            WireValue::U64(n) => writer.write_u64::<LittleEndian>(*n),
            WireValue::Hash(bytes) => writer.write_all(bytes),
            WireValue::BigIntLe { value, width } => {
                let mut le_bytes = [0u8; 32];
                value.to_little_endian(&mut le_bytes);
                if *width <= le_bytes.len() {
                    debug_assert!(
                        le_bytes[*width..].iter().all(|&b| b == 0),
                        "big int exceeds its declared width",
                    );
                    writer.write_all(&le_bytes[..*width])
                } else {
                    writer.write_all(&le_bytes)?;
                    // Zero padding out to the declared width.
                    for _ in le_bytes.len()..*width {
                        writer.write_u8(0)?;
                    }
                    Ok(())
                }
            }
            WireValue::List(children) => {
                for child in children {
                    child.write(writer)?;
                }
                Ok(())
            }
        }
    }
}

/// Serialize `value` into a buffer of exactly `value.size()` bytes.
///
/// # Panics
///
/// If the written length differs from the pre-computed size. Over- and
/// under-writes are programming defects in the value's layout, never
/// recoverable runtime conditions.
pub fn serialize(value: &WireValue) -> Vec<u8> {
    let expected_size = value.size();
    let mut data = Vec::with_capacity(expected_size);
    value
        .write(&mut data)
        .expect("writes to a Vec<u8> are infallible");
    assert_eq!(
        data.len(),
        expected_size,
        "wire value wrote {} bytes but size() is {}",
        data.len(),
        expected_size,
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_values_have_exact_sizes() {
        assert_eq!(serialize(&WireValue::U32(0x0102_0304)), vec![4, 3, 2, 1]);
        assert_eq!(
            serialize(&WireValue::U64(1)),
            vec![1, 0, 0, 0, 0, 0, 0, 0],
        );
        assert_eq!(serialize(&WireValue::Hash([7; 32])).len(), 32);
    }

    #[test]
    fn big_int_le_pads_to_declared_width() {
        let value = WireValue::big_int_le(U256::from(0x0a0b_u64), 8);
        assert_eq!(value.size(), 8);
        assert_eq!(serialize(&value), vec![0x0b, 0x0a, 0, 0, 0, 0, 0, 0]);

        let wide = WireValue::big_int_le(U256::from(1_u64), 40);
        assert_eq!(serialize(&wide).len(), 40);

        let full = WireValue::big_int_le(U256::MAX, 32);
        assert_eq!(serialize(&full), vec![0xff; 32]);
    }

    #[test]
    #[should_panic(expected = "declared width")]
    fn big_int_le_rejects_too_narrow_width() {
        WireValue::big_int_le(U256::from(0x0102_03_u64), 2);
    }

    #[test]
    fn list_size_is_sum_of_children_with_no_prefix() {
        let list = WireValue::List(vec![
            WireValue::U32(1),
            WireValue::U64(2),
            WireValue::Hash([0; 32]),
        ]);
        assert_eq!(list.size(), 4 + 8 + 32);

        let data = serialize(&list);
        assert_eq!(data.len(), 44);
        // No implicit count: the first byte is the first child's low byte.
        assert_eq!(data[0], 1);
    }

    #[test]
    fn empty_list_serializes_to_nothing() {
        assert_eq!(serialize(&WireValue::List(vec![])), Vec::<u8>::new());
    }
}
