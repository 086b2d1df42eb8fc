//! Bit packing and unpacking for the one-byte field prefix.

use crate::WireErr;

/// The decoded flags of a field's one-byte prefix.
///
/// Layout, MSB to LSB:
///
/// ```text
/// | fixed:1 | len prefix class:2 | ordinal:1 | name:1 | reserved:3 (zero) |
/// ```
///
/// The two size-class bits express four distinct length-prefix widths:
/// `00` none, `01` one byte, `10` two bytes, and `11` four bytes (code 3
/// means four bytes, not three).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FieldPrefix {
  /// The value's width is fixed and known from its type descriptor.
  pub fixed_width: bool,
  /// A two-byte ordinal follows the type id.
  pub has_ordinal: bool,
  /// A length-prefixed name follows the ordinal (if any).
  pub has_name: bool,
  /// Width of the value's length prefix: 0, 1, 2 or 4 bytes.
  pub length_prefix_bytes: usize,
}

impl FieldPrefix {
  const FIXED_WIDTH: u8 = 0b1000_0000;
  const SIZE_CLASS: u8 = 0b0110_0000;
  const HAS_ORDINAL: u8 = 0b0001_0000;
  const HAS_NAME: u8 = 0b0000_1000;
  const RESERVED: u8 = 0b0000_0111;

  /// Composes a prefix byte.
  ///
  /// For variable-width fields, the length-prefix size class is selected by
  /// the magnitude of `variable_size`; fixed-width fields carry class `00`.
  ///
  /// ```
  /// use tessera::FieldPrefix;
  ///
  /// // Fixed-width, named field (the common case for typed scalars).
  /// assert_eq!(FieldPrefix::compose(true, 0, false, true), 0x88);
  /// // Variable-width, 300-byte value: two-byte length prefix.
  /// assert_eq!(FieldPrefix::compose(false, 300, true, false), 0x50);
  /// ```
  pub fn compose(
    fixed_width: bool,
    variable_size: usize,
    has_ordinal: bool,
    has_name: bool,
  ) -> u8 {
    let mut byte = 0u8;
    if fixed_width {
      byte |= Self::FIXED_WIDTH;
    } else {
      let class = match length_prefix_width(variable_size) {
        0 => 0u8,
        1 => 1,
        2 => 2,
        _ => 3,
      };
      byte |= class << 5;
    }
    if has_ordinal {
      byte |= Self::HAS_ORDINAL;
    }
    if has_name {
      byte |= Self::HAS_NAME;
    }
    byte
  }

  /// Unpacks a prefix byte, rejecting nonzero reserved bits.
  pub fn decode(byte: u8) -> Result<FieldPrefix, WireErr> {
    if byte & Self::RESERVED != 0 {
      return Err(err!(trace, WireErr::InvalidPrefix(byte)));
    }
    let class = (byte & Self::SIZE_CLASS) >> 5;
    Ok(FieldPrefix {
      fixed_width: byte & Self::FIXED_WIDTH != 0,
      has_ordinal: byte & Self::HAS_ORDINAL != 0,
      has_name: byte & Self::HAS_NAME != 0,
      length_prefix_bytes: match class {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 4,
      },
    })
  }
}

/// The width in bytes of the length prefix for a variable value of
/// `payload_len` bytes: zero-length values carry no prefix, then one, two,
/// or four bytes by magnitude.
///
/// The two-byte class tops out at `i16::MAX`, not `u16::MAX`.
#[inline(always)]
pub(crate) fn length_prefix_width(payload_len: usize) -> usize {
  if payload_len == 0 {
    0
  } else if payload_len <= 255 {
    1
  } else if payload_len <= 32_767 {
    2
  } else {
    4
  }
}
