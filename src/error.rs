//! The error type shared by the codec.

use core::{
  fmt::{Debug, Display, Formatter},
  num::TryFromIntError,
};

/// Various errors associated with encoding and decoding messages.
//
// Note:  Kept as a flat enum with small variants; this type is returned from
// the innermost codec loops and its size shows up in benchmarks.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireErr {
  /// A taxonomy was constructed with the same name bound to two ordinals.
  ///
  /// The payload is the ordinal at which the collision was detected.
  TaxonomyNameCollision(i16),

  /// The input ended before a complete value could be read.
  TruncatedInput {
    needed:    usize,
    available: usize,
  },

  /// A write would have run past the end of the target buffer.
  ///
  /// Encoding targets are sized up front, so hitting this indicates a defect
  /// in a size calculation rather than bad input.
  OutOfBounds {
    needed:    usize,
    available: usize,
  },

  /// The bytes consumed reading a message did not match the size its
  /// envelope (or parent field) declared.
  SizeMismatch {
    declared: usize,
    consumed: usize,
  },

  /// A field prefix byte had reserved bits set.
  InvalidPrefix(u8),

  /// A text value or field name was not well-formed modified UTF-8.
  MalformedText,

  /// A variable-width sequence's payload length was not a multiple of its
  /// element size.
  SequenceLength {
    type_id: u8,
    len:     usize,
  },

  /// A field carried a type id with the fixed-width flag set, but the type
  /// is not in the local registry, so its width cannot be known.
  UnknownFixedWidthType(u8),

  /// A field name was longer than 255 bytes of modified UTF-8.
  NameTooLong(usize),

  /// An attempt was made to add a field to a message already holding the
  /// maximum of 32,767 fields.
  TooManyFields(usize),

  /// A value's byte length did not match its fixed-width type descriptor.
  FixedWidthMismatch {
    expected: usize,
    actual:   usize,
  },

  /// A value's kind cannot be carried by the supplied type descriptor.
  ValueKindMismatch(u8),

  /// A variable-width value was longer than `u32::MAX` bytes.
  ValueTooLong(usize),

  /// A message's total encoded size exceeds the `u32` envelope size field.
  EnvelopeSizeOverflow(usize),

  /// An overflow occurred during a checked integer type conversion.
  IntConversionOverflow,

  Infallible,
}

impl Display for WireErr {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    Debug::fmt(self, f)
  }
}

impl std::error::Error for WireErr {}

impl From<TryFromIntError> for WireErr {
  fn from(_value: TryFromIntError) -> Self {
    WireErr::IntConversionOverflow
  }
}

impl From<core::convert::Infallible> for WireErr {
  fn from(_value: core::convert::Infallible) -> Self {
    WireErr::Infallible
  }
}
