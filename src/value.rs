//! The closed set of values a field can carry.

use crate::{
  message::Message,
  types::ValueKind,
};
use core::fmt::{Debug, Formatter};

/// A typed field value.
///
/// One variant per standard value representation, plus [`Value::Unknown`]
/// for payloads whose type id the local registry does not recognize.
#[derive(Clone, PartialEq)]
pub enum Value {
  /// A zero-byte presence marker.
  Indicator,
  Bool(bool),
  Byte(i8),
  Int16(i16),
  Int32(i32),
  Int64(i64),
  Float32(f32),
  Float64(f64),
  /// A byte sequence; encodes fixed-width when its length matches one of
  /// the standard sizes and the type was inferred.
  Bytes(Vec<u8>),
  Int16Seq(Vec<i16>),
  Int32Seq(Vec<i32>),
  Int64Seq(Vec<i64>),
  Float32Seq(Vec<f32>),
  Float64Seq(Vec<f64>),
  Text(String),
  /// An embedded sub-message.  Encoded recursively, with no envelope.
  Message(Message),
  /// The raw payload of an unrecognized variable-width type, preserved for
  /// lossless re-encoding.
  Unknown {
    type_id: u8,
    bytes:   Vec<u8>,
  },
}

impl Value {
  /// The corresponding [`ValueKind`] tag.
  pub fn kind(&self) -> ValueKind {
    match self {
      Value::Indicator => ValueKind::Indicator,
      Value::Bool(_) => ValueKind::Bool,
      Value::Byte(_) => ValueKind::Byte,
      Value::Int16(_) => ValueKind::Int16,
      Value::Int32(_) => ValueKind::Int32,
      Value::Int64(_) => ValueKind::Int64,
      Value::Float32(_) => ValueKind::Float32,
      Value::Float64(_) => ValueKind::Float64,
      Value::Bytes(_) => ValueKind::ByteSeq,
      Value::Int16Seq(_) => ValueKind::Int16Seq,
      Value::Int32Seq(_) => ValueKind::Int32Seq,
      Value::Int64Seq(_) => ValueKind::Int64Seq,
      Value::Float32Seq(_) => ValueKind::Float32Seq,
      Value::Float64Seq(_) => ValueKind::Float64Seq,
      Value::Text(_) => ValueKind::Text,
      Value::Message(_) => ValueKind::Message,
      Value::Unknown { .. } => ValueKind::Unknown,
    }
  }

  /// Rewrites an integral value into the smallest of `{Byte, Int16, Int32,
  /// Int64}` that represents it losslessly; all other variants pass through
  /// untouched.
  ///
  /// Type inference applies this before selecting a descriptor, so adding
  /// `5i64` without an explicit type produces wire bytes identical to adding
  /// `5i8`.
  pub fn narrowed(self) -> Value {
    match self {
      Value::Int16(v) => narrow_integer(i64::from(v)),
      Value::Int32(v) => narrow_integer(i64::from(v)),
      Value::Int64(v) => narrow_integer(v),
      other => other,
    }
  }
}

fn narrow_integer(v: i64) -> Value {
  if let Ok(v) = i8::try_from(v) {
    Value::Byte(v)
  } else if let Ok(v) = i16::try_from(v) {
    Value::Int16(v)
  } else if let Ok(v) = i32::try_from(v) {
    Value::Int32(v)
  } else {
    Value::Int64(v)
  }
}

impl Debug for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    match self {
      Value::Indicator => write!(f, "Indicator"),
      Value::Bool(v) => Debug::fmt(v, f),
      Value::Byte(v) => write!(f, "{}i8", v),
      Value::Int16(v) => write!(f, "{}i16", v),
      Value::Int32(v) => write!(f, "{}i32", v),
      Value::Int64(v) => write!(f, "{}i64", v),
      Value::Float32(v) => write!(f, "{}f32", v),
      Value::Float64(v) => write!(f, "{}f64", v),
      Value::Bytes(v) => write!(f, "Bytes(len {})", v.len()),
      Value::Int16Seq(v) => Debug::fmt(v, f),
      Value::Int32Seq(v) => Debug::fmt(v, f),
      Value::Int64Seq(v) => Debug::fmt(v, f),
      Value::Float32Seq(v) => Debug::fmt(v, f),
      Value::Float64Seq(v) => Debug::fmt(v, f),
      Value::Text(v) => Debug::fmt(v, f),
      Value::Message(v) => Debug::fmt(v, f),
      Value::Unknown { type_id, bytes } => {
        write!(f, "Unknown(type {}, {} bytes)", type_id, bytes.len())
      },
    }
  }
}

macro_rules! gen_value_from {
  ($native:ty, $variant:ident) => {
    impl From<$native> for Value {
      fn from(value: $native) -> Value {
        Value::$variant(value)
      }
    }
  };
}

gen_value_from!(bool, Bool);
gen_value_from!(i8, Byte);
gen_value_from!(i16, Int16);
gen_value_from!(i32, Int32);
gen_value_from!(i64, Int64);
gen_value_from!(f32, Float32);
gen_value_from!(f64, Float64);
gen_value_from!(Vec<u8>, Bytes);
gen_value_from!(Vec<i16>, Int16Seq);
gen_value_from!(Vec<i32>, Int32Seq);
gen_value_from!(Vec<i64>, Int64Seq);
gen_value_from!(Vec<f32>, Float32Seq);
gen_value_from!(Vec<f64>, Float64Seq);
gen_value_from!(String, Text);
gen_value_from!(Message, Message);

impl From<&str> for Value {
  fn from(value: &str) -> Value {
    Value::Text(value.into())
  }
}

impl From<&[u8]> for Value {
  fn from(value: &[u8]) -> Value {
    Value::Bytes(value.into())
  }
}
