//! The decoder.
//!
//! Decoding walks the byte stream field by field, resolving each type id
//! through a [`TypeRegistry`].  Ids the registry has never seen are kept as
//! [`Value::Unknown`] payloads so the message re-encodes byte-identically;
//! only an unknown id whose prefix claims a fixed width is fatal, because
//! nothing on the wire says how many bytes it spans.

use crate::{
  bytes::{
    read_bytes, read_f32, read_f64, read_i16, read_i32, read_i64, read_i8,
    read_u16, read_u32, read_u8,
  },
  encode::ENVELOPE_HEADER_LEN,
  message::{Envelope, Field, Message},
  modutf8,
  prefix::FieldPrefix,
  types::{TypeRegistry, ValueKind, Width, WireType},
  value::Value,
  WireErr,
};
use std::sync::Arc;

impl Envelope {
  /// Decodes an envelope from `source`, resolving types through the global
  /// registry.
  ///
  /// Returns the envelope and the number of bytes consumed, so callers
  /// framing several envelopes from one buffer can advance past each
  /// without recomputing its length.
  pub fn decode(source: &[u8]) -> Result<(Envelope, usize), WireErr> {
    Self::decode_with(source, TypeRegistry::global())
  }

  /// Decodes an envelope, resolving types through `registry`.
  ///
  /// A nonzero declared size bounds the read; bytes past it are left
  /// untouched.  A declared size of zero reads to the end of `source`.
  pub fn decode_with(
    source: &[u8],
    registry: &TypeRegistry,
  ) -> Result<(Envelope, usize), WireErr> {
    let cursor = &mut 0usize;
    let directives = read_u8(source, cursor)?;
    let schema_version = read_u8(source, cursor)?;
    let taxonomy_id = read_i16(source, cursor)?;
    let declared = read_u32(source, cursor)? as usize;

    let end = match declared {
      0 => source.len(),
      d if d < ENVELOPE_HEADER_LEN => {
        return Err(err!(
          debug,
          WireErr::SizeMismatch {
            declared: d,
            consumed: ENVELOPE_HEADER_LEN,
          }
        ))
      },
      d if d > source.len() => {
        return Err(err!(
          trace,
          WireErr::TruncatedInput { needed: d, available: source.len() }
        ))
      },
      d => d,
    };

    let message = read_fields(&source[..end], cursor, registry)?;
    let envelope = Envelope::new(message)
      .with_directives(directives)
      .with_schema_version(schema_version)
      .with_taxonomy_id(taxonomy_id);
    Ok((envelope, *cursor))
  }
}

/// Reads fields from `source[*cursor..]` until `source` is exhausted.
fn read_fields(
  source: &[u8],
  cursor: &mut usize,
  registry: &TypeRegistry,
) -> Result<Message, WireErr> {
  let mut message = Message::new();
  while *cursor < source.len() {
    message.push(read_field(source, cursor, registry)?)?;
  }
  Ok(message)
}

/// Reads one field: prefix, type id, optional ordinal and name, value.
fn read_field(
  source: &[u8],
  cursor: &mut usize,
  registry: &TypeRegistry,
) -> Result<Field, WireErr> {
  let prefix_byte = read_u8(source, cursor)?;
  let prefix = FieldPrefix::decode(prefix_byte)?;
  let type_id = read_u8(source, cursor)?;

  let ty = match registry.by_id(type_id) {
    Some(ty) => ty,
    None if prefix.fixed_width => {
      // A fixed-width value with no registered descriptor has no
      // recoverable length.
      return Err(err!(warn, WireErr::UnknownFixedWidthType(type_id)));
    },
    None => registry.unknown_type(type_id),
  };

  let ordinal = if prefix.has_ordinal {
    Some(read_i16(source, cursor)?)
  } else {
    None
  };
  let name = if prefix.has_name {
    let len = read_u8(source, cursor)? as usize;
    Some(modutf8::decode(read_bytes(source, cursor, len)?)?)
  } else {
    None
  };

  let payload_len = if prefix.fixed_width {
    match ty.width() {
      Width::Fixed(len) => len,
      // A registered variable-width type never sets the fixed flag.
      Width::Variable => {
        return Err(err!(debug, WireErr::InvalidPrefix(prefix_byte)))
      },
    }
  } else {
    match prefix.length_prefix_bytes {
      0 => 0,
      1 => read_u8(source, cursor)? as usize,
      2 => read_u16(source, cursor)? as usize,
      _ => read_u32(source, cursor)? as usize,
    }
  };

  let value = read_value(&ty, source, cursor, payload_len, registry)?;
  Field::with_type(ty, name.as_deref(), ordinal, value)
}

/// Reads a value of `payload_len` bytes according to the type's kind.
fn read_value(
  ty: &Arc<WireType>,
  source: &[u8],
  cursor: &mut usize,
  payload_len: usize,
  registry: &TypeRegistry,
) -> Result<Value, WireErr> {
  Ok(match ty.kind() {
    ValueKind::Indicator => Value::Indicator,
    ValueKind::Bool => Value::Bool(read_u8(source, cursor)? != 0),
    ValueKind::Byte => Value::Byte(read_i8(source, cursor)?),
    ValueKind::Int16 => Value::Int16(read_i16(source, cursor)?),
    ValueKind::Int32 => Value::Int32(read_i32(source, cursor)?),
    ValueKind::Int64 => Value::Int64(read_i64(source, cursor)?),
    ValueKind::Float32 => Value::Float32(read_f32(source, cursor)?),
    ValueKind::Float64 => Value::Float64(read_f64(source, cursor)?),
    ValueKind::ByteSeq => {
      Value::Bytes(read_bytes(source, cursor, payload_len)?.to_vec())
    },
    ValueKind::Int16Seq => {
      Value::Int16Seq(read_seq(ty, source, cursor, payload_len, read_i16)?)
    },
    ValueKind::Int32Seq => {
      Value::Int32Seq(read_seq(ty, source, cursor, payload_len, read_i32)?)
    },
    ValueKind::Int64Seq => {
      Value::Int64Seq(read_seq(ty, source, cursor, payload_len, read_i64)?)
    },
    ValueKind::Float32Seq => {
      Value::Float32Seq(read_seq(ty, source, cursor, payload_len, read_f32)?)
    },
    ValueKind::Float64Seq => {
      Value::Float64Seq(read_seq(ty, source, cursor, payload_len, read_f64)?)
    },
    ValueKind::Text => {
      Value::Text(modutf8::decode(read_bytes(source, cursor, payload_len)?)?)
    },
    ValueKind::Message => {
      let bytes = read_bytes(source, cursor, payload_len)?;
      let inner = &mut 0usize;
      Value::Message(read_fields(bytes, inner, registry)?)
    },
    ValueKind::Unknown => Value::Unknown {
      type_id: ty.type_id(),
      bytes:   read_bytes(source, cursor, payload_len)?.to_vec(),
    },
  })
}

/// Reads `payload_len` bytes as a sequence of big-endian elements, failing
/// if the length is not a whole number of elements.
fn read_seq<T>(
  ty: &Arc<WireType>,
  source: &[u8],
  cursor: &mut usize,
  payload_len: usize,
  read_one: fn(&[u8], &mut usize) -> Result<T, WireErr>,
) -> Result<Vec<T>, WireErr> {
  let unit = core::mem::size_of::<T>();
  if payload_len % unit != 0 {
    return Err(err!(
      debug,
      WireErr::SequenceLength { type_id: ty.type_id(), len: payload_len }
    ));
  }
  let end = cursor
    .checked_add(payload_len)
    .ok_or_else(|| err!(error, WireErr::IntConversionOverflow))?;
  let mut seq = Vec::with_capacity(payload_len / unit);
  while *cursor < end {
    seq.push(read_one(source, cursor)?);
  }
  Ok(seq)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{types::ids, util::init_test_logger};

  #[test]
  fn fixture_boolean_int() {
    init_test_logger();
    #[rustfmt::skip]
    let bytes: [u8; 29] = [
      0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1D,
      0x88, 0x01, 0x07, b'b', b'o', b'o', b'l', b'e', b'a', b'n', 0x01,
      0x88, 0x04, 0x03, b'i', b'n', b't', 0x00, 0x01, 0x11, 0x70,
    ];
    let (envelope, consumed) = Envelope::decode(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    let msg = envelope.message();
    assert_eq!(msg.len(), 2);
    assert_eq!(msg.get("boolean", None).unwrap().value(), &Value::Bool(true));
    assert_eq!(msg.get("int", None).unwrap().value(), &Value::Int32(70_000));
  }

  #[test]
  fn zero_declared_size_reads_to_end() {
    init_test_logger();
    // Same fixture with the size field zeroed out.
    let mut bytes = vec![0u8; 8];
    bytes.extend_from_slice(&[0x80, 0x01, 0x01]);
    let (envelope, consumed) = Envelope::decode(&bytes).unwrap();
    assert_eq!(envelope.message().len(), 1);
    assert_eq!(consumed, bytes.len());
  }

  #[test]
  fn trailing_bytes_past_declared_size_ignored() {
    init_test_logger();
    let mut bytes = vec![0, 0, 0, 0, 0, 0, 0, 11, 0x80, 0x01, 0x01];
    bytes.extend_from_slice(&[0xFF; 4]);
    let (envelope, consumed) = Envelope::decode(&bytes).unwrap();
    assert_eq!(envelope.message().len(), 1);
    // The declared size, not the buffer length, bounds the read.
    assert_eq!(consumed, 11);
  }

  #[test]
  fn truncated_input_rejected() {
    init_test_logger();
    let bytes = [0u8, 0, 0, 0, 0, 0, 0, 29, 0x88, 0x01];
    assert!(matches!(
      Envelope::decode(&bytes),
      Err(WireErr::TruncatedInput { .. })
    ));
  }

  #[test]
  fn declared_size_below_header_rejected() {
    init_test_logger();
    let bytes = [0u8, 0, 0, 0, 0, 0, 0, 4];
    assert!(matches!(
      Envelope::decode(&bytes),
      Err(WireErr::SizeMismatch { declared: 4, .. })
    ));
  }

  #[test]
  fn unknown_variable_type_preserved() {
    init_test_logger();
    // type id 200, variable width, 1-byte length prefix, 3 payload bytes
    let bytes =
      [0u8, 0, 0, 0, 0, 0, 0, 14, 0x20, 200, 0x03, 0xAA, 0xBB, 0xCC];
    let (envelope, _) = Envelope::decode(&bytes).unwrap();
    let field = &envelope.message().fields()[0];
    assert_eq!(
      field.value(),
      &Value::Unknown { type_id: 200, bytes: vec![0xAA, 0xBB, 0xCC] }
    );
    // Round-trips byte-identically.
    assert_eq!(envelope.encode(None).unwrap(), bytes);
  }

  #[test]
  fn unknown_fixed_width_type_rejected() {
    init_test_logger();
    let bytes = [0u8, 0, 0, 0, 0, 0, 0, 11, 0x80, 201, 0x00];
    assert!(matches!(
      Envelope::decode(&bytes),
      Err(WireErr::UnknownFixedWidthType(201))
    ));
  }

  #[test]
  fn ragged_sequence_rejected() {
    init_test_logger();
    // int32 sequence with a 5-byte payload
    let bytes = [
      0u8, 0, 0, 0, 0, 0, 0, 16, 0x20, ids::INT32_SEQ, 0x05, 0, 0, 0, 1, 2,
    ];
    assert!(matches!(
      Envelope::decode(&bytes),
      Err(WireErr::SequenceLength { len: 5, .. })
    ));
  }

  #[test]
  fn reserved_prefix_bits_rejected() {
    init_test_logger();
    let bytes = [0u8, 0, 0, 0, 0, 0, 0, 11, 0x87, 0x01, 0x01];
    assert!(matches!(
      Envelope::decode(&bytes),
      Err(WireErr::InvalidPrefix(0x87))
    ));
  }

  #[test]
  fn nested_message_consumes_exact_length() {
    init_test_logger();
    // outer: sub-message (type 15), variable, 1-byte length prefix of 4,
    // holding one indicator field with ordinal 1
    #[rustfmt::skip]
    let bytes = [
      0u8, 0, 0, 0, 0, 0, 0, 15,
      0x20, ids::MESSAGE, 0x04,
      0x90, ids::INDICATOR, 0x00, 0x01,
    ];
    let (envelope, _) = Envelope::decode(&bytes).unwrap();
    let field = &envelope.message().fields()[0];
    match field.value() {
      Value::Message(inner) => {
        assert_eq!(inner.len(), 1);
        assert_eq!(inner.get_ordinal(1).unwrap().value(), &Value::Indicator);
      },
      other => panic!("expected sub-message, got {:?}", other),
    }
  }
}
