//! Size computation and the encoder.
//!
//! The wire format writes every byte length *before* the content it
//! measures, so encoding is a strict two-pass affair: the first pass
//! computes the exact encoded size of the message tree (memoizing per
//! taxonomy identity on each message), the second emits bytes into a buffer
//! of exactly that size.  The two passes share one substitution-rule
//! implementation and one length-prefix-width rule; if they ever disagree,
//! the final cursor check fails loudly rather than shipping a corrupt
//! envelope.

use crate::{
  bytes::{
    write_bytes, write_f32, write_f64, write_i16, write_i32, write_i64,
    write_i8, write_u16, write_u32, write_u8,
  },
  message::{taxonomy_key, Envelope, Field, Message},
  modutf8,
  prefix::{length_prefix_width, FieldPrefix},
  taxonomy::{substitute, Taxonomy},
  types::Width,
  value::Value,
  WireErr,
};
use std::sync::Arc;

/// The fixed length of the envelope header.
pub const ENVELOPE_HEADER_LEN: usize = 8;

/// The exact encoded size of one field under `taxonomy`.
///
/// `1 (prefix) + 1 (type id) + ordinal + name + value`, with ordinal and
/// name presence decided by the same substitution rule the writer applies.
pub(crate) fn field_size(
  field: &Field,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<usize, WireErr> {
  let (emit_name, emit_ordinal) = substitute(
    field.name(),
    field.ordinal(),
    taxonomy.map(Arc::as_ref),
  );
  let mut size = 2;
  if emit_ordinal.is_some() {
    size += 2;
  }
  if emit_name {
    // Name length was bounds-checked when the field was built.
    size += 1 + field.name().map(modutf8::encoded_len).unwrap_or(0);
  }
  size += value_size(field, taxonomy)?;
  Ok(size)
}

/// The encoded size of a field's value, including any length prefix.
fn value_size(
  field: &Field,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<usize, WireErr> {
  match field.wire_type().width() {
    Width::Fixed(size) => Ok(size),
    Width::Variable => {
      let payload = payload_len(field.value(), taxonomy)?;
      if payload > u32::MAX as usize {
        return Err(err!(debug, WireErr::ValueTooLong(payload)));
      }
      Ok(length_prefix_width(payload) + payload)
    },
  }
}

/// The payload byte length of a value, sans prefix.
fn payload_len(
  value: &Value,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<usize, WireErr> {
  Ok(match value {
    Value::Indicator => 0,
    Value::Bool(_) | Value::Byte(_) => 1,
    Value::Int16(_) => 2,
    Value::Int32(_) | Value::Float32(_) => 4,
    Value::Int64(_) | Value::Float64(_) => 8,
    Value::Bytes(bytes) => bytes.len(),
    Value::Int16Seq(seq) => seq.len() * 2,
    Value::Int32Seq(seq) => seq.len() * 4,
    Value::Int64Seq(seq) => seq.len() * 8,
    Value::Float32Seq(seq) => seq.len() * 4,
    Value::Float64Seq(seq) => seq.len() * 8,
    Value::Text(text) => modutf8::encoded_len(text),
    Value::Message(message) => message_body_size(message, taxonomy)?,
    Value::Unknown { bytes, .. } => bytes.len(),
  })
}

/// The encoded size of a message's fields (no envelope header), memoized
/// per taxonomy identity.
pub(crate) fn message_body_size(
  message: &Message,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<usize, WireErr> {
  message.cached_size(taxonomy_key(taxonomy), || {
    let mut size = 0;
    for field in message {
      size += field_size(field, taxonomy)?;
    }
    Ok(size)
  })
}

impl Message {
  /// The number of bytes this message's fields occupy on the wire under
  /// `taxonomy`, excluding any envelope header.
  ///
  /// Computed lazily and cached per taxonomy identity; the cache stays
  /// valid because fields cannot be mutated in place.
  pub fn body_size(
    &self,
    taxonomy: Option<&Arc<Taxonomy>>,
  ) -> Result<usize, WireErr> {
    message_body_size(self, taxonomy)
  }
}

impl Envelope {
  /// The total encoded size, header included — the value the header's size
  /// field will carry.
  pub fn encoded_size(
    &self,
    taxonomy: Option<&Arc<Taxonomy>>,
  ) -> Result<usize, WireErr> {
    let size =
      ENVELOPE_HEADER_LEN + message_body_size(self.message(), taxonomy)?;
    if size > u32::MAX as usize {
      return Err(err!(debug, WireErr::EnvelopeSizeOverflow(size)));
    }
    Ok(size)
  }

  /// Encodes the envelope into a fresh buffer.
  ///
  /// `taxonomy` must be the taxonomy published under this envelope's
  /// taxonomy id (or `None`); the encoder substitutes field names through
  /// it but never resolves ids itself.
  ///
  /// ```
  /// use tessera::{Envelope, Message};
  ///
  /// let mut msg = Message::new();
  /// msg.add(Some("boolean"), None, true).unwrap();
  /// let bytes = Envelope::new(msg).encode(None).unwrap();
  /// assert_eq!(bytes.len(), 19);
  /// ```
  pub fn encode(
    &self,
    taxonomy: Option<&Arc<Taxonomy>>,
  ) -> Result<Vec<u8>, WireErr> {
    let size = self.encoded_size(taxonomy)?;
    let mut buf = vec![0u8; size];
    let cursor = &mut 0;
    self.encode_into(&mut buf, cursor, taxonomy)?;

    // Any divergence between sizing and writing corrupts the stream; fail
    // fast instead of returning bad bytes.
    if *cursor != size {
      panic!(
        "envelope sized as {} bytes but wrote {} bytes",
        size, *cursor
      );
    }
    Ok(buf)
  }

  /// Encodes the envelope at `target[*cursor]`.
  pub fn encode_into(
    &self,
    target: &mut [u8],
    cursor: &mut usize,
    taxonomy: Option<&Arc<Taxonomy>>,
  ) -> Result<(), WireErr> {
    let size = self.encoded_size(taxonomy)?;
    let (directives, schema_version, taxonomy_id, message) = self.parts();
    write_u8(directives, target, cursor)?;
    write_u8(schema_version, target, cursor)?;
    write_i16(taxonomy_id, target, cursor)?;
    write_u32(size as u32, target, cursor)?;
    for field in message {
      write_field(field, target, cursor, taxonomy)?;
    }
    Ok(())
  }
}

/// Writes one field: prefix, type id, optional ordinal and name, value.
fn write_field(
  field: &Field,
  target: &mut [u8],
  cursor: &mut usize,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<(), WireErr> {
  let (emit_name, emit_ordinal) = substitute(
    field.name(),
    field.ordinal(),
    taxonomy.map(Arc::as_ref),
  );
  let fixed_width = matches!(field.wire_type().width(), Width::Fixed(_));
  let payload = if fixed_width {
    0
  } else {
    payload_len(field.value(), taxonomy)?
  };

  let prefix = FieldPrefix::compose(
    fixed_width,
    payload,
    emit_ordinal.is_some(),
    emit_name,
  );
  write_u8(prefix, target, cursor)?;
  write_u8(field.wire_type().type_id(), target, cursor)?;
  if let Some(ordinal) = emit_ordinal {
    write_i16(ordinal, target, cursor)?;
  }
  if emit_name {
    if let Some(name) = field.name() {
      write_u8(modutf8::encoded_len(name) as u8, target, cursor)?;
      modutf8::encode(name, target, cursor)?;
    }
  }

  match field.wire_type().width() {
    Width::Fixed(expected) => {
      let start = *cursor;
      write_payload(field.value(), target, cursor, taxonomy)?;
      let actual = *cursor - start;
      if actual != expected {
        return Err(err!(
          error,
          WireErr::FixedWidthMismatch { expected, actual }
        ));
      }
    },
    Width::Variable => {
      match length_prefix_width(payload) {
        0 => {},
        1 => write_u8(payload as u8, target, cursor)?,
        2 => write_u16(payload as u16, target, cursor)?,
        _ => write_u32(u32::try_from(payload)?, target, cursor)?,
      }
      write_payload(field.value(), target, cursor, taxonomy)?;
    },
  }
  Ok(())
}

/// Writes a value's payload bytes (no length prefix).
///
/// The seven scalar kinds take the direct fixed-size path; sequences write
/// their elements big-endian; sub-messages recurse through their fields
/// only, with no nested envelope.
fn write_payload(
  value: &Value,
  target: &mut [u8],
  cursor: &mut usize,
  taxonomy: Option<&Arc<Taxonomy>>,
) -> Result<(), WireErr> {
  match value {
    Value::Indicator => Ok(()),
    Value::Bool(v) => write_u8(u8::from(*v), target, cursor),
    Value::Byte(v) => write_i8(*v, target, cursor),
    Value::Int16(v) => write_i16(*v, target, cursor),
    Value::Int32(v) => write_i32(*v, target, cursor),
    Value::Int64(v) => write_i64(*v, target, cursor),
    Value::Float32(v) => write_f32(*v, target, cursor),
    Value::Float64(v) => write_f64(*v, target, cursor),
    Value::Bytes(bytes) | Value::Unknown { bytes, .. } => {
      write_bytes(bytes, target, cursor)
    },
    Value::Int16Seq(seq) => {
      for v in seq {
        write_i16(*v, target, cursor)?;
      }
      Ok(())
    },
    Value::Int32Seq(seq) => {
      for v in seq {
        write_i32(*v, target, cursor)?;
      }
      Ok(())
    },
    Value::Int64Seq(seq) => {
      for v in seq {
        write_i64(*v, target, cursor)?;
      }
      Ok(())
    },
    Value::Float32Seq(seq) => {
      for v in seq {
        write_f32(*v, target, cursor)?;
      }
      Ok(())
    },
    Value::Float64Seq(seq) => {
      for v in seq {
        write_f64(*v, target, cursor)?;
      }
      Ok(())
    },
    Value::Text(text) => modutf8::encode(text, target, cursor),
    Value::Message(message) => {
      for field in message {
        write_field(field, target, cursor, taxonomy)?;
      }
      Ok(())
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::init_test_logger;

  #[test]
  fn fixture_boolean_int() {
    init_test_logger();
    let mut msg = Message::new();
    msg.add(Some("boolean"), None, true).unwrap();
    msg.add(Some("int"), None, 70_000).unwrap();
    let bytes = Envelope::new(msg).encode(None).unwrap();

    #[rustfmt::skip]
    let expected: [u8; 29] = [
      // envelope: directives, version, taxonomy id, total size (29)
      0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1D,
      // field 1: fixed + named, bool, name "boolean", value true
      0x88, 0x01, 0x07, b'b', b'o', b'o', b'l', b'e', b'a', b'n', 0x01,
      // field 2: fixed + named, int32 (70000 overflows i16), name "int"
      0x88, 0x04, 0x03, b'i', b'n', b't', 0x00, 0x01, 0x11, 0x70,
    ];
    assert_eq!(bytes, expected);
  }

  #[test]
  fn size_matches_bytes_written() {
    init_test_logger();
    let mut inner = Message::new();
    inner.add(Some("text"), None, "héllo\u{0}world").unwrap();
    inner.add(None, Some(3), vec![1i32, -2, 3]).unwrap();

    let mut msg = Message::new();
    msg.add(Some("flag"), None, true).unwrap();
    msg.add(Some("sub"), Some(1), Value::Message(inner)).unwrap();
    msg.add(None, None, vec![0u8; 300]).unwrap();
    msg.add(Some("pi"), None, core::f64::consts::PI).unwrap();

    let envelope = Envelope::new(msg);
    let size = envelope.encoded_size(None).unwrap();
    let bytes = envelope.encode(None).unwrap();
    assert_eq!(bytes.len(), size);
  }

  #[test]
  fn taxonomy_compression_shrinks_field() {
    init_test_logger();
    let tax = Arc::new(Taxonomy::new([(7, "foo")]).unwrap());
    let mut msg = Message::new();
    msg.add(Some("foo"), None, true).unwrap();
    let envelope = Envelope::new(msg).with_taxonomy_id(1);

    let plain = envelope.encode(None).unwrap();
    let compressed = envelope.encode(Some(&tax)).unwrap();
    // name (1 + 3 bytes) traded for an ordinal (2 bytes)
    assert_eq!(plain.len(), compressed.len() + 2);
    // field prefix: fixed + ordinal, no name; then type, ordinal 7, value
    assert_eq!(&compressed[8..], &[0x90, 0x01, 0x00, 0x07, 0x01]);
  }

  #[test]
  fn conflicting_ordinal_emits_both() {
    init_test_logger();
    let tax = Arc::new(Taxonomy::new([(7, "foo")]).unwrap());
    let mut msg = Message::new();
    msg.add(Some("foo"), Some(99), true).unwrap();
    let bytes = Envelope::new(msg).encode(Some(&tax)).unwrap();
    assert_eq!(
      &bytes[8..],
      &[0x98, 0x01, 0x00, 0x63, 0x03, b'f', b'o', b'o', 0x01]
    );
  }

  #[test]
  fn narrowing_is_wire_identical() {
    init_test_logger();
    let mut as_i64 = Message::new();
    as_i64.add(Some("v"), None, 5i64).unwrap();
    let mut as_i8 = Message::new();
    as_i8.add(Some("v"), None, 5i8).unwrap();
    assert_eq!(
      Envelope::new(as_i64).encode(None).unwrap(),
      Envelope::new(as_i8).encode(None).unwrap()
    );
  }

  #[test]
  fn empty_variable_value_has_no_length_prefix() {
    init_test_logger();
    let mut msg = Message::new();
    msg.add(Some("b"), None, Vec::<u8>::new()).unwrap();
    let bytes = Envelope::new(msg).encode(None).unwrap();
    // prefix (variable, size class 0, named), type 6, name, no payload
    assert_eq!(&bytes[8..], &[0x08, 0x06, 0x01, b'b']);
  }

  #[test]
  fn body_size_cached_per_taxonomy() {
    init_test_logger();
    let tax = Arc::new(Taxonomy::new([(7, "foo")]).unwrap());
    let mut msg = Message::new();
    msg.add(Some("foo"), None, 1i8).unwrap();
    let with_tax = msg.body_size(Some(&tax)).unwrap();
    let without = msg.body_size(None).unwrap();
    assert_eq!(without, with_tax + 2); // "foo" + len byte vs. ordinal
    // Repeat lookups hit the cache and agree.
    assert_eq!(msg.body_size(Some(&tax)).unwrap(), with_tax);
    assert_eq!(msg.body_size(None).unwrap(), without);
  }
}
