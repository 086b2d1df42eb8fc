//! Fields, messages, and the envelope.
//!
//! A message is an ordered sequence of fields; order is part of the wire
//! contract and duplicates (of names or ordinals) are allowed.  Messages are
//! built once and then treated as immutable: the only mutating operation is
//! appending a field, which drops any cached sizes, and there is no `&mut`
//! access to stored fields or nested sub-messages.  That discipline is what
//! makes the lazily computed per-taxonomy size cache sound.

use crate::{
  modutf8,
  taxonomy::Taxonomy,
  types::{TypeRegistry, Width, WireType},
  value::Value,
  WireErr,
};
use core::fmt::{Debug, Formatter};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, PoisonError};

/// The most fields a single message may hold.
pub const MAX_FIELDS: usize = 32_767;

/// The longest permitted field name, in modified UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 255;

/// One typed, optionally named and/or numbered entry in a message.
///
/// Name and ordinal are independent: a field may carry both, either, or
/// neither.  Fields are validated on construction, so an existing `Field`
/// always encodes cleanly.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
  ty:      Arc<WireType>,
  value:   Value,
  name:    Option<String>,
  ordinal: Option<i16>,
}

impl Field {
  /// Creates a field, inferring the type from the value via the global
  /// registry.
  ///
  /// Integral values are narrowed to the smallest representation first, so
  /// `Field::new(None, None, 5i64)` and `Field::new(None, None, 5i8)` are
  /// indistinguishable on the wire.
  pub fn new<V>(
    name: Option<&str>,
    ordinal: Option<i16>,
    value: V,
  ) -> Result<Field, WireErr>
  where
    V: Into<Value>,
  {
    Self::with_registry(TypeRegistry::global(), name, ordinal, value)
  }

  /// Like [`Field::new`], but inferring through a caller-owned registry.
  pub fn with_registry<V>(
    registry: &TypeRegistry,
    name: Option<&str>,
    ordinal: Option<i16>,
    value: V,
  ) -> Result<Field, WireErr>
  where
    V: Into<Value>,
  {
    let value = value.into().narrowed();
    let ty = registry.type_for_value(&value)?;
    Self::with_type(ty, name, ordinal, value)
  }

  /// Creates a field with an explicit type descriptor.
  ///
  /// The value must match the descriptor's kind, and for fixed-width byte
  /// sequences, its exact length; violations are caller bugs reported
  /// before any bytes are emitted.
  pub fn with_type(
    ty: Arc<WireType>,
    name: Option<&str>,
    ordinal: Option<i16>,
    value: Value,
  ) -> Result<Field, WireErr> {
    if let Some(name) = name {
      let len = modutf8::encoded_len(name);
      if len > MAX_NAME_LEN {
        return Err(err!(debug, WireErr::NameTooLong(len)));
      }
    }
    if value.kind() != ty.kind() {
      return Err(err!(debug, WireErr::ValueKindMismatch(ty.type_id())));
    }
    if let Value::Unknown { type_id, .. } = &value {
      if *type_id != ty.type_id() {
        return Err(err!(debug, WireErr::ValueKindMismatch(ty.type_id())));
      }
    }
    if let (Width::Fixed(expected), Value::Bytes(bytes)) =
      (ty.width(), &value)
    {
      if bytes.len() != expected {
        return Err(err!(
          debug,
          WireErr::FixedWidthMismatch {
            expected,
            actual: bytes.len(),
          }
        ));
      }
    }
    Ok(Field {
      ty,
      value,
      name: name.map(str::to_owned),
      ordinal,
    })
  }

  /// The field's type descriptor.
  #[inline(always)]
  pub fn wire_type(&self) -> &Arc<WireType> {
    &self.ty
  }

  /// The field's value.
  #[inline(always)]
  pub fn value(&self) -> &Value {
    &self.value
  }

  /// The declared name, before any taxonomy substitution.
  #[inline(always)]
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// The declared ordinal, before any taxonomy substitution.
  #[inline(always)]
  pub fn ordinal(&self) -> Option<i16> {
    self.ordinal
  }
}

/// An ordered sequence of [`Field`]s.
///
/// ```
/// use tessera::{Message, Value};
///
/// let mut msg = Message::new();
/// msg.add(Some("boolean"), None, true).unwrap();
/// msg.add(Some("int"), None, 70_000).unwrap();
/// assert_eq!(msg.len(), 2);
/// assert_eq!(msg.get("int", None).map(|f| f.value()),
///            Some(&Value::Int32(70_000)));
/// ```
#[derive(Default)]
pub struct Message {
  fields: Vec<Field>,
  /// Lazily computed encoded body sizes, one slot per taxonomy identity
  /// (`Arc` address; `0` means "no taxonomy").  Cleared on mutation.
  size_cache: Mutex<SmallVec<(usize, usize), 2>>,
}

impl Message {
  /// An empty message.
  pub fn new() -> Message {
    Message::default()
  }

  /// The number of fields.
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  /// Returns `true` if the message holds no fields.
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// The fields, in insertion order.
  pub fn fields(&self) -> &[Field] {
    &self.fields
  }

  /// Iterates the fields in insertion order.
  pub fn iter(&self) -> core::slice::Iter<'_, Field> {
    self.fields.iter()
  }

  /// Appends a field, in order.
  ///
  /// Fails with [`WireErr::TooManyFields`] once the message already holds
  /// [`MAX_FIELDS`] fields.  Invalidates any cached sizes.
  pub fn push(&mut self, field: Field) -> Result<(), WireErr> {
    if self.fields.len() >= MAX_FIELDS {
      return Err(err!(debug, WireErr::TooManyFields(self.fields.len())));
    }
    self.lock_cache().clear();
    self.fields.push(field);
    Ok(())
  }

  /// Builds a field from a bare value (type inferred via the global
  /// registry) and appends it.
  pub fn add<V>(
    &mut self,
    name: Option<&str>,
    ordinal: Option<i16>,
    value: V,
  ) -> Result<(), WireErr>
  where
    V: Into<Value>,
  {
    self.push(Field::new(name, ordinal, value)?)
  }

  /// Builds a field with an explicit type descriptor and appends it.
  pub fn add_typed(
    &mut self,
    ty: Arc<WireType>,
    name: Option<&str>,
    ordinal: Option<i16>,
    value: Value,
  ) -> Result<(), WireErr> {
    self.push(Field::with_type(ty, name, ordinal, value)?)
  }

  /// Finds the first field matching `name`.
  ///
  /// A field matches if it carries the name verbatim, or — when a taxonomy
  /// is supplied — if it is ordinal-only and the taxonomy binds `name` to
  /// that ordinal.  This is how names are recovered from a decoded,
  /// taxonomy-compressed message.
  pub fn get(
    &self,
    name: &str,
    taxonomy: Option<&Taxonomy>,
  ) -> Option<&Field> {
    let mapped = taxonomy.and_then(|tax| tax.ordinal_for(name));
    self.fields.iter().find(|field| match field.name() {
      Some(field_name) => field_name == name,
      None => field.ordinal().is_some() && field.ordinal() == mapped,
    })
  }

  /// Finds the first field carrying `ordinal`.
  pub fn get_ordinal(&self, ordinal: i16) -> Option<&Field> {
    self
      .fields
      .iter()
      .find(|field| field.ordinal() == Some(ordinal))
  }

  /// Returns the cached encoded body size for a taxonomy identity, running
  /// `compute` on a miss.  Racing computations are pure and idempotent; the
  /// later write simply wins.
  pub(crate) fn cached_size<F>(
    &self,
    key: usize,
    compute: F,
  ) -> Result<usize, WireErr>
  where
    F: FnOnce() -> Result<usize, WireErr>,
  {
    if let Some((_, size)) =
      self.lock_cache().iter().find(|(slot, _)| *slot == key)
    {
      return Ok(*size);
    }
    let size = compute()?;
    let mut cache = self.lock_cache();
    if !cache.iter().any(|(slot, _)| *slot == key) {
      cache.push((key, size));
    }
    Ok(size)
  }

  fn lock_cache(
    &self,
  ) -> std::sync::MutexGuard<'_, SmallVec<(usize, usize), 2>> {
    // The lock is only held for a probe or a push; a poisoned cache is
    // still structurally sound.
    self.size_cache.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Clone for Message {
  fn clone(&self) -> Self {
    Message {
      fields:     self.fields.clone(),
      // Fields are identical, so the cached sizes still hold.
      size_cache: Mutex::new(self.lock_cache().clone()),
    }
  }
}

impl PartialEq for Message {
  fn eq(&self, other: &Self) -> bool {
    self.fields == other.fields
  }
}

impl Debug for Message {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    f.debug_list().entries(self.fields.iter()).finish()
  }
}

impl<'a> IntoIterator for &'a Message {
  type IntoIter = core::slice::Iter<'a, Field>;
  type Item = &'a Field;

  fn into_iter(self) -> Self::IntoIter {
    self.fields.iter()
  }
}

/// The top-level wrapper around exactly one message.
///
/// Carries the processing directives, schema version, and taxonomy id found
/// in the 8-byte wire header.  Sub-messages never have an envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
  directives:     u8,
  schema_version: u8,
  taxonomy_id:    i16,
  message:        Message,
}

impl Envelope {
  /// Wraps `message` with zeroed directives, version, and taxonomy id.
  pub fn new(message: Message) -> Envelope {
    Envelope {
      directives: 0,
      schema_version: 0,
      taxonomy_id: 0,
      message,
    }
  }

  /// Sets the taxonomy id advertised in the header.
  pub fn with_taxonomy_id(mut self, taxonomy_id: i16) -> Envelope {
    self.taxonomy_id = taxonomy_id;
    self
  }

  /// Sets the schema version advertised in the header.
  pub fn with_schema_version(mut self, schema_version: u8) -> Envelope {
    self.schema_version = schema_version;
    self
  }

  /// Sets the processing-directives byte.
  pub fn with_directives(mut self, directives: u8) -> Envelope {
    self.directives = directives;
    self
  }

  /// The processing-directives byte.
  pub fn directives(&self) -> u8 {
    self.directives
  }

  /// The schema version.
  pub fn schema_version(&self) -> u8 {
    self.schema_version
  }

  /// The id of the taxonomy the message was (or will be) encoded under.
  pub fn taxonomy_id(&self) -> i16 {
    self.taxonomy_id
  }

  /// The wrapped message.
  pub fn message(&self) -> &Message {
    &self.message
  }

  /// Unwraps the message.
  pub fn into_message(self) -> Message {
    self.message
  }

  pub(crate) fn parts(&self) -> (u8, u8, i16, &Message) {
    (
      self.directives,
      self.schema_version,
      self.taxonomy_id,
      &self.message,
    )
  }
}

/// Cache key for a taxonomy handle; identity, not structure.
#[inline(always)]
pub(crate) fn taxonomy_key(taxonomy: Option<&Arc<Taxonomy>>) -> usize {
  taxonomy.map(|tax| Arc::as_ptr(tax) as usize).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ids;

  #[test]
  fn add_narrows_and_infers() {
    let mut msg = Message::new();
    msg.add(Some("small"), None, 5i64).unwrap();
    msg.add(Some("big"), None, 70_000i64).unwrap();
    let small = msg.get("small", None).unwrap();
    assert_eq!(small.wire_type().type_id(), ids::BYTE);
    assert_eq!(small.value(), &Value::Byte(5));
    let big = msg.get("big", None).unwrap();
    assert_eq!(big.wire_type().type_id(), ids::INT32);
  }

  #[test]
  fn duplicate_names_preserved_in_order() {
    let mut msg = Message::new();
    msg.add(Some("x"), None, 1i8).unwrap();
    msg.add(Some("x"), None, 2i8).unwrap();
    assert_eq!(msg.len(), 2);
    // get() returns the first.
    assert_eq!(msg.get("x", None).unwrap().value(), &Value::Byte(1));
  }

  #[test]
  fn oversized_name_rejected() {
    let long = "n".repeat(256);
    let result = Field::new(Some(&long), None, true);
    assert_eq!(result.unwrap_err(), WireErr::NameTooLong(256));
    // 255 is fine.
    let ok = "n".repeat(255);
    assert!(Field::new(Some(&ok), None, true).is_ok());
  }

  #[test]
  fn name_limit_counts_encoded_bytes() {
    // 128 two-byte characters encode to 256 bytes: over the limit even
    // though the character count is not.
    let name = "é".repeat(128);
    let result = Field::new(Some(&name), None, true);
    assert_eq!(result.unwrap_err(), WireErr::NameTooLong(256));
  }

  #[test]
  fn fixed_width_mismatch_rejected() {
    let ty = TypeRegistry::global().by_id(ids::FIXED_BYTES_16).unwrap();
    let result =
      Field::with_type(ty, None, None, Value::Bytes(vec![0u8; 15]));
    assert_eq!(
      result.unwrap_err(),
      WireErr::FixedWidthMismatch {
        expected: 16,
        actual:   15,
      }
    );
  }

  #[test]
  fn kind_mismatch_rejected() {
    let ty = TypeRegistry::global().by_id(ids::INT32).unwrap();
    let result = Field::with_type(ty, None, None, Value::Bool(true));
    assert_eq!(result.unwrap_err(), WireErr::ValueKindMismatch(ids::INT32));
  }

  #[test]
  fn field_count_boundary() {
    let mut msg = Message::new();
    let field = Field::new(None, Some(1), Value::Indicator).unwrap();
    for _ in 0..MAX_FIELDS {
      msg.push(field.clone()).unwrap();
    }
    assert_eq!(msg.len(), 32_767);
    let err = msg.push(field).unwrap_err();
    assert_eq!(err, WireErr::TooManyFields(32_767));
  }

  #[test]
  fn get_through_taxonomy() {
    let tax = Taxonomy::new([(7, "foo")]).unwrap();
    let mut msg = Message::new();
    msg.add(None, Some(7), 42i8).unwrap();
    assert!(msg.get("foo", None).is_none());
    let field = msg.get("foo", Some(&tax)).unwrap();
    assert_eq!(field.value(), &Value::Byte(42));
  }
}
