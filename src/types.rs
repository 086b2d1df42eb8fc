//! Wire type descriptors and the extensible type registry.
//!
//! Every value on the wire carries a one-byte type id.  A [`WireType`]
//! descriptor maps that id to a width (fixed, known from the descriptor
//! alone, or variable and therefore length-prefixed) and a [`ValueKind`]
//! saying how the payload bytes are interpreted.  The [`TypeRegistry`] holds
//! the id table; it pre-registers the standard types and accepts overrides
//! and extensions at runtime.
//!
//! Lookups happen on every field of every message, concurrently with any
//! in-flight [`TypeRegistry::register`] call.  The tables are therefore
//! copy-on-write: `register` clones the current table, mutates the clone,
//! and publishes it with a single atomic swap, so readers always observe a
//! complete table and never block.

use crate::{
  value::Value,
  WireErr,
};
use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};

/// Standard wire type ids.
///
/// Ids 17 through 25 are fixed-length byte sequences; see
/// [`FIXED_BYTES_LENGTHS`].  Id 16 is reserved.
#[allow(missing_docs)]
pub mod ids {
  pub const INDICATOR: u8 = 0;
  pub const BOOL: u8 = 1;
  pub const BYTE: u8 = 2;
  pub const INT16: u8 = 3;
  pub const INT32: u8 = 4;
  pub const INT64: u8 = 5;
  pub const BYTE_SEQ: u8 = 6;
  pub const INT16_SEQ: u8 = 7;
  pub const INT32_SEQ: u8 = 8;
  pub const INT64_SEQ: u8 = 9;
  pub const FLOAT32: u8 = 10;
  pub const FLOAT64: u8 = 11;
  pub const FLOAT32_SEQ: u8 = 12;
  pub const FLOAT64_SEQ: u8 = 13;
  pub const TEXT: u8 = 14;
  pub const MESSAGE: u8 = 15;
  pub const FIXED_BYTES_4: u8 = 17;
  pub const FIXED_BYTES_8: u8 = 18;
  pub const FIXED_BYTES_16: u8 = 19;
  pub const FIXED_BYTES_20: u8 = 20;
  pub const FIXED_BYTES_32: u8 = 21;
  pub const FIXED_BYTES_64: u8 = 22;
  pub const FIXED_BYTES_128: u8 = 23;
  pub const FIXED_BYTES_256: u8 = 24;
  pub const FIXED_BYTES_512: u8 = 25;
}

/// The standard fixed-length byte-sequence sizes, paired with their type ids.
pub const FIXED_BYTES_LENGTHS: [(usize, u8); 9] = [
  (4, ids::FIXED_BYTES_4),
  (8, ids::FIXED_BYTES_8),
  (16, ids::FIXED_BYTES_16),
  (20, ids::FIXED_BYTES_20),
  (32, ids::FIXED_BYTES_32),
  (64, ids::FIXED_BYTES_64),
  (128, ids::FIXED_BYTES_128),
  (256, ids::FIXED_BYTES_256),
  (512, ids::FIXED_BYTES_512),
];

/// Whether a type's encoded length is a property of the type or of the value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Width {
  /// Every value of this type encodes to exactly this many bytes.
  Fixed(usize),
  /// Encoded length depends on the value; the wire carries a length prefix.
  Variable,
}

/// How a payload's bytes are interpreted, over the closed set of standard
/// value representations.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValueKind {
  Indicator,
  Bool,
  Byte,
  Int16,
  Int32,
  Int64,
  Float32,
  Float64,
  ByteSeq,
  Int16Seq,
  Int32Seq,
  Int64Seq,
  Float32Seq,
  Float64Seq,
  Text,
  Message,
  /// A type this registry does not recognize; payload bytes are preserved
  /// verbatim.
  Unknown,
}

impl ValueKind {
  /// The number of variants; sizes the registry's kind-indexed table.
  pub(crate) const COUNT: usize = 17;
}

/// A wire type descriptor: type id, width, and payload interpretation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WireType {
  type_id: u8,
  width:   Width,
  kind:    ValueKind,
}

impl WireType {
  /// A fixed-width descriptor; every value takes exactly `size` bytes.
  pub const fn fixed(type_id: u8, size: usize, kind: ValueKind) -> WireType {
    WireType {
      type_id,
      width: Width::Fixed(size),
      kind,
    }
  }

  /// A variable-width, length-prefixed descriptor.
  pub const fn variable(type_id: u8, kind: ValueKind) -> WireType {
    WireType {
      type_id,
      width: Width::Variable,
      kind,
    }
  }

  /// The one-byte id written to the wire.
  #[inline(always)]
  pub fn type_id(&self) -> u8 {
    self.type_id
  }

  /// The descriptor's width.
  #[inline(always)]
  pub fn width(&self) -> Width {
    self.width
  }

  /// How payload bytes are interpreted.
  #[inline(always)]
  pub fn kind(&self) -> ValueKind {
    self.kind
  }
}

/// An application-facing value representation carried over one of the
/// standard primitive wire types.
///
/// Secondary types share the primary's type id and width on the wire; the
/// codec never sees them.  Implementors must guarantee that
/// `from_primary(to_primary(v).into())` reproduces `v` for every legal `v`,
/// up to the primary representation's precision.
pub trait SecondaryType: Sized {
  /// The wire type id of the primary representation.
  const PRIMARY_ID: u8;

  /// The primary value written in this type's place.
  fn to_primary(&self) -> Value;

  /// Reconstructs the secondary value from a decoded primary, or `None` if
  /// the primary value is out of this type's domain.
  fn from_primary(value: &Value) -> Option<Self>;
}

/// The published lookup tables.  Immutable once built; replaced wholesale.
#[derive(Clone)]
struct TypeTables {
  by_id:   [Option<Arc<WireType>>; 256],
  /// Inference overrides: value kinds explicitly bound to a registered
  /// descriptor, consulted before the standard id selection.
  by_kind: [Option<Arc<WireType>>; ValueKind::COUNT],
  /// Placeholder descriptors for ids seen on the wire but never registered.
  unknown: [Option<Arc<WireType>>; 256],
}

impl TypeTables {
  fn standard() -> TypeTables {
    let mut by_id: [Option<Arc<WireType>>; 256] =
      std::array::from_fn(|_| None);
    let mut set = |ty: WireType| {
      let id = ty.type_id as usize;
      by_id[id] = Some(Arc::new(ty));
    };
    set(WireType::fixed(ids::INDICATOR, 0, ValueKind::Indicator));
    set(WireType::fixed(ids::BOOL, 1, ValueKind::Bool));
    set(WireType::fixed(ids::BYTE, 1, ValueKind::Byte));
    set(WireType::fixed(ids::INT16, 2, ValueKind::Int16));
    set(WireType::fixed(ids::INT32, 4, ValueKind::Int32));
    set(WireType::fixed(ids::INT64, 8, ValueKind::Int64));
    set(WireType::variable(ids::BYTE_SEQ, ValueKind::ByteSeq));
    set(WireType::variable(ids::INT16_SEQ, ValueKind::Int16Seq));
    set(WireType::variable(ids::INT32_SEQ, ValueKind::Int32Seq));
    set(WireType::variable(ids::INT64_SEQ, ValueKind::Int64Seq));
    set(WireType::fixed(ids::FLOAT32, 4, ValueKind::Float32));
    set(WireType::fixed(ids::FLOAT64, 8, ValueKind::Float64));
    set(WireType::variable(ids::FLOAT32_SEQ, ValueKind::Float32Seq));
    set(WireType::variable(ids::FLOAT64_SEQ, ValueKind::Float64Seq));
    set(WireType::variable(ids::TEXT, ValueKind::Text));
    set(WireType::variable(ids::MESSAGE, ValueKind::Message));
    for (len, id) in FIXED_BYTES_LENGTHS {
      set(WireType::fixed(id, len, ValueKind::ByteSeq));
    }
    TypeTables {
      by_id,
      by_kind: std::array::from_fn(|_| None),
      unknown: std::array::from_fn(|_| None),
    }
  }
}

/// The extensible map from type ids to descriptors.
///
/// Cheap to read from many threads; see the module docs for the
/// copy-on-write publication discipline.
pub struct TypeRegistry {
  tables: ArcSwap<TypeTables>,
}

impl TypeRegistry {
  /// A registry pre-loaded with the standard types.
  pub fn new() -> TypeRegistry {
    TypeRegistry {
      tables: ArcSwap::from_pointee(TypeTables::standard()),
    }
  }

  /// The shared process-wide registry used by the convenience APIs.
  pub fn global() -> &'static TypeRegistry {
    static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();
    GLOBAL.get_or_init(TypeRegistry::new)
  }

  /// Adds `ty`, replacing any descriptor already at its id.
  ///
  /// `extra_kinds` lists value kinds that bare-value inference (see
  /// [`TypeRegistry::type_for_value`]) should resolve to this descriptor
  /// instead of the standard type, letting a registered type intercept
  /// plain values.  Pass `&[]` to register a descriptor reachable only by
  /// explicit selection or wire id.
  ///
  /// The new table becomes visible to concurrent readers atomically.
  pub fn register(&self, ty: WireType, extra_kinds: &[ValueKind]) {
    let ty = Arc::new(ty);
    self.tables.rcu(|tables| {
      let mut next = TypeTables::clone(tables);
      next.by_id[ty.type_id as usize] = Some(ty.clone());
      for kind in extra_kinds {
        next.by_kind[*kind as usize] = Some(ty.clone());
      }
      next
    });
  }

  /// The descriptor registered at `id`, if any.
  #[inline]
  pub fn by_id(&self, id: u8) -> Option<Arc<WireType>> {
    self.tables.load().by_id[id as usize].clone()
  }

  /// The placeholder descriptor for an unregistered `id`.
  ///
  /// Idempotent: the first call for a given id creates and publishes the
  /// placeholder, and every later call returns that same descriptor.
  pub fn unknown_type(&self, id: u8) -> Arc<WireType> {
    loop {
      if let Some(ty) = self.tables.load().unknown[id as usize].as_ref() {
        return ty.clone();
      }
      self.tables.rcu(|tables| {
        let mut next = TypeTables::clone(tables);
        next.unknown[id as usize].get_or_insert_with(|| {
          Arc::new(WireType::variable(id, ValueKind::Unknown))
        });
        next
      });
    }
  }

  /// Infers the descriptor for a bare value.
  ///
  /// A kind registered through [`TypeRegistry::register`]'s `extra_kinds`
  /// wins outright.  Otherwise integral values are assumed to be
  /// pre-narrowed (see [`Value::narrowed`]); byte sequences whose length
  /// matches one of the standard fixed sizes select the fixed-length
  /// descriptor, all others the generic variable-length one.
  pub fn type_for_value(
    &self,
    value: &Value,
  ) -> Result<Arc<WireType>, WireErr> {
    if let Value::Unknown { type_id, .. } = value {
      // Preserve the original id and raw bytes rather than reinterpreting
      // through any descriptor registered since the value was decoded.
      return Ok(self.unknown_type(*type_id));
    }
    if let Some(ty) =
      self.tables.load().by_kind[value.kind() as usize].as_ref()
    {
      return Ok(ty.clone());
    }
    let id = match value {
      Value::Indicator => ids::INDICATOR,
      Value::Bool(_) => ids::BOOL,
      Value::Byte(_) => ids::BYTE,
      Value::Int16(_) => ids::INT16,
      Value::Int32(_) => ids::INT32,
      Value::Int64(_) => ids::INT64,
      Value::Float32(_) => ids::FLOAT32,
      Value::Float64(_) => ids::FLOAT64,
      Value::Bytes(bytes) => FIXED_BYTES_LENGTHS
        .iter()
        .find(|(len, _)| *len == bytes.len())
        .map(|(_, id)| *id)
        .unwrap_or(ids::BYTE_SEQ),
      Value::Int16Seq(_) => ids::INT16_SEQ,
      Value::Int32Seq(_) => ids::INT32_SEQ,
      Value::Int64Seq(_) => ids::INT64_SEQ,
      Value::Float32Seq(_) => ids::FLOAT32_SEQ,
      Value::Float64Seq(_) => ids::FLOAT64_SEQ,
      Value::Text(_) => ids::TEXT,
      Value::Message(_) => ids::MESSAGE,
      // Handled above, before the kind table.
      Value::Unknown { .. } => unreachable!(),
    };
    self
      .by_id(id)
      .ok_or_else(|| err!(warn, WireErr::ValueKindMismatch(id)))
  }
}

impl Default for TypeRegistry {
  fn default() -> Self {
    TypeRegistry::new()
  }
}
