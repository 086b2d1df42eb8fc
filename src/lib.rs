//! A self-describing, field-based binary serialization format.
//!
//! Messages are ordered lists of typed fields.  Each field carries its type
//! on the wire and may be labeled with a UTF-8 name, a 16-bit ordinal, both,
//! or neither, so a reader needs no external schema to walk a message it has
//! never seen.  An optional [`Taxonomy`] maps names to ordinals; encoding
//! through one substitutes 2-byte ordinals for names the taxonomy knows,
//! and decoding can translate them back.
//!
//! The format is forward compatible: fields with type ids this library has
//! never heard of are preserved as raw bytes (see [`Value::Unknown`]) and
//! re-encode byte-identically, so intermediaries can route and rewrite
//! messages they only partially understand.
//!
//! ```
//! use tessera::{Envelope, Message, Value};
//!
//! let mut msg = Message::new();
//! msg.add(Some("boolean"), None, true)?;
//! msg.add(Some("int"), None, 70_000)?;
//!
//! let bytes = Envelope::new(msg).encode(None)?;
//! let (decoded, _consumed) = Envelope::decode(&bytes)?;
//! let field = decoded.message().get("int", None).unwrap();
//! assert_eq!(field.value(), &Value::Int32(70_000));
//! # Ok::<(), tessera::WireErr>(())
//! ```

#[macro_use]
mod macros;

mod bytes;
mod decode;
mod encode;
mod error;
mod message;
pub mod modutf8;
mod prefix;
mod taxonomy;
mod types;
mod util;
mod value;

pub use crate::{
  encode::ENVELOPE_HEADER_LEN,
  error::WireErr,
  message::{Envelope, Field, Message, MAX_FIELDS, MAX_NAME_LEN},
  prefix::FieldPrefix,
  taxonomy::{MapResolver, Taxonomy, TaxonomyResolver},
  types::{
    ids, SecondaryType, TypeRegistry, ValueKind, Width, WireType,
    FIXED_BYTES_LENGTHS,
  },
  value::Value,
};
