//! Cursor-based primitives for reading and writing wire bytes.
//!
//! All multi-byte values on the wire are big-endian.  Readers return
//! [`WireErr::TruncatedInput`] when the source ends early; writers return
//! [`WireErr::OutOfBounds`], which for a correctly sized target buffer is
//! unreachable.

use crate::WireErr;
use core::mem::size_of;

/// Bounds check for reads; failure means the input was truncated.
#[inline(always)]
pub(crate) fn read_check(source: &[u8], to: usize) -> Result<(), WireErr> {
  if to > source.len() {
    Err(err!(
      trace,
      WireErr::TruncatedInput {
        needed:    to,
        available: source.len(),
      }
    ))
  } else {
    Ok(())
  }
}

/// Bounds check for writes into a pre-sized target buffer.
#[inline(always)]
pub(crate) fn write_check(target: &[u8], to: usize) -> Result<(), WireErr> {
  if to > target.len() {
    Err(err!(
      error,
      WireErr::OutOfBounds {
        needed:    to,
        available: target.len(),
      }
    ))
  } else {
    Ok(())
  }
}

/// References `len` bytes at `source[*cursor]`, advancing the cursor.
#[inline(always)]
pub(crate) fn read_bytes<'a>(
  source: &'a [u8],
  cursor: &mut usize,
  len: usize,
) -> Result<&'a [u8], WireErr> {
  read_check(source, *cursor + len)?;
  let bytes = &source[*cursor..*cursor + len];
  *cursor += len;
  Ok(bytes)
}

/// Copies `source` into `target[*cursor]`, advancing the cursor.
#[inline(always)]
pub(crate) fn write_bytes(
  source: &[u8],
  target: &mut [u8],
  cursor: &mut usize,
) -> Result<(), WireErr> {
  write_check(target, *cursor + source.len())?;
  target[*cursor..*cursor + source.len()].copy_from_slice(source);
  *cursor += source.len();
  Ok(())
}

macro_rules! gen_wire_prim {
  ($native:ident, $read_fn:ident, $write_fn:ident) => {
    #[inline(always)]
    pub(crate) fn $read_fn(
      source: &[u8],
      cursor: &mut usize,
    ) -> Result<$native, WireErr> {
      let bytes = read_bytes(source, cursor, size_of::<$native>())?;
      // Infallible: read_bytes returned exactly size_of::<$native>() bytes.
      Ok($native::from_be_bytes(bytes.try_into().unwrap()))
    }

    #[inline(always)]
    pub(crate) fn $write_fn(
      value: $native,
      target: &mut [u8],
      cursor: &mut usize,
    ) -> Result<(), WireErr> {
      write_bytes(&value.to_be_bytes(), target, cursor)
    }
  };
}

gen_wire_prim!(u8, read_u8, write_u8);
gen_wire_prim!(i8, read_i8, write_i8);
gen_wire_prim!(i16, read_i16, write_i16);
gen_wire_prim!(u16, read_u16, write_u16);
gen_wire_prim!(i32, read_i32, write_i32);
gen_wire_prim!(u32, read_u32, write_u32);
gen_wire_prim!(i64, read_i64, write_i64);
gen_wire_prim!(f32, read_f32, write_f32);
gen_wire_prim!(f64, read_f64, write_f64);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_primitives() {
    let mut buf = [0u8; 32];
    let cursor = &mut 0;
    write_u8(0xAB, &mut buf, cursor).unwrap();
    write_i16(-2, &mut buf, cursor).unwrap();
    write_i32(70_000, &mut buf, cursor).unwrap();
    write_i64(i64::MIN, &mut buf, cursor).unwrap();
    write_f64(1.5, &mut buf, cursor).unwrap();
    assert_eq!(*cursor, 23);

    let cursor = &mut 0;
    assert_eq!(read_u8(&buf, cursor).unwrap(), 0xAB);
    assert_eq!(read_i16(&buf, cursor).unwrap(), -2);
    assert_eq!(read_i32(&buf, cursor).unwrap(), 70_000);
    assert_eq!(read_i64(&buf, cursor).unwrap(), i64::MIN);
    assert_eq!(read_f64(&buf, cursor).unwrap(), 1.5);
  }

  #[test]
  fn big_endian_layout() {
    let mut buf = [0u8; 4];
    write_i32(70_000, &mut buf, &mut 0).unwrap();
    assert_eq!(buf, [0x00, 0x01, 0x11, 0x70]);
  }

  #[test]
  fn truncation_reported() {
    let buf = [0u8; 3];
    let err = read_i32(&buf, &mut 0).unwrap_err();
    assert_eq!(
      err,
      WireErr::TruncatedInput {
        needed:    4,
        available: 3,
      }
    );
  }
}
