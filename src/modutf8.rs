//! The modified UTF-8 codec used for field names and text values.
//!
//! This is the classic DataInput/DataOutput flavor of UTF-8: the null code
//! point is written as the two-byte sequence `C0 80` (so encoded text never
//! contains a zero byte), code points through U+FFFF take one to three bytes
//! keyed on the leading-byte pattern, and supplementary-plane code points are
//! written as a UTF-16 surrogate pair, each half in three bytes.
//!
//! Like the rest of the wire format, the encoder needs the exact byte length
//! before emitting anything; [`encoded_len`] provides it.

use crate::{
  bytes::{read_u8, write_bytes, write_u8},
  WireErr,
};

/// The number of bytes `text` occupies in modified UTF-8.
pub fn encoded_len(text: &str) -> usize {
  text
    .chars()
    .map(|c| match u32::from(c) {
      0 => 2,
      1..=0x7F => 1,
      0x80..=0x7FF => 2,
      0x800..=0xFFFF => 3,
      _ => 6, // surrogate pair, two three-byte groups
    })
    .sum()
}

/// Writes `text` as modified UTF-8 at `target[*cursor]`.
pub fn encode(
  text: &str,
  target: &mut [u8],
  cursor: &mut usize,
) -> Result<(), WireErr> {
  for c in text.chars() {
    let cp = u32::from(c);
    match cp {
      1..=0x7F => write_u8(cp as u8, target, cursor)?,
      0 | 0x80..=0x7FF => {
        let bytes = [0xC0 | (cp >> 6) as u8, 0x80 | (cp & 0x3F) as u8];
        write_bytes(&bytes, target, cursor)?;
      },
      0x800..=0xFFFF => write_unit(cp as u16, target, cursor)?,
      _ => {
        // Split into a UTF-16 surrogate pair; each half gets three bytes.
        let offset = cp - 0x1_0000;
        write_unit(0xD800 | (offset >> 10) as u16, target, cursor)?;
        write_unit(0xDC00 | (offset & 0x3FF) as u16, target, cursor)?;
      },
    }
  }
  Ok(())
}

/// Writes one UTF-16 code unit in the three-byte pattern.
#[inline(always)]
fn write_unit(
  unit: u16,
  target: &mut [u8],
  cursor: &mut usize,
) -> Result<(), WireErr> {
  let bytes = [
    0xE0 | (unit >> 12) as u8,
    0x80 | ((unit >> 6) & 0x3F) as u8,
    0x80 | (unit & 0x3F) as u8,
  ];
  write_bytes(&bytes, target, cursor)
}

/// Decodes a complete modified UTF-8 byte sequence.
pub fn decode(source: &[u8]) -> Result<String, WireErr> {
  let mut out = String::with_capacity(source.len());
  let cursor = &mut 0;
  while *cursor < source.len() {
    let unit = read_unit(source, cursor)?;
    let c = match unit {
      0xD800..=0xDBFF => {
        // High surrogate; the low half must follow immediately.
        if *cursor >= source.len() {
          return Err(err!(trace, WireErr::MalformedText));
        }
        let low = read_unit(source, cursor)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
          return Err(err!(trace, WireErr::MalformedText));
        }
        let cp = 0x1_0000
          + ((u32::from(unit) - 0xD800) << 10)
          + (u32::from(low) - 0xDC00);
        char::from_u32(cp).ok_or(WireErr::MalformedText)?
      },
      0xDC00..=0xDFFF => return Err(err!(trace, WireErr::MalformedText)),
      _ => {
        char::from_u32(u32::from(unit)).ok_or(WireErr::MalformedText)?
      },
    };
    out.push(c);
  }
  Ok(out)
}

/// Reads one UTF-16 code unit, dispatching on the leading-byte pattern.
fn read_unit(source: &[u8], cursor: &mut usize) -> Result<u16, WireErr> {
  let a = read_u8(source, cursor)?;
  if a & 0x80 == 0 {
    // Group 1: 0xxxxxxx
    Ok(u16::from(a))
  } else if a & 0xE0 == 0xC0 {
    // Group 2: 110xxxxx 10xxxxxx
    let b = continuation(source, cursor)?;
    Ok((u16::from(a & 0x1F) << 6) | u16::from(b))
  } else if a & 0xF0 == 0xE0 {
    // Group 3: 1110xxxx 10xxxxxx 10xxxxxx
    let b = continuation(source, cursor)?;
    let c = continuation(source, cursor)?;
    Ok((u16::from(a & 0x0F) << 12) | (u16::from(b) << 6) | u16::from(c))
  } else {
    Err(err!(trace, WireErr::MalformedText))
  }
}

#[inline(always)]
fn continuation(source: &[u8], cursor: &mut usize) -> Result<u8, WireErr> {
  let b = read_u8(source, cursor)?;
  if b & 0xC0 == 0x80 {
    Ok(b & 0x3F)
  } else {
    Err(err!(trace, WireErr::MalformedText))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn round_trip(text: &str) -> Vec<u8> {
    let len = encoded_len(text);
    let mut buf = vec![0u8; len];
    let cursor = &mut 0;
    encode(text, &mut buf, cursor).unwrap();
    assert_eq!(*cursor, len);
    assert_eq!(decode(&buf).unwrap(), text);
    buf
  }

  #[test]
  fn ascii_is_identity() {
    let buf = round_trip("boolean");
    assert_eq!(&buf, b"boolean");
  }

  #[test]
  fn null_is_two_bytes() {
    let buf = round_trip("a\u{0}b");
    assert_eq!(buf, [0x61, 0xC0, 0x80, 0x62]);
  }

  #[test]
  fn multi_byte_groups() {
    // U+00E9 takes two bytes, U+20AC three, U+1F600 a six-byte pair.
    assert_eq!(encoded_len("é"), 2);
    assert_eq!(encoded_len("€"), 3);
    assert_eq!(encoded_len("😀"), 6);
    round_trip("é€😀");
  }

  #[test]
  fn unpaired_surrogate_rejected() {
    // A lone high surrogate (U+D83D) with nothing following.
    let bytes = [0xED, 0xA0, 0xBD];
    assert_eq!(decode(&bytes), Err(WireErr::MalformedText));
  }

  #[test]
  fn bad_leading_byte_rejected() {
    // 0xF0 starts a four-byte sequence in standard UTF-8, which this
    // encoding never produces.
    let bytes = [0xF0, 0x9F, 0x98, 0x80];
    assert_eq!(decode(&bytes), Err(WireErr::MalformedText));
  }

  #[test]
  fn truncated_continuation() {
    let bytes = [0xC3];
    assert!(matches!(
      decode(&bytes),
      Err(WireErr::TruncatedInput { .. })
    ));
  }
}
