//! Small little-endian fixed-width encode/decode helpers shared by the
//! lexicon and collocation store file formats: both are "magic header,
//! then concatenated variable-length records, then a sorted key index"
//! layouts, so the primitives are factored out once instead of duplicated
//! per format, the way `milli`'s `heed_codec` module factors one codec per
//! on-disk shape.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CorruptError, Error, InvalidInputError};

pub fn write_u8(w: &mut impl Write, v: u8) -> io::Result<()> {
    w.write_u8(v)
}

pub fn write_u16(w: &mut impl Write, v: u16) -> io::Result<()> {
    w.write_u16::<LittleEndian>(v)
}

pub fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(v)
}

pub fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_u64::<LittleEndian>(v)
}

pub fn write_f32(w: &mut impl Write, v: f32) -> io::Result<()> {
    w.write_f32::<LittleEndian>(v)
}

pub fn read_u8(r: &mut impl Read) -> Result<u8, Error> {
    Ok(r.read_u8()?)
}

pub fn read_u16(r: &mut impl Read) -> Result<u16, Error> {
    Ok(r.read_u16::<LittleEndian>()?)
}

pub fn read_u32(r: &mut impl Read) -> Result<u32, Error> {
    Ok(r.read_u32::<LittleEndian>()?)
}

pub fn read_u64(r: &mut impl Read) -> Result<u64, Error> {
    Ok(r.read_u64::<LittleEndian>()?)
}

pub fn read_f32(r: &mut impl Read) -> Result<f32, Error> {
    Ok(r.read_f32::<LittleEndian>()?)
}

/// Writes a `u16`-length-prefixed UTF-8 string. Overflow (`bytes.len() >
/// u16::MAX`) is enforced at write time as a build error, never silently
/// truncated.
pub fn write_str_u16(w: &mut impl Write, s: &str) -> Result<(), Error> {
    let bytes = s.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(InvalidInputError::LemmaTooLong {
            lemma: s.to_string(),
            len: bytes.len(),
            limit: u16::MAX as usize,
        }
        .into());
    }
    write_u16(w, bytes.len() as u16)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Writes a `u8`-length-prefixed UTF-8 string (collocate lemma/POS limit).
pub fn write_str_u8(w: &mut impl Write, s: &str, is_pos: bool) -> Result<(), Error> {
    let bytes = s.as_bytes();
    if bytes.len() > u8::MAX as usize {
        let err = if is_pos {
            InvalidInputError::PosTooLong { pos: s.to_string(), len: bytes.len(), limit: u8::MAX as usize }
        } else {
            InvalidInputError::LemmaTooLong { lemma: s.to_string(), len: bytes.len(), limit: u8::MAX as usize }
        };
        return Err(err.into());
    }
    write_u8(w, bytes.len() as u8)?;
    w.write_all(bytes)?;
    Ok(())
}

pub fn read_str_u16(r: &mut impl Read) -> Result<String, Error> {
    let len = read_u16(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| {
        CorruptError::TruncatedRecord {
            context: "utf8 string",
            needed: e.utf8_error().valid_up_to(),
            had: 0,
        }
        .into()
    })
}

pub fn read_str_u8(r: &mut impl Read) -> Result<String, Error> {
    let len = read_u8(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| {
        CorruptError::TruncatedRecord {
            context: "utf8 string",
            needed: e.utf8_error().valid_up_to(),
            had: 0,
        }
        .into()
    })
}

pub fn read_fixed_magic(r: &mut impl Read, expected: &str) -> Result<(), Error> {
    let mut buf = vec![0u8; expected.len()];
    r.read_exact(&mut buf).map_err(|_| CorruptError::TruncatedRecord {
        context: "magic",
        needed: expected.len(),
        had: 0,
    })?;
    if buf != expected.as_bytes() {
        return Err(CorruptError::BadMagic {
            expected: expected.to_string(),
            found: String::from_utf8_lossy(&buf).to_string(),
        }
        .into());
    }
    Ok(())
}
