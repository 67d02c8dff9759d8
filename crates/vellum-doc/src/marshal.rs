//! String marshalling across the engine boundary.
//!
//! Inputs cross as NUL-terminated byte strings or NUL-terminated UTF-16LE.
//! Outputs use the engine's two-phase protocol: call once with a null
//! buffer to learn the byte size, then again with a scoped buffer of that
//! size. Empty results read as absent; invalid encodings are replaced
//! rather than raised.

use vellum_core::{Error, Result};
use vellum_engine::Engine;

use crate::library::Runtime;

/// `value` as a NUL-terminated byte string. Interior NULs are rejected.
pub(crate) fn c_string(value: &str) -> Result<Vec<u8>> {
    if value.as_bytes().contains(&0) {
        return Err(Error::InvalidArgument {
            reason: format!("{value:?} contains an interior NUL"),
        });
    }
    let mut bytes = Vec::with_capacity(value.len() + 1);
    bytes.extend_from_slice(value.as_bytes());
    bytes.push(0);
    Ok(bytes)
}

/// `value` as NUL-terminated UTF-16LE.
pub(crate) fn wide_string(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Decode UTF-16LE, stopping at the first NUL unit.
pub(crate) fn decode_wide(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode UTF-8, stopping at the first NUL byte.
pub(crate) fn decode_utf8(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Run a two-phase getter and return the raw bytes it wrote.
///
/// `fetch(engine, buffer, buflen)` must return the required size in bytes.
/// A size of zero means the value is absent.
pub(crate) fn two_phase(
    rt: &Runtime,
    mut fetch: impl FnMut(&mut dyn Engine, u32, u32) -> u32,
) -> Result<Option<Vec<u8>>> {
    let needed = rt.call(|e| fetch(e, 0, 0));
    if needed == 0 {
        return Ok(None);
    }
    let buffer = rt.arena().scoped(needed as usize)?;
    let written = rt.call(|e| fetch(e, buffer.offset(), needed));
    if written == 0 || written > needed {
        return Ok(None);
    }
    Ok(Some(buffer.read_at(0, written as usize)?))
}

/// A two-phase getter returning UTF-16LE text.
pub(crate) fn read_wide(
    rt: &Runtime,
    fetch: impl FnMut(&mut dyn Engine, u32, u32) -> u32,
) -> Result<Option<String>> {
    Ok(two_phase(rt, fetch)?
        .map(|bytes| decode_wide(&bytes))
        .filter(|text| !text.is_empty()))
}

/// A two-phase getter returning UTF-8 text.
pub(crate) fn read_utf8(
    rt: &Runtime,
    fetch: impl FnMut(&mut dyn Engine, u32, u32) -> u32,
) -> Result<Option<String>> {
    Ok(two_phase(rt, fetch)?
        .map(|bytes| decode_utf8(&bytes))
        .filter(|text| !text.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_string_appends_terminator() {
        assert_eq!(c_string("Title").unwrap(), b"Title\0");
    }

    #[test]
    fn c_string_rejects_interior_nul() {
        match c_string("a\0b") {
            Err(Error::InvalidArgument { .. }) => {}
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn wide_string_is_little_endian_with_terminator() {
        assert_eq!(wide_string("Hi"), vec![b'H', 0, b'i', 0, 0, 0]);
    }

    #[test]
    fn decode_wide_stops_at_nul_and_replaces_lone_surrogates() {
        assert_eq!(decode_wide(&wide_string("caf\u{e9}")), "caf\u{e9}");
        let lone = [0x00, 0xD8, b'x', 0x00];
        assert_eq!(decode_wide(&lone), "\u{FFFD}x");
    }

    #[test]
    fn decode_wide_handles_astral_plane() {
        assert_eq!(decode_wide(&wide_string("\u{1F4C4}")), "\u{1F4C4}");
    }

    #[test]
    fn decode_utf8_trims_terminator() {
        assert_eq!(decode_utf8(b"Helvetica\0"), "Helvetica");
        assert_eq!(decode_utf8(b"\xFFok"), "\u{FFFD}ok");
    }
}
