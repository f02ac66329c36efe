//! Optional extended block at the very end of a card.
//!
//! ```text
//! ... base record | EXTPRESET_BGN | envelope | EXTPRESET_END
//! ```
//! Nothing records the block's length. The end marker is checked first and
//! the begin marker is then found by walking backward from just before it.

use std::io::{self, Read, Seek, SeekFrom};

use crate::scan::find_backward;

/// Marks the start of the extended block.
pub const BEGIN_MAGIC: &[u8; 13] = b"EXTPRESET_BGN";
/// Marks the end of the extended block; always the last bytes of the file.
pub const END_MAGIC: &[u8; 13] = b"EXTPRESET_END";
/// Both markers share one length.
pub const MAGIC_LEN: u64 = 13;

/// Offset of the first byte of `BEGIN_MAGIC`, or `None` when the file has
/// no usable extended block.
///
/// A file that ends in `END_MAGIC` but has no matching begin marker has
/// been cut or edited. That is reported as absent rather than as an error.
pub fn locate_extended_block<R: Read + Seek>(reader: &mut R) -> io::Result<Option<u64>> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < 2 * MAGIC_LEN {
        return Ok(None);
    }

    let mut tail = [0u8; MAGIC_LEN as usize];
    reader.seek(SeekFrom::Start(len - MAGIC_LEN))?;
    reader.read_exact(&mut tail)?;
    if &tail != END_MAGIC {
        return Ok(None);
    }

    let found = find_backward(reader, BEGIN_MAGIC, len - 2 * MAGIC_LEN)?;
    match found {
        Some(begin) => tracing::debug!(begin, "extended block found"),
        None        => tracing::warn!("end marker present without a begin marker; ignoring extended block"),
    }
    Ok(found)
}

/// Absolute position of an extended block inside a container of `file_len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExtendedSpan {
    /// First byte of `BEGIN_MAGIC`.
    pub begin:    u64,
    pub file_len: u64,
}

impl ExtendedSpan {
    pub fn payload_start(&self) -> u64 { self.begin + MAGIC_LEN }
    pub fn payload_end(&self)   -> u64 { self.file_len - MAGIC_LEN }
    pub fn payload_len(&self)   -> u64 { self.payload_end() - self.payload_start() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn block(prefix: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut v = prefix.to_vec();
        v.extend_from_slice(BEGIN_MAGIC);
        v.extend_from_slice(payload);
        v.extend_from_slice(END_MAGIC);
        v
    }

    #[test]
    fn finds_begin_marker() {
        let data = block(b"base record bytes", b"compressed");
        let begin = locate_extended_block(&mut Cursor::new(data.clone())).unwrap().unwrap();
        assert_eq!(begin, 17);
        let span = ExtendedSpan { begin, file_len: data.len() as u64 };
        assert_eq!(&data[span.payload_start() as usize..span.payload_end() as usize], b"compressed");
    }

    #[test]
    fn empty_payload_between_markers() {
        let data = block(b"", b"");
        assert_eq!(locate_extended_block(&mut Cursor::new(data)).unwrap(), Some(0));
    }

    #[test]
    fn no_end_marker_is_absent() {
        let data = b"base record without extension, long enough".to_vec();
        assert_eq!(locate_extended_block(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn end_marker_without_begin_is_absent() {
        let mut data = b"tampered".repeat(10);
        data.extend_from_slice(END_MAGIC);
        assert_eq!(locate_extended_block(&mut Cursor::new(data)).unwrap(), None);
    }

    #[test]
    fn tiny_files_are_absent() {
        assert_eq!(locate_extended_block(&mut Cursor::new(END_MAGIC.to_vec())).unwrap(), None);
        assert_eq!(locate_extended_block(&mut Cursor::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn last_begin_marker_wins() {
        let mut data = BEGIN_MAGIC.to_vec();
        data.extend_from_slice(&block(b"xx", b"payload"));
        let begin = locate_extended_block(&mut Cursor::new(data)).unwrap();
        assert_eq!(begin, Some(MAGIC_LEN + 2));
    }
}
