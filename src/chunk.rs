//! PNG terminal-chunk boundary.
//!
//! A preset card is an ordinary PNG followed by application data. The only
//! anchor is the `IEND` chunk type; the 4-byte CRC after it ends the image.
//! The scan takes the *first* `IEND` in the file.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::scan::find_forward;

/// Chunk type of the PNG terminal chunk.
pub const IEND_MAGIC: &[u8; 4] = b"IEND";
/// Length of the CRC that follows the chunk type.
pub const CRC_LEN: u64 = 4;
/// CRC-32 of an empty `IEND` chunk, as every conforming encoder writes it.
pub const IEND_CRC: [u8; 4] = [0xAE, 0x42, 0x60, 0x82];

/// File extension of preset cards (compared case-insensitively).
pub const IMAGE_EXTENSION: &str = "png";

/// `true` if `path` carries the card image extension.
pub fn is_image_path<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(IMAGE_EXTENSION))
        .unwrap_or(false)
}

/// Locate the byte right after the terminal chunk's CRC.
///
/// Returns `Ok(None)` when the stream holds no `IEND` at all; that is the
/// answer for anything that is not a PNG and never an error. On success the
/// reader is positioned at the returned offset.
pub fn locate_terminal_chunk<R: Read + Seek>(reader: &mut R) -> io::Result<Option<u64>> {
    reader.seek(SeekFrom::Start(0))?;
    let Some(at) = find_forward(reader, IEND_MAGIC)? else {
        return Ok(None);
    };
    let image_end = at + IEND_MAGIC.len() as u64 + CRC_LEN;
    tracing::debug!(iend = at, image_end, "terminal chunk found");
    reader.seek(SeekFrom::Start(image_end))?;
    Ok(Some(image_end))
}

/// `true` if the four bytes after the first `IEND` are the canonical CRC.
/// Diagnostic only; reading never depends on it.
pub fn terminal_crc_is_canonical<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let Some(image_end) = locate_terminal_chunk(reader)? else {
        return Ok(false);
    };
    let mut crc = [0u8; 4];
    reader.seek(SeekFrom::Start(image_end - CRC_LEN))?;
    match reader.read_exact(&mut crc) {
        Ok(())                                                 => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e)                                                 => return Err(e),
    }
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(IEND_MAGIC);
    Ok(hasher.finalize().to_be_bytes() == crc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::tiny_png;
    use std::io::Cursor;

    #[test]
    fn boundary_is_right_after_crc() {
        let png = tiny_png();
        let mut c = Cursor::new(png.clone());
        assert_eq!(locate_terminal_chunk(&mut c).unwrap(), Some(png.len() as u64));
        assert_eq!(c.position(), png.len() as u64);
    }

    #[test]
    fn first_iend_wins() {
        let mut data = tiny_png();
        let first = data.len() as u64;
        data.extend_from_slice(&tiny_png());
        assert_eq!(locate_terminal_chunk(&mut Cursor::new(data)).unwrap(), Some(first));
    }

    #[test]
    fn not_a_png() {
        let mut c = Cursor::new(b"GIF89a not a png at all".to_vec());
        assert_eq!(locate_terminal_chunk(&mut c).unwrap(), None);
        assert_eq!(locate_terminal_chunk(&mut Cursor::new(b"IEN".to_vec())).unwrap(), None);
    }

    #[test]
    fn canonical_crc_constant() {
        assert!(terminal_crc_is_canonical(&mut Cursor::new(tiny_png())).unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(IEND_MAGIC);
        assert_eq!(hasher.finalize().to_be_bytes(), IEND_CRC);
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_image_path("cards/pre_Foo.PNG"));
        assert!(is_image_path("a.png"));
        assert!(!is_image_path("a.preset"));
        assert!(!is_image_path("png"));
    }
}
