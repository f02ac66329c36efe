//! Byte-pattern scans over seekable streams.
//!
//! Both scans keep the single-byte-step semantics of a naive window walk
//! (overlapping candidates are all tried) but read the stream through a
//! fixed buffer instead of seeking once per byte.

use std::io::{self, Read, Seek, SeekFrom};

/// Bytes read per scan step.
pub const SCAN_CHUNK: usize = 64 * 1024;

/// Offset of the first occurrence of `pattern` at or after the reader's
/// current position.
pub fn find_forward<R: Read + Seek>(reader: &mut R, pattern: &[u8]) -> io::Result<Option<u64>> {
    debug_assert!(!pattern.is_empty());
    let mut base   = reader.stream_position()?;
    let mut buf    = vec![0u8; SCAN_CHUNK + pattern.len() - 1];
    let mut filled = 0usize;

    loop {
        let read = match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        filled += read;

        if let Some(i) = buf[..filled].windows(pattern.len()).position(|w| w == pattern) {
            return Ok(Some(base + i as u64));
        }

        // Carry the tail over so a match straddling two reads is still seen.
        let keep = (pattern.len() - 1).min(filled);
        buf.copy_within(filled - keep..filled, 0);
        base  += (filled - keep) as u64;
        filled = keep;
    }
}

/// Offset of the last occurrence of `pattern` that starts at or before
/// `last_start`.
pub fn find_backward<R: Read + Seek>(
    reader:     &mut R,
    pattern:    &[u8],
    last_start: u64,
) -> io::Result<Option<u64>> {
    debug_assert!(!pattern.is_empty());
    let n       = pattern.len() as u64;
    let mut buf = vec![0u8; SCAN_CHUNK + pattern.len() - 1];
    // Exclusive end of the bytes the current window must cover.
    let mut hi  = last_start + n;

    loop {
        let lo  = hi.saturating_sub(buf.len() as u64);
        let len = (hi - lo) as usize;
        if len < pattern.len() {
            return Ok(None);
        }

        reader.seek(SeekFrom::Start(lo))?;
        reader.read_exact(&mut buf[..len])?;

        if let Some(i) = buf[..len].windows(pattern.len()).rposition(|w| w == pattern) {
            return Ok(Some(lo + i as u64));
        }
        if lo == 0 {
            return Ok(None);
        }
        hi = lo + n - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn forward_finds_first_match_across_chunk_boundary() {
        let mut data = vec![0u8; SCAN_CHUNK + 10];
        // The first read covers SCAN_CHUNK + 3 bytes, so this match is split.
        data[SCAN_CHUNK + 1..SCAN_CHUNK + 5].copy_from_slice(b"IEND");
        data.extend_from_slice(b"IEND");
        let mut c = Cursor::new(data);
        assert_eq!(find_forward(&mut c, b"IEND").unwrap(), Some(SCAN_CHUNK as u64 + 1));
    }

    #[test]
    fn forward_overlapping_candidates() {
        let mut c = Cursor::new(b"aaab".to_vec());
        assert_eq!(find_forward(&mut c, b"aab").unwrap(), Some(1));
    }

    #[test]
    fn forward_miss_and_short_stream() {
        assert_eq!(find_forward(&mut Cursor::new(b"IEN".to_vec()), b"IEND").unwrap(), None);
        assert_eq!(find_forward(&mut Cursor::new(Vec::new()), b"IEND").unwrap(), None);
    }

    #[test]
    fn backward_finds_last_match_not_after_limit() {
        let mut data = vec![b'.'; 3 * SCAN_CHUNK];
        data[5..8].copy_from_slice(b"BGN");
        data[SCAN_CHUNK + 1..SCAN_CHUNK + 4].copy_from_slice(b"BGN");
        data[2 * SCAN_CHUNK..2 * SCAN_CHUNK + 3].copy_from_slice(b"BGN");
        let mut c = Cursor::new(data);

        let limit = 3 * SCAN_CHUNK as u64 - 3;
        assert_eq!(find_backward(&mut c, b"BGN", limit).unwrap(), Some(2 * SCAN_CHUNK as u64));
        assert_eq!(find_backward(&mut c, b"BGN", 2 * SCAN_CHUNK as u64 - 1).unwrap(), Some(SCAN_CHUNK as u64 + 1));
        assert_eq!(find_backward(&mut c, b"BGN", SCAN_CHUNK as u64).unwrap(), Some(5));
        assert_eq!(find_backward(&mut c, b"BGN", 4).unwrap(), None);
    }

    #[test]
    fn backward_match_at_start_of_stream() {
        let mut c = Cursor::new(b"BGNxxxxxx".to_vec());
        assert_eq!(find_backward(&mut c, b"BGN", 6).unwrap(), Some(0));
    }
}
