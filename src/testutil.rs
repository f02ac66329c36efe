//! Fixtures shared by the unit tests.

/// PNG chunk with a correct CRC.
pub fn chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
    out
}

/// A complete 1x1 grayscale PNG.
pub fn tiny_png() -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
    // zlib stored block holding one filter byte and one pixel
    png.extend(chunk(b"IDAT", &[0x78, 0x01, 0x01, 0x02, 0x00, 0xFD, 0xFF, 0, 0, 0x00, 0x02, 0x00, 0x01]));
    png.extend(chunk(b"IEND", &[]));
    png
}

/// A base record as the host writes it: tag first, then opaque fields.
pub fn preset_record(body: &[u8]) -> Vec<u8> {
    let mut rec = crate::container::PRESET_TAG.to_vec();
    rec.extend_from_slice(&1290u32.to_le_bytes());
    rec.extend_from_slice(body);
    rec
}
