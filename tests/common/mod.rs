#![allow(dead_code)]

use pngpreset::container::PRESET_TAG;

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

/// 1x1 grayscale PNG with an optional text chunk before IEND.
pub fn png_with_text(text: Option<&[u8]>) -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
    png.extend(chunk(b"IDAT", &[0x78, 0x01, 0x01, 0x02, 0x00, 0xFD, 0xFF, 0, 0, 0x00, 0x02, 0x00, 0x01]));
    if let Some(t) = text {
        png.extend(chunk(b"tEXt", t));
    }
    png.extend(chunk(b"IEND", &[]));
    png
}

pub fn png() -> Vec<u8> {
    png_with_text(None)
}

pub fn record(body: &[u8]) -> Vec<u8> {
    let mut rec = PRESET_TAG.to_vec();
    rec.extend_from_slice(body);
    rec
}

/// Something that looks like the companion's XML document.
pub fn expreset_xml(items: usize) -> Vec<u8> {
    let mut xml = b"<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ExPreset>".to_vec();
    for i in 0..items {
        xml.extend_from_slice(format!("<mpn name=\"item{i}\" value=\"{}\"/>", i * 31 % 97).as_bytes());
    }
    xml.extend_from_slice(b"</ExPreset>");
    xml
}
