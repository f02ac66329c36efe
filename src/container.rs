//! Preset card container: writer, reader and layout probe.
//!
//! # Layout
//! ```text
//! [ PNG … IEND crc ][ base record (starts with PRESET_TAG) ][ extended block? ]
//! ```
//! No length field ties the regions together. The reader finds the image end
//! by scanning for `IEND`, checks the tag, and finds the extended block by
//! its trailing marker. A tool that keeps trailing bytes intact keeps the
//! card valid.

use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::chunk::{is_image_path, locate_terminal_chunk};
use crate::envelope::{self, EnvelopeError};
use crate::extended::{locate_extended_block, ExtendedSpan, BEGIN_MAGIC, END_MAGIC, MAGIC_LEN};
use crate::preset::{PresetDeserializer, PresetHandle};

/// Tag that opens every base record: the host's length-prefixed string
/// `"CM3D2_PRESET"` (one length byte, then 12 ASCII bytes).
pub const PRESET_TAG: &[u8; PRESET_TAG_LEN] = b"\x0cCM3D2_PRESET";
pub const PRESET_TAG_LEN: usize = 13;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Extended block: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Write a card: image, base record, then the extended block if any.
///
/// The image and record are written verbatim; `extended` is compressed and
/// wrapped as `BEGIN_MAGIC | envelope | END_MAGIC`.
pub fn write_container<W: Write>(
    writer:      &mut W,
    image:       &[u8],
    base_record: &[u8],
    extended:    Option<&[u8]>,
) -> Result<(), ContainerError> {
    writer.write_all(image)?;
    writer.write_all(base_record)?;
    if let Some(payload) = extended {
        writer.write_all(BEGIN_MAGIC)?;
        envelope::encode_to(payload, writer)?;
        writer.write_all(END_MAGIC)?;
    }
    Ok(())
}

/// In-memory form of [`write_container`].
pub fn build_container(image: &[u8], base_record: &[u8], extended: Option<&[u8]>) -> Result<Vec<u8>, ContainerError> {
    let mut out = Vec::with_capacity(image.len() + base_record.len());
    write_container(&mut out, image, base_record, extended)?;
    Ok(out)
}

/// Write a card to `path`, replacing any file already there.
///
/// The card goes to a temporary file in the same directory first, so a
/// failed write leaves `path` untouched.
pub fn write_container_file<P: AsRef<Path>>(
    path:        P,
    image:       &[u8],
    base_record: &[u8],
    extended:    Option<&[u8]>,
) -> Result<(), ContainerError> {
    let path = path.as_ref();
    let tmp = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => NamedTempFile::new_in(dir)?,
        _                                        => NamedTempFile::new_in(".")?,
    };
    {
        let mut w = BufWriter::new(tmp.as_file());
        write_container(&mut w, image, base_record, extended)?;
        w.flush()?;
    }
    tmp.persist(path).map_err(|e| ContainerError::Io(e.error))?;
    Ok(())
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// `true` if the bytes at the reader's position are [`PRESET_TAG`].
/// A stream that ends first simply has no tag.
pub fn has_preset_tag<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut tag = [0u8; PRESET_TAG_LEN];
    match reader.read_exact(&mut tag) {
        Ok(())                                                 => Ok(&tag == PRESET_TAG),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e)                                                 => Err(e),
    }
}

/// Read the base record of the card named `file_name`.
///
/// `Ok(None)` means "plain image": the name is not a PNG, there is no
/// `IEND`, or no tag follows it. On success the deserializer has been run
/// once from the record start and the handle carries `file_name`. The
/// reader's position afterwards is unspecified.
pub fn read_base_record<R, D>(
    reader:       &mut R,
    file_name:    &str,
    deserializer: &mut D,
) -> io::Result<Option<PresetHandle<D::Preset>>>
where
    R: Read + Seek,
    D: PresetDeserializer,
{
    if !is_image_path(file_name) {
        return Ok(None);
    }
    let Some(record_start) = locate_terminal_chunk(reader)? else {
        return Ok(None);
    };
    if !has_preset_tag(reader)? {
        tracing::debug!(file_name, "IEND found but no preset follows");
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(record_start))?;
    let preset = deserializer.deserialize(reader, record_start)?;
    Ok(Some(PresetHandle { file_name: file_name.to_owned(), preset }))
}

/// Start of the extended block belonging to the record at `record_start`.
///
/// A begin marker that would overlap the record's own tag cannot open a
/// block and is ignored.
pub fn extended_block_after<R: Read + Seek>(reader: &mut R, record_start: u64) -> io::Result<Option<u64>> {
    Ok(locate_extended_block(reader)?.filter(|&begin| begin >= record_start + PRESET_TAG_LEN as u64))
}

/// Decode the extended payload of a card, if it has one.
pub fn read_extended<R: Read + Seek>(reader: &mut R) -> Result<Option<Vec<u8>>, ContainerError> {
    let Some(begin) = locate_extended_block(reader)? else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(begin + MAGIC_LEN))?;
    Ok(Some(envelope::decode(reader, MAGIC_LEN)?))
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// Region boundaries of a card, as recovered by scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ContainerLayout {
    pub file_len:     u64,
    /// First byte after the IEND CRC; the tag starts here.
    pub record_start: u64,
    /// End of the base record: the begin marker, or end of file.
    pub record_end:   u64,
    pub extended:     Option<ExtendedSpan>,
}

impl ContainerLayout {
    pub fn record_len(&self) -> u64 {
        self.record_end - self.record_start
    }
}

/// What a file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// No terminal chunk.
    NotAnImage,
    /// A PNG with nothing preset-shaped after IEND.
    NoPreset,
    Preset(ContainerLayout),
}

/// Scan a stream and report its card layout.
pub fn probe<R: Read + Seek>(reader: &mut R) -> io::Result<Probe> {
    let Some(record_start) = locate_terminal_chunk(reader)? else {
        return Ok(Probe::NotAnImage);
    };
    if !has_preset_tag(reader)? {
        return Ok(Probe::NoPreset);
    }
    let file_len = reader.seek(SeekFrom::End(0))?;
    let extended = extended_block_after(reader, record_start)?.map(|begin| ExtendedSpan { begin, file_len });
    let record_end = extended.map(|e| e.begin).unwrap_or(file_len);
    Ok(Probe::Preset(ContainerLayout { file_len, record_start, record_end, extended }))
}

/// Probe a file on disk.
pub fn probe_file<P: AsRef<Path>>(path: P) -> io::Result<Probe> {
    let mut f = std::fs::File::open(path)?;
    probe(&mut f)
}

/// Probe an in-memory card.
pub fn probe_bytes(card: &[u8]) -> io::Result<Probe> {
    probe(&mut Cursor::new(card))
}

/// Copy `len` bytes starting at `offset`, through a bounded buffer.
/// Stops early if the source ends; returns the bytes copied.
pub fn copy_span<R, W>(reader: &mut R, writer: &mut W, offset: u64, len: u64) -> io::Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    reader.seek(SeekFrom::Start(offset))?;
    io::copy(&mut reader.by_ref().take(len), writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{PresetDeserializer, RawPresetCodec};
    use crate::testutil::{preset_record, tiny_png};

    #[test]
    fn write_then_read_base_record() {
        let png = tiny_png();
        let rec = preset_record(b"maid body");
        let card = build_container(&png, &rec, None).unwrap();

        let handle = read_base_record(&mut Cursor::new(&card), "pre_Card.png", &mut RawPresetCodec)
            .unwrap()
            .unwrap();
        assert_eq!(handle.file_name, "pre_Card.png");
        assert_eq!(handle.preset.bytes, rec);
    }

    #[test]
    fn non_png_name_is_not_a_card() {
        let card = build_container(&tiny_png(), &preset_record(b""), None).unwrap();
        let r = read_base_record(&mut Cursor::new(&card), "card.preset", &mut RawPresetCodec).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn wrong_tag_is_not_a_card() {
        let card = build_container(&tiny_png(), b"\x0cCM3D2_MENU!!extra", None).unwrap();
        let r = read_base_record(&mut Cursor::new(&card), "x.png", &mut RawPresetCodec).unwrap();
        assert!(r.is_none());
        assert_eq!(probe_bytes(&card).unwrap(), Probe::NoPreset);
    }

    #[test]
    fn plain_png_probe() {
        assert_eq!(probe_bytes(&tiny_png()).unwrap(), Probe::NoPreset);
        assert_eq!(probe_bytes(b"not an image").unwrap(), Probe::NotAnImage);
    }

    #[test]
    fn layout_with_extended_block() {
        let png = tiny_png();
        let rec = preset_record(b"record");
        let ext = b"<ExPreset/>".repeat(30);
        let card = build_container(&png, &rec, Some(&ext)).unwrap();

        let Probe::Preset(layout) = probe_bytes(&card).unwrap() else {
            panic!("expected a preset");
        };
        assert_eq!(layout.record_start, png.len() as u64);
        assert_eq!(layout.record_len(), rec.len() as u64);

        let span = layout.extended.unwrap();
        let envelope_bytes = &card[span.payload_start() as usize..span.payload_end() as usize];
        assert_eq!(envelope_bytes, envelope::encode(&ext).unwrap());
        assert_eq!(read_extended(&mut Cursor::new(&card)).unwrap(), Some(ext));
    }

    #[test]
    fn no_extended_block_reads_none() {
        let card = build_container(&tiny_png(), &preset_record(b"r"), None).unwrap();
        assert_eq!(read_extended(&mut Cursor::new(&card)).unwrap(), None);
    }

    #[test]
    fn record_and_probe_agree_on_marker_inside_tag_region() {
        // A "record" that opens with the begin marker: no block can start there.
        let png = tiny_png();
        let mut bytes = png.clone();
        bytes.extend_from_slice(BEGIN_MAGIC);
        bytes.extend_from_slice(&envelope::encode(b"x").unwrap());
        bytes.extend_from_slice(END_MAGIC);
        let start = png.len() as u64;

        let mut c = Cursor::new(&bytes);
        assert_eq!(locate_extended_block(&mut c).unwrap(), Some(start));
        assert_eq!(extended_block_after(&mut c, start).unwrap(), None);

        let raw = RawPresetCodec.deserialize(&mut c, start).unwrap();
        assert_eq!(raw.bytes, &bytes[start as usize..]);
    }

    #[test]
    fn container_file_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, b"old").unwrap();

        write_container_file(&path, &tiny_png(), &preset_record(b"new"), Some(&b"<x/>"[..])).unwrap();
        let card = std::fs::read(&path).unwrap();
        assert_eq!(card, build_container(&tiny_png(), &preset_record(b"new"), Some(&b"<x/>"[..])).unwrap());

        // Target is a directory: the write fails and leaves no temp file behind.
        let blocked = dir.path().join("blocked.png");
        std::fs::create_dir(&blocked).unwrap();
        assert!(write_container_file(&blocked, &tiny_png(), &preset_record(b"r"), None).is_err());
        assert!(blocked.is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn copy_span_is_bounded_by_source() {
        let mut src = Cursor::new(b"0123456789".to_vec());
        let mut out = Vec::new();
        assert_eq!(copy_span(&mut src, &mut out, 7, 100).unwrap(), 3);
        assert_eq!(out, b"789");
    }
}
