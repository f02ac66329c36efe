//! LZMA compression envelope for the extended record.
//!
//! # Layout
//! ```text
//! [ properties (5 B) | uncompressed size (u64 LE) | raw LZMA stream ]
//! ```
//! The properties block is the classic LZMA-alone one: a single
//! `lc + 9 * (lp + 5 * pb)` byte followed by the dictionary size (u32 LE).
//! The decoder stops after exactly `uncompressed size` bytes and never looks
//! for an end-of-stream marker, so streams written with or without one both
//! decode. This crate's encoder (liblzma) always appends one.
//!
//! # Trailing padding
//! The stream cannot find its own end, so a caller handing over a window that
//! still ends with `EXTPRESET_END` passes that marker's length as
//! `trailing_padding_len` and the decoder never sees it.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use thiserror::Error;
use xz2::stream::{LzmaOptions, MatchFinder, Mode, Stream};
use xz2::write::XzEncoder;

/// Size of the LZMA properties block.
pub const PROPERTIES_LEN: usize = 5;
/// Properties block plus the u64 size field.
pub const HEADER_LEN: usize = PROPERTIES_LEN + 8;

/// Dictionary size used by the encoder (8 MiB).
pub const DICTIONARY_SIZE: u32 = 1 << 23;
/// Literal context bits.
pub const LC: u8 = 3;
/// Literal position bits.
pub const LP: u8 = 0;
/// Position state bits.
pub const PB: u8 = 2;
/// Match length at which the encoder stops looking for a longer match.
pub const NICE_LEN: u32 = 128;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Envelope header truncated (need {HEADER_LEN} bytes)")]
    TruncatedHeader,
    #[error("Trailing padding of {padding} B exceeds the {available} B left after the header")]
    PaddingExceedsInput { padding: u64, available: u64 },
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The 13-byte header in front of every compressed extended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub properties:        [u8; PROPERTIES_LEN],
    pub uncompressed_size: u64,
}

impl EnvelopeHeader {
    pub fn read<R: Read>(mut reader: R) -> Result<Self, EnvelopeError> {
        let mut properties = [0u8; PROPERTIES_LEN];
        reader.read_exact(&mut properties).map_err(truncated)?;
        let uncompressed_size = reader.read_u64::<LittleEndian>().map_err(truncated)?;
        Ok(Self { properties, uncompressed_size })
    }

    /// `(lc, lp, pb)` unpacked from the first property byte.
    /// Returns `None` for a byte no LZMA encoder can produce.
    pub fn lc_lp_pb(&self) -> Option<(u8, u8, u8)> {
        let mut props = self.properties[0];
        if props >= 9 * 5 * 5 {
            return None;
        }
        let lc = props % 9;
        props /= 9;
        Some((lc, props % 5, props / 5))
    }

    pub fn dictionary_size(&self) -> u32 {
        u32::from_le_bytes([
            self.properties[1],
            self.properties[2],
            self.properties[3],
            self.properties[4],
        ])
    }
}

fn truncated(e: io::Error) -> EnvelopeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        EnvelopeError::TruncatedHeader
    } else {
        EnvelopeError::Io(e)
    }
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Compress `payload` into a freshly allocated envelope.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let stream = Stream::new_lzma_encoder(&encoder_options()?).map_err(compression)?;
    let mut encoder = XzEncoder::new_stream(Vec::with_capacity(HEADER_LEN + payload.len() / 4), stream);
    encoder.write_all(payload)?;
    let mut out = encoder.finish()?;
    if out.len() < HEADER_LEN {
        return Err(EnvelopeError::Compression(format!("encoder emitted only {} bytes", out.len())));
    }
    // liblzma writes "size unknown" (all ones); the envelope always records it.
    LittleEndian::write_u64(&mut out[PROPERTIES_LEN..HEADER_LEN], payload.len() as u64);
    Ok(out)
}

/// Compress `payload` and write the envelope to `writer`.
pub fn encode_to<W: Write>(payload: &[u8], writer: &mut W) -> Result<(), EnvelopeError> {
    writer.write_all(&encode(payload)?)?;
    Ok(())
}

fn encoder_options() -> Result<LzmaOptions, EnvelopeError> {
    let mut options = LzmaOptions::new_preset(6).map_err(compression)?;
    options
        .dict_size(DICTIONARY_SIZE)
        .literal_context_bits(LC.into())
        .literal_position_bits(LP.into())
        .position_bits(PB.into())
        .mode(Mode::Normal)
        .nice_len(NICE_LEN)
        .match_finder(MatchFinder::BinaryTree4);
    Ok(options)
}

fn compression(e: xz2::stream::Error) -> EnvelopeError {
    EnvelopeError::Compression(e.to_string())
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Decode the envelope starting at the reader's current position.
///
/// Everything up to end-of-stream minus `trailing_padding_len` is treated
/// as compressed input.
pub fn decode<R: Read + Seek>(reader: &mut R, trailing_padding_len: u64) -> Result<Vec<u8>, EnvelopeError> {
    let mut out = Vec::new();
    decode_to(reader, trailing_padding_len, &mut out)?;
    Ok(out)
}

/// Decode an in-memory envelope.
pub fn decode_slice(envelope: &[u8], trailing_padding_len: u64) -> Result<Vec<u8>, EnvelopeError> {
    decode(&mut Cursor::new(envelope), trailing_padding_len)
}

/// Streaming form of [`decode`]: decompressed bytes go straight to `writer`.
///
/// Returns the number of bytes produced, which always equals the size
/// recorded in the header.
pub fn decode_to<R, W>(reader: &mut R, trailing_padding_len: u64, writer: &mut W) -> Result<u64, EnvelopeError>
where
    R: Read + Seek,
    W: Write,
{
    let start = reader.stream_position()?;
    let end   = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;

    // The envelope is everything up to the padding; the header must fit in it.
    let available = end.saturating_sub(start);
    let window = available.checked_sub(trailing_padding_len).ok_or(
        EnvelopeError::PaddingExceedsInput { padding: trailing_padding_len, available },
    )?;
    if window < HEADER_LEN as u64 {
        return Err(EnvelopeError::TruncatedHeader);
    }
    let header = EnvelopeHeader::read(&mut *reader)?;
    let compressed_len = window - HEADER_LEN as u64;

    tracing::debug!(
        uncompressed = header.uncompressed_size,
        compressed = compressed_len,
        "decoding extended envelope"
    );

    // lzma-rs still parses the properties block; the size comes from our header.
    let options = lzma_rs::decompress::Options {
        unpacked_size: lzma_rs::decompress::UnpackedSize::UseProvided(Some(header.uncompressed_size)),
        ..Default::default()
    };
    let body = Cursor::new(header.properties).chain(reader.by_ref().take(compressed_len));
    let mut input = BufReader::new(body);
    let mut counted = CountingWriter { inner: writer, written: 0 };
    lzma_rs::lzma_decompress_with_options(&mut input, &mut counted, &options)
        .map_err(|e| EnvelopeError::Decompression(e.to_string()))?;

    if counted.written != header.uncompressed_size {
        return Err(EnvelopeError::Decompression(format!(
            "expected {} bytes, decoded {}",
            header.uncompressed_size, counted.written
        )));
    }
    Ok(counted.written)
}

struct CountingWriter<'a, W: Write> {
    inner:   &'a mut W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
