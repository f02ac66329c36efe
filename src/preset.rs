//! Base-record seam.
//!
//! The preset record itself belongs to the host application. The codec only
//! needs two things from it: something that can materialize a record
//! starting at a byte offset, and something that can turn a subject into
//! record bytes. [`RawPresetCodec`] is the built-in stand-in that treats
//! the record as an opaque byte span.

use chrono::NaiveDateTime;
use std::io::{self, Read, Seek, SeekFrom};

use crate::container::extended_block_after;

/// Which parts of a character a preset carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetType {
    Wear,
    Body,
    All,
}

impl PresetType {
    pub fn name(self) -> &'static str {
        match self {
            PresetType::Wear => "wear",
            PresetType::Body => "body",
            PresetType::All  => "all",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wear" => Some(PresetType::Wear),
            "body" => Some(PresetType::Body),
            "all"  => Some(PresetType::All),
            _      => None,
        }
    }
}

/// Materializes a base record. Called once per successful read.
pub trait PresetDeserializer {
    type Preset;

    /// `reader` is positioned at `offset`, the first byte of the record tag.
    fn deserialize<R: Read + Seek>(&mut self, reader: &mut R, offset: u64) -> io::Result<Self::Preset>;
}

/// Produces base-record bytes without touching the file system.
pub trait PresetSerializer {
    type Subject;

    fn serialize(&self, subject: &Self::Subject, kind: PresetType) -> io::Result<Vec<u8>>;
}

/// A record read from a card, stamped with the card's file name so it can
/// be written back to the same place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetHandle<P> {
    pub file_name: String,
    pub preset:    P,
}

/// Base record kept as the exact bytes found in the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPreset {
    pub bytes: Vec<u8>,
}

/// Opaque-bytes collaborator.
///
/// Reading takes everything from the tag up to the extended block (or end of
/// file). Writing passes `subject` through unchanged whatever the kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPresetCodec;

impl PresetDeserializer for RawPresetCodec {
    type Preset = RawPreset;

    fn deserialize<R: Read + Seek>(&mut self, reader: &mut R, offset: u64) -> io::Result<RawPreset> {
        let end = match extended_block_after(reader, offset)? {
            Some(begin) => begin,
            None        => reader.seek(SeekFrom::End(0))?,
        };
        let mut bytes = Vec::with_capacity((end - offset) as usize);
        reader.seek(SeekFrom::Start(offset))?;
        reader.by_ref().take(end - offset).read_to_end(&mut bytes)?;
        Ok(RawPreset { bytes })
    }
}

impl PresetSerializer for RawPresetCodec {
    type Subject = Vec<u8>;

    fn serialize(&self, subject: &Vec<u8>, _: PresetType) -> io::Result<Vec<u8>> {
        Ok(subject.clone())
    }
}

// ── Card naming ──────────────────────────────────────────────────────────────

/// The character a card is saved for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardName {
    pub last_name:  String,
    pub first_name: String,
}

/// `pre_<last><first>_<yyyyMMddHHmmss>.png`
pub fn card_file_name(name: &CardName, at: NaiveDateTime) -> String {
    format!(
        "pre_{}{}_{}.{}",
        name.last_name,
        name.first_name,
        at.format("%Y%m%d%H%M%S"),
        crate::chunk::IMAGE_EXTENSION,
    )
}
