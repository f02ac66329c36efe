//! A directory of preset cards, and the host-side operations on it.
//!
//! ```no_run
//! use pngpreset::library::PresetLibrary;
//! use pngpreset::preset::RawPresetCodec;
//!
//! let lib = PresetLibrary::new("Preset");
//! for card in lib.list(&mut RawPresetCodec)? {
//!     println!("{} ({} B)", card.file_name, card.preset.bytes.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use chrono::Local;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::chunk::{is_image_path, IMAGE_EXTENSION};
use crate::container::{read_base_record, read_extended, write_container_file, ContainerError};
use crate::preset::{card_file_name, CardName, PresetDeserializer, PresetHandle, PresetSerializer, PresetType};
use crate::provider::ExtendedPayloadProvider;

#[derive(Debug, Clone)]
pub struct PresetLibrary {
    root: PathBuf,
}

impl PresetLibrary {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_owned() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every card in the library, sorted by file name.
    ///
    /// Plain PNGs are skipped silently; unreadable files are logged and
    /// skipped. A missing directory is an empty library.
    pub fn list<D: PresetDeserializer>(&self, deserializer: &mut D) -> io::Result<Vec<PresetHandle<D::Preset>>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e)                                          => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e)                                         => return Err(e),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_path(p))
            .collect();
        paths.sort();

        let mut cards = Vec::new();
        for path in paths {
            match load_card(&path, deserializer) {
                Ok(Some(card)) => cards.push(card),
                Ok(None)       => {}
                Err(e)         => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable card"),
            }
        }
        Ok(cards)
    }

    /// Copy cards into the library.
    ///
    /// Non-PNG paths, files already inside the library, and images without
    /// a preset are skipped. Copies are named `<stem>_<unix millis>.png`,
    /// with a `_<n>` suffix when that name is taken; an existing card is
    /// never overwritten. A failed copy is logged and does not stop the
    /// rest. Returns the new paths.
    pub fn import<P, D>(&self, paths: &[P], deserializer: &mut D) -> io::Result<Vec<PathBuf>>
    where
        P: AsRef<Path>,
        D: PresetDeserializer,
    {
        fs::create_dir_all(&self.root)?;
        let root = fs::canonicalize(&self.root)?;
        let mut imported = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if !is_image_path(path) {
                continue;
            }
            let parent = path.parent().and_then(|p| fs::canonicalize(p).ok());
            if parent.as_deref() == Some(root.as_path()) {
                continue;
            }

            match load_card(path, deserializer) {
                Ok(Some(_)) => {}
                Ok(None)    => continue,
                Err(e)      => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot read dropped file");
                    continue;
                }
            }

            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            match copy_unique(path, &self.root, &stem, Local::now().timestamp_millis()) {
                Ok(dest) => {
                    tracing::info!(from = %path.display(), to = %dest.display(), "card imported");
                    imported.push(dest);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "card import failed"),
            }
        }
        Ok(imported)
    }

    /// Save `subject` as a new card with `thumbnail` as its image.
    ///
    /// The provider's staged payload, if any, becomes the extended block and
    /// is cleared on the provider. The card is written to a temporary file
    /// and renamed into place.
    pub fn save_card<S: PresetSerializer>(
        &self,
        thumbnail:  &[u8],
        name:       &CardName,
        serializer: &S,
        subject:    &S::Subject,
        kind:       PresetType,
        provider:   &mut dyn ExtendedPayloadProvider,
    ) -> Result<PathBuf, ContainerError> {
        fs::create_dir_all(&self.root)?;
        let record   = serializer.serialize(subject, kind)?;
        let extended = take_staged(provider);

        let dest = self.root.join(card_file_name(name, Local::now().naive_local()));
        write_container_file(&dest, thumbnail, &record, extended.as_deref())?;

        tracing::info!(
            path = %dest.display(),
            kind = kind.name(),
            record = record.len(),
            extended = extended.as_ref().map(|e| e.len()),
            "card saved"
        );
        Ok(dest)
    }
}

/// Read a card from disk; `Ok(None)` for plain images.
pub fn load_card<D: PresetDeserializer>(path: &Path, deserializer: &mut D) -> io::Result<Option<PresetHandle<D::Preset>>> {
    let mut f = File::open(path)?;
    let name  = path.to_string_lossy();
    read_base_record(&mut f, &name, deserializer)
}

/// Hand a card's extended payload to `provider`.
///
/// Does nothing (and returns `None`) when the provider is unavailable or
/// the card has no extended block.
pub fn load_extended<R: Read + Seek>(
    reader:   &mut R,
    provider: &mut dyn ExtendedPayloadProvider,
) -> Result<Option<Vec<u8>>, ContainerError> {
    if !provider.is_available() {
        return Ok(None);
    }
    let payload = read_extended(reader)?;
    if let Some(p) = &payload {
        tracing::debug!(provider = provider.name(), len = p.len(), "staging extended payload");
        provider.set(Some(p.clone()));
    }
    Ok(payload)
}

/// Copy `src` into `dir` under the first free `<stem>_<stamp>[_<n>].png`.
fn copy_unique(src: &Path, dir: &Path, stem: &str, stamp: i64) -> io::Result<PathBuf> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    io::copy(&mut File::open(src)?, tmp.as_file_mut())?;

    let mut n = 0u32;
    loop {
        let name = match n {
            0 => format!("{stem}_{stamp}.{IMAGE_EXTENSION}"),
            _ => format!("{stem}_{stamp}_{n}.{IMAGE_EXTENSION}"),
        };
        let dest = dir.join(name);
        match tmp.persist_noclobber(&dest) {
            Ok(_) => return Ok(dest),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                n += 1;
            }
            Err(e) => return Err(e.error),
        }
    }
}

fn take_staged(provider: &mut dyn ExtendedPayloadProvider) -> Option<Vec<u8>> {
    if !provider.is_available() {
        return None;
    }
    let staged = provider.get();
    if staged.is_some() {
        provider.set(None);
    }
    staged
}
