//! Card splitter: turn preset cards back into plain preset files.
//!
//! For `card.png` it writes `card.preset` (the base record) and, when the
//! card has an extended block, `card.preset.expreset.xml` (the decompressed
//! payload). Every input is handled on its own; a bad file is reported and
//! the batch goes on.
//!
//! Outputs are first written to temporary files next to their final
//! location and only renamed into place once every output of that input is
//! complete, so a failure never leaves half-written files behind.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::chunk::is_image_path;
use crate::container::{copy_span, probe, ContainerLayout, Probe};
use crate::envelope::{self, EnvelopeError};
use crate::extended::MAGIC_LEN;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Extended block is corrupt: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("Base record truncated: expected {expected} B, copied {copied} B")]
    ShortRecord { expected: u64, copied: u64 },
    #[error("Output {} is already claimed by {}", output.display(), first.display())]
    OutputCollision { output: PathBuf, first: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for [`split_file`] / [`split_all`].
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Where outputs go. `None` writes next to each input.
    pub output_dir:       Option<PathBuf>,
    /// Extension of the base-record output, without the dot.
    pub preset_extension: String,
    /// Appended (after a dot) to the preset file name for the extended output.
    pub extended_suffix:  String,
    /// Process inputs concurrently. Needs the `parallel` feature.
    pub parallel:         bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            output_dir:       None,
            preset_extension: "preset".into(),
            extended_suffix:  "expreset.xml".into(),
            parallel:         false,
        }
    }
}

impl SplitOptions {
    /// `(preset path, extended path)` for `input`.
    pub fn output_paths(&self, input: &Path) -> (PathBuf, PathBuf) {
        let dir = match &self.output_dir {
            Some(d) => d.clone(),
            None    => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let stem   = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let preset = format!("{stem}.{}", self.preset_extension);
        let ext    = format!("{preset}.{}", self.extended_suffix);
        (dir.join(preset), dir.join(ext))
    }
}

/// Why an input produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAFile,
    /// Wrong extension.
    NotAnImage,
    /// PNG extension but no terminal chunk.
    NotAValidImage,
    NoPreset,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::NotAFile       => "is not a file",
            SkipReason::NotAnImage     => "is not a PNG file",
            SkipReason::NotAValidImage => "is not a valid PNG file",
            SkipReason::NoPreset       => "does not contain a preset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    Split { preset: PathBuf, extended: Option<PathBuf> },
    Skipped(SkipReason),
}

/// Per-input results of a batch, in input order.
#[derive(Debug, Default)]
pub struct SplitReport {
    pub results: Vec<(PathBuf, Result<SplitOutcome, SplitError>)>,
}

impl SplitReport {
    pub fn converted(&self) -> usize {
        self.results.iter().filter(|(_, r)| matches!(r, Ok(SplitOutcome::Split { .. }))).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|(_, r)| matches!(r, Ok(SplitOutcome::Skipped(_)))).count()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_err()).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} converted, {} skipped, {} failed",
            self.converted(),
            self.skipped(),
            self.failures()
        )
    }
}

/// Split one card.
pub fn split_file(path: &Path, opts: &SplitOptions) -> Result<SplitOutcome, SplitError> {
    if !path.is_file() {
        return Ok(SplitOutcome::Skipped(SkipReason::NotAFile));
    }
    if !is_image_path(path) {
        return Ok(SplitOutcome::Skipped(SkipReason::NotAnImage));
    }

    let mut src = File::open(path)?;
    let layout = match probe(&mut src)? {
        Probe::NotAnImage     => return Ok(SplitOutcome::Skipped(SkipReason::NotAValidImage)),
        Probe::NoPreset       => return Ok(SplitOutcome::Skipped(SkipReason::NoPreset)),
        Probe::Preset(layout) => layout,
    };
    tracing::debug!(path = %path.display(), ?layout, "card layout");

    let (preset_path, ext_path) = opts.output_paths(path);
    let preset_tmp = write_record(&mut src, &layout, &preset_path)?;
    let ext_tmp = match layout.extended {
        Some(span) => {
            src.seek(SeekFrom::Start(span.payload_start()))?;
            Some(write_extended(&mut src, &ext_path)?)
        }
        None => None,
    };

    // Everything decoded; only now do the outputs appear. The extended file
    // goes first and is removed again if the preset cannot be placed.
    let extended = match ext_tmp {
        Some(tmp) => {
            tmp.persist(&ext_path).map_err(|e| e.error)?;
            Some(ext_path)
        }
        None => None,
    };
    if let Err(e) = preset_tmp.persist(&preset_path) {
        if let Some(ext) = &extended {
            let _ = std::fs::remove_file(ext);
        }
        return Err(e.error.into());
    }
    tracing::info!(output = %preset_path.display(), bytes = layout.record_len(), "preset written");
    if let Some(ext) = &extended {
        tracing::info!(output = %ext.display(), "extended data written");
    }

    Ok(SplitOutcome::Split { preset: preset_path, extended })
}

fn temp_beside(target: &Path) -> io::Result<NamedTempFile> {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => NamedTempFile::new_in(dir),
        _                                        => NamedTempFile::new_in("."),
    }
}

fn write_record(src: &mut File, layout: &ContainerLayout, target: &Path) -> Result<NamedTempFile, SplitError> {
    let tmp = temp_beside(target)?;
    let expected = layout.record_len();
    let copied = {
        let mut w = BufWriter::new(tmp.as_file());
        let n = copy_span(src, &mut w, layout.record_start, expected)?;
        w.flush()?;
        n
    };
    if copied != expected {
        return Err(SplitError::ShortRecord { expected, copied });
    }
    Ok(tmp)
}

fn write_extended(src: &mut File, target: &Path) -> Result<NamedTempFile, SplitError> {
    let tmp = temp_beside(target)?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        envelope::decode_to(src, MAGIC_LEN, &mut w)?;
        w.flush()?;
    }
    Ok(tmp)
}

/// For each input, the earlier input whose outputs it would overwrite.
///
/// Only PNG paths claim outputs; anything else is skipped before writing.
fn output_claims<P: AsRef<Path>>(paths: &[P], opts: &SplitOptions) -> Vec<Option<PathBuf>> {
    let mut owners: HashMap<PathBuf, PathBuf> = HashMap::new();
    paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            if !is_image_path(p) {
                return None;
            }
            let (preset, _) = opts.output_paths(p);
            match owners.get(&preset) {
                Some(first) => Some(first.clone()),
                None => {
                    owners.insert(preset, p.to_path_buf());
                    None
                }
            }
        })
        .collect()
}

/// Split one input and log the result line.
fn split_logged(path: &Path, claimed_by: Option<&Path>, opts: &SplitOptions) -> Result<SplitOutcome, SplitError> {
    let result = match claimed_by {
        Some(first) => Err(SplitError::OutputCollision {
            output: opts.output_paths(path).0,
            first:  first.to_path_buf(),
        }),
        None => split_file(path, opts),
    };
    match &result {
        Ok(SplitOutcome::Skipped(reason)) => {
            tracing::warn!("{} {}. Skipping...", path.display(), reason.describe());
        }
        Ok(SplitOutcome::Split { .. }) => {}
        Err(e) => tracing::error!("Failed to convert {}: {}", path.display(), e),
    }
    result
}

/// Split every input, isolating failures per file.
///
/// When two inputs map to the same outputs (same stem with `output_dir`),
/// the first one wins and the later ones fail with
/// [`SplitError::OutputCollision`].
pub fn split_all<P: AsRef<Path> + Sync>(paths: &[P], opts: &SplitOptions) -> SplitReport {
    let claims = output_claims(paths, opts);

    #[cfg(feature = "parallel")]
    {
        if opts.parallel {
            use rayon::prelude::*;

            // par_iter + collect keeps input order.
            let results = paths
                .par_iter()
                .zip(claims.par_iter())
                .map(|(p, c)| (p.as_ref().to_path_buf(), split_logged(p.as_ref(), c.as_deref(), opts)))
                .collect();
            return SplitReport { results };
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        if opts.parallel {
            tracing::warn!("built without the `parallel` feature; processing sequentially");
        }
    }

    let results = paths
        .iter()
        .zip(&claims)
        .map(|(p, c)| (p.as_ref().to_path_buf(), split_logged(p.as_ref(), c.as_deref(), opts)))
        .collect();
    SplitReport { results }
}
