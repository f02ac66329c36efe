use clap::{Parser, Subcommand};
use pngpreset::chunk::terminal_crc_is_canonical;
use pngpreset::container::{probe, write_container_file, ContainerLayout, Probe};
use pngpreset::envelope::EnvelopeHeader;
use pngpreset::library::PresetLibrary;
use pngpreset::preset::RawPresetCodec;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pngpreset", about = "PNG preset card toolbox", version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a card from an image, a preset and optional extended data
    Pack {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        preset: PathBuf,
        /// Extended payload (stored LZMA-compressed)
        #[arg(long)]
        extended: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show where the image, preset and extended block sit inside a card
    Inspect {
        input: PathBuf,
        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the cards in a preset directory
    List {
        dir: PathBuf,
    },
    /// Copy cards into a preset directory
    Import {
        #[arg(short, long)]
        library: PathBuf,
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    pngpreset::init_logging(cli.verbose);

    match cli.command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { image, preset, extended, output } => {
            let image    = std::fs::read(&image)?;
            let record   = std::fs::read(&preset)?;
            let extended = extended.map(std::fs::read).transpose()?;

            write_container_file(&output, &image, &record, extended.as_deref())?;
            println!("Created: {}", output.display());
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input, json } => {
            let mut f = File::open(&input)?;
            let layout = match probe(&mut f)? {
                Probe::NotAnImage => {
                    println!("{}: no IEND chunk, not a PNG", input.display());
                    return Ok(());
                }
                Probe::NoPreset => {
                    println!("{}: plain PNG, no preset", input.display());
                    return Ok(());
                }
                Probe::Preset(layout) => layout,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
                return Ok(());
            }
            print_layout(&input, &layout, &mut f)?;
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { dir } => {
            let cards = PresetLibrary::new(&dir).list(&mut RawPresetCodec)?;
            println!("{:<48} {:>12}", "Card", "Preset size");
            for card in &cards {
                println!("{:<48} {:>12}", card.file_name, card.preset.bytes.len());
            }
            println!("{} card(s)", cards.len());
        }

        // ── Import ───────────────────────────────────────────────────────────
        Commands::Import { library, files } => {
            let imported = PresetLibrary::new(&library).import(&files, &mut RawPresetCodec)?;
            for path in &imported {
                println!("  imported  {}", path.display());
            }
            println!("{} of {} file(s) imported", imported.len(), files.len());
        }
    }

    Ok(())
}

fn print_layout(input: &Path, layout: &ContainerLayout, f: &mut File) -> Result<(), Box<dyn std::error::Error>> {
    let crc_ok = terminal_crc_is_canonical(f)?;

    println!("── Preset card ──────────────────────────────────────────");
    println!("  Path           {}", input.display());
    println!("  File size      {} B", layout.file_len);
    println!("  Image          0..{} ({})", layout.record_start, if crc_ok { "IEND crc ok" } else { "IEND crc unexpected" });
    println!("  Preset         {}..{} ({} B)", layout.record_start, layout.record_end, layout.record_len());

    match layout.extended {
        None => println!("  Extended       none"),
        Some(span) => {
            println!("  Extended       {}..{} ({} B compressed)", span.payload_start(), span.payload_end(), span.payload_len());
            f.seek(SeekFrom::Start(span.payload_start()))?;
            match EnvelopeHeader::read(&mut *f) {
                Ok(h) => {
                    let params = h.lc_lp_pb()
                        .map(|(lc, lp, pb)| format!("lc={lc} lp={lp} pb={pb}"))
                        .unwrap_or_else(|| "invalid".into());
                    println!("  LZMA props     {} ({params}, dict {} KiB)", hex::encode(h.properties), h.dictionary_size() / 1024);
                    println!("  Uncompressed   {} B", h.uncompressed_size);
                }
                Err(e) => println!("  LZMA header    unreadable: {e}"),
            }
        }
    }
    Ok(())
}
