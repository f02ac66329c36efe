use clap::{CommandFactory, Parser};
use pngpreset::split::{split_all, SplitOptions};
use std::path::PathBuf;

/// Converts PNG preset cards back into plain presets.
///
/// For every card it writes `<name>.preset` and, if the card carries
/// extended data, `<name>.preset.expreset.xml`.
#[derive(Parser)]
#[command(name = "png2preset", version)]
struct Cli {
    /// Write outputs here instead of next to each card
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Convert cards concurrently (needs the `parallel` feature)
    #[arg(long)]
    parallel: bool,
    /// Exit with status 1 if any card failed to convert
    #[arg(long)]
    strict: bool,
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
    /// PNG cards to convert
    files: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.files.is_empty() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    pngpreset::init_logging(cli.verbose);

    if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let opts = SplitOptions {
        output_dir: cli.output_dir,
        parallel:   cli.parallel,
        ..SplitOptions::default()
    };

    let report = split_all(&cli.files, &opts);
    tracing::info!("{}", report.summary());

    if cli.strict && report.failures() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
