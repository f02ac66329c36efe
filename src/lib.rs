pub mod envelope;
pub mod scan;
pub mod chunk;
pub mod extended;
pub mod preset;
pub mod container;
pub mod provider;
pub mod library;
pub mod split;

#[cfg(test)]
mod testutil;

pub use envelope::{EnvelopeError, EnvelopeHeader};
pub use chunk::locate_terminal_chunk;
pub use extended::{locate_extended_block, BEGIN_MAGIC, END_MAGIC};
pub use container::{build_container, read_base_record, write_container, write_container_file, ContainerError, ContainerLayout, Probe};
pub use provider::{ExtendedPayloadProvider, NoopProvider, ProviderRegistry, StagedPayload};
pub use split::{split_all, split_file, SplitError, SplitOptions, SplitOutcome};

/// Install the stdout `tracing` subscriber used by the binaries.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .try_init();
}
