//! sdsrec - Recover SDS records from damaged captures
//!
//! This tool scans a binary capture for SDS record headers, validates the
//! self-describing payload of every candidate, and prints decoded records
//! to stdout for the reinjection pipeline. Diagnostics for the offset
//! indexer go to stderr; the two streams never interleave.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use sdsrec_core::{
    event_line, Datum, Record, RecordRenderer, Recoverer, RecoveryConfig, RecoveryEvent,
    RecoverySink,
};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Recover SDS records from a damaged capture
#[derive(Parser, Debug)]
#[command(name = "sdsrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input capture to scan
    file: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Additional spacer values to accept (hex); repeatable
    #[arg(long = "spacer", value_name = "HEX", value_parser = parse_hex_u32)]
    spacers: Vec<u32>,

    /// Largest declared payload to read, in bytes
    #[arg(long, default_value = "268435456")]
    max_record_size: u64,
}

/// Parse a spacer value given as hex, with or without a 0x prefix.
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{s}': {e}"))
}

/// Writes the record stream to stdout and diagnostics to stderr.
struct StreamSink {
    renderer: RecordRenderer,
}

impl StreamSink {
    fn new() -> Self {
        Self {
            renderer: RecordRenderer::new(),
        }
    }
}

impl RecoverySink for StreamSink {
    fn record(&mut self, sequence: u64, record: &Record, datums: &[Datum<'_>]) {
        print!("{}", self.renderer.render(sequence, record, datums));
    }

    fn event(&mut self, event: &RecoveryEvent) {
        eprintln!("{}", event_line(event));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; log output shares stderr with the diagnostic
    // stream so stdout stays a pure record stream.
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let Some(path) = cli.file else {
        // A missing input is not an error for this tool; wrapper scripts
        // depend on the clean exit status.
        Cli::command().print_help()?;
        return Ok(());
    };

    let metadata = std::fs::metadata(&path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    let file_size = metadata.len();
    eprintln!(
        "\nOpened file {} size ({:08x}) {} bytes",
        path.display(),
        file_size,
        file_size
    );

    let mut file =
        File::open(&path).with_context(|| format!("Error opening file '{}'", path.display()))?;

    let mut config = RecoveryConfig::new().max_record_size(cli.max_record_size);
    for spacer in &cli.spacers {
        config = config.accept_spacer(*spacer);
    }
    debug!("accepting {} spacer values", config.spacers.len());

    let mut sink = StreamSink::new();
    let summary = Recoverer::with_config(config).recover(&mut file, file_size, &mut sink);

    eprintln!("End of file reached");
    eprintln!("\ncorruption count ({})", summary.corruption_events);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdsrec_core::CountingSink;
    use std::io::Write;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x83ff").unwrap(), 0x83ff);
        assert_eq!(parse_hex_u32("0X2ABB").unwrap(), 0x2abb);
        assert_eq!(parse_hex_u32("7ff2").unwrap(), 0x7ff2);
        assert!(parse_hex_u32("0xgg").is_err());
        assert!(parse_hex_u32("").is_err());
    }

    #[test]
    fn test_spacer_flag_extends_acceptance() {
        // One aligned record with an unlisted spacer value.
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0x1f2eu32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(b"a\x001\x002\x00x\x00");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        // Rejected under the default allowlist.
        let mut sink = CountingSink::default();
        let summary = sdsrec_core::recover_file(file.path(), &mut sink).unwrap();
        assert_eq!(summary.records, 0);

        // Accepted once the flag value is folded into the config, the way
        // main() does it.
        let config = RecoveryConfig::new().accept_spacer(parse_hex_u32("0x1f2e").unwrap());
        let mut sink = CountingSink::default();
        let summary =
            sdsrec_core::recover_file_with_config(file.path(), config, &mut sink).unwrap();
        assert_eq!(summary.records, 1);
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
