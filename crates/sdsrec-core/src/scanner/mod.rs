//! Recovery scanning over a damaged SDS capture.
//!
//! This module contains the outer state machine that walks a capture file
//! end to end and everything it drives: header probing, payload reading,
//! and datum validation.
//!
//! ## Algorithm Overview
//!
//! 1. Probe the 16-byte window at the current offset against the header
//!    acceptance heuristic
//! 2. On acceptance, read the declared payload and walk its datum
//!    sequence
//! 3. A fully-consistent record is emitted and the offset advances by the
//!    whole record
//! 4. Anything else drops the controller back to byte-granular searching
//!
//! The controller alternates between two states. While SEARCHING it has
//! no trusted alignment and probes at every byte offset. While LOCKED the
//! previous record validated and the next header is expected immediately;
//! a miss there is itself a diagnostic.
//!
//! ## Extensibility
//!
//! Acceptance bounds live in [`RecoveryConfig`]; consumers plug in via
//! the [`RecoverySink`] trait:
//!
//! ```no_run
//! use sdsrec_core::scanner::{recover_file, CountingSink};
//!
//! let mut sink = CountingSink::default();
//! let summary = recover_file("./capture.sds", &mut sink)?;
//! println!("{} records recovered", summary.records);
//! # Ok::<(), sdsrec_core::Error>(())
//! ```

mod datum;
mod header;
mod sink;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{Error, Result};

pub use datum::{
    ascii_int, scan_datum, validate_payload, walk_datums, Datum, ScannedDatum, TypeTag, TYPE_MAX,
};
pub use header::{
    has_unknown_spacer, probe, read_record, HeaderVerdict, RawHeader, Record, HEADER_SIZE,
};
pub use sink::{CountingSink, NullSink, RecoverySink};

/// Spacer values observed next to records that otherwise validate.
///
/// The field is undocumented; this set grows as new captures attach fresh
/// values to valid records.
pub const KNOWN_SPACERS: [u32; 4] = [0x0, 0x83ff, 0x7ff2, 0x2abb];

/// Highest header id observed in valid records
pub const MAX_HEADER_ID: u32 = 8;

/// Configuration for a recovery run
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Accepted spacer values
    pub spacers: Vec<u32>,
    /// Highest accepted header id
    pub max_header_id: u32,
    /// Largest declared payload the reader will allocate, in bytes
    pub max_record_size: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            spacers: KNOWN_SPACERS.to_vec(),
            max_header_id: MAX_HEADER_ID,
            max_record_size: 256 * 1024 * 1024, // 256 MiB
        }
    }
}

impl RecoveryConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a spacer value to the allowlist
    pub fn accept_spacer(mut self, spacer: u32) -> Self {
        if !self.spacers.contains(&spacer) {
            self.spacers.push(spacer);
        }
        self
    }

    /// Sets the highest accepted header id
    pub fn max_header_id(mut self, id: u32) -> Self {
        self.max_header_id = id;
        self
    }

    /// Sets the largest declared payload the reader will allocate
    pub fn max_record_size(mut self, size: u64) -> Self {
        self.max_record_size = size;
        self
    }

    /// True if `spacer` is in the allowlist
    pub fn is_known_spacer(&self, spacer: u32) -> bool {
        self.spacers.contains(&spacer)
    }
}

/// Diagnostic events emitted on the controller's side channel.
///
/// These feed a downstream offset-indexing tool and never interleave with
/// the record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryEvent {
    /// A record validated after a stretch of searching; alignment is
    /// trusted again starting at `offset`
    Recovered {
        /// Offset of the record that restored alignment
        offset: u64,
    },
    /// Bytes skipped while searching, reported once alignment returns
    UnreadableRegion {
        /// First skipped offset
        start: u64,
        /// One past the last skipped offset
        end: u64,
    },
    /// Expected a header at `offset` (the previous record validated) and
    /// found none
    HeaderCorruption {
        /// Offset where the header was expected
        offset: u64,
    },
    /// A record's payload failed validation before its declared end
    DataCorruption {
        /// Offset of the record's header
        offset: u64,
        /// Payload offset of the first untrusted byte
        bad_at: u64,
        /// Untrusted bytes between `bad_at` and the declared end
        trailing: u64,
    },
    /// An otherwise plausible header carried a spacer outside the
    /// allowlist
    UnknownSpacer {
        /// Offset of the window
        offset: u64,
        /// The unlisted spacer value
        spacer: u32,
    },
}

/// Final counts from a recovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverySummary {
    /// Fully-valid records emitted
    pub records: u64,
    /// Header and data corruption events
    pub corruption_events: u64,
}

/// Mutable per-run state, threaded explicitly through the scan loop.
#[derive(Debug, Clone, Copy)]
struct ScanState {
    offset: u64,
    locked: bool,
    /// Where the current untrusted region began; meaningful while
    /// searching.
    search_start: u64,
    records: u64,
    corruption_events: u64,
}

/// Drives recovery over a seekable stream
#[derive(Debug, Clone, Default)]
pub struct Recoverer {
    config: RecoveryConfig,
}

impl Recoverer {
    /// Creates a recoverer with the default configuration
    pub fn new() -> Self {
        Self {
            config: RecoveryConfig::default(),
        }
    }

    /// Creates a recoverer with a custom configuration
    pub fn with_config(config: RecoveryConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Scan `reader` from offset 0 to `file_size`, emitting records and
    /// diagnostics into `sink`.
    ///
    /// Nothing that happens mid-stream ends the run: header mismatches,
    /// truncated payloads, malformed datums and even seek/read failures
    /// all funnel into byte-granular resynchronization. The run completes
    /// when the offset passes `file_size`.
    pub fn recover<R, S>(&self, reader: &mut R, file_size: u64, sink: &mut S) -> RecoverySummary
    where
        R: Read + Seek,
        S: RecoverySink,
    {
        let mut state = ScanState {
            offset: 0,
            locked: false,
            search_start: 0,
            records: 0,
            corruption_events: 0,
        };

        debug!("starting recovery over {} bytes", file_size);

        while state.offset < file_size {
            match self.try_record(reader, state.offset, file_size, sink) {
                Ok(record) => {
                    let (datums, consumed) = walk_datums(&record.payload);
                    let declared = record.payload.len() as u64;
                    let trailing = declared - consumed as u64;

                    if trailing == 0 {
                        if !state.locked {
                            if state.offset > state.search_start {
                                sink.event(&RecoveryEvent::UnreadableRegion {
                                    start: state.search_start,
                                    end: state.offset,
                                });
                            }
                            sink.event(&RecoveryEvent::Recovered {
                                offset: state.offset,
                            });
                            trace!("locked at {:#x}", state.offset);
                        }
                        state.locked = true;
                        sink.record(state.records, &record, &datums);
                        state.records += 1;
                        state.offset += HEADER_SIZE as u64 + declared;
                    } else {
                        let good = declared - trailing;
                        sink.event(&RecoveryEvent::DataCorruption {
                            offset: state.offset,
                            bad_at: good,
                            trailing,
                        });
                        state.corruption_events += 1;
                        state.locked = false;
                        // Resume just after the last good byte instead of
                        // skipping the rest of the declared record.
                        state.offset += HEADER_SIZE as u64 + good;
                        state.search_start = state.offset;
                    }
                }
                Err(err) => {
                    trace!("no record at {:#x}: {err}", state.offset);
                    if state.locked {
                        sink.event(&RecoveryEvent::HeaderCorruption {
                            offset: state.offset,
                        });
                        state.corruption_events += 1;
                        state.search_start = state.offset;
                    }
                    state.locked = false;
                    state.offset += 1;
                }
            }
        }

        debug!(
            "recovery complete: {} records, {} corruption events",
            state.records, state.corruption_events
        );

        RecoverySummary {
            records: state.records,
            corruption_events: state.corruption_events,
        }
    }

    /// Probe for a header at `offset` and, on acceptance, read the full
    /// record payload.
    fn try_record<R, S>(
        &self,
        reader: &mut R,
        offset: u64,
        file_size: u64,
        sink: &mut S,
    ) -> Result<Record>
    where
        R: Read + Seek,
        S: RecoverySink,
    {
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|err| Error::stream(offset, err))?;

        let mut window = [0u8; HEADER_SIZE];
        if let Err(err) = reader.read_exact(&mut window) {
            // Too close to the end of the file for a full header window.
            return Err(match err.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::HeaderMismatch { offset },
                _ => Error::stream(offset, err),
            });
        }

        let raw = RawHeader::parse(&window);

        if has_unknown_spacer(&raw, &self.config) {
            sink.event(&RecoveryEvent::UnknownSpacer {
                offset,
                spacer: raw.spacer,
            });
        }

        match probe(&raw, offset, file_size, &self.config) {
            HeaderVerdict::Accepted => {}
            HeaderVerdict::Suspect => {
                debug!(
                    "suspect header at {:#x}: id {:#x} size {:#x}",
                    offset, raw.header_id, raw.declared_size
                );
                return Err(Error::HeaderMismatch { offset });
            }
            HeaderVerdict::Mismatch => return Err(Error::HeaderMismatch { offset }),
        }

        read_record(reader, raw, offset)
    }
}

/// Recover records from the file at `path` with the default
/// configuration.
///
/// This is a convenience wrapper that stats and opens the file, then runs
/// [`Recoverer::recover`]. Only the stat/open steps can fail.
pub fn recover_file(path: impl AsRef<Path>, sink: &mut impl RecoverySink) -> Result<RecoverySummary> {
    recover_file_with_config(path, RecoveryConfig::default(), sink)
}

/// Recover records from the file at `path` with a custom configuration.
pub fn recover_file_with_config(
    path: impl AsRef<Path>,
    config: RecoveryConfig,
    sink: &mut impl RecoverySink,
) -> Result<RecoverySummary> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|err| Error::file_stat(path, err))?;
    let mut file = std::fs::File::open(path).map_err(|err| Error::file_read(path, err))?;
    Ok(Recoverer::with_config(config).recover(&mut file, metadata.len(), sink))
}
