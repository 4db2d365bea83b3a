//! # sdsrec-core
//!
//! A library for recovering structured records from damaged SDS captures.
//!
//! SDS is a proprietary, partially-documented, length-prefixed container
//! format. This crate locates valid record boundaries inside an otherwise
//! opaque byte stream (even when alignment has been lost), decodes the
//! self-describing field tuples inside each record, and reports the byte
//! ranges it could not trust.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scanner`]: header probing, payload reading, datum scanning and the
//!   resynchronizing recovery controller
//! - [`render`]: record and diagnostic text formatting
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use sdsrec_core::{recover_file, CountingSink};
//!
//! let mut sink = CountingSink::default();
//! let summary = recover_file("./capture.sds", &mut sink)?;
//!
//! println!(
//!     "{} records, {} corruption events",
//!     summary.records, summary.corruption_events
//! );
//! # Ok::<(), sdsrec_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`RecoverySink`]: plug in custom record/diagnostic consumers
//! - [`RecoveryConfig`]: extend the header heuristics (the spacer
//!   allowlist is empirical and grows with new captures)

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod render;
pub mod scanner;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use render::{event_line, RecordRenderer, RenderConfig};
pub use scanner::{
    recover_file, recover_file_with_config, CountingSink, Datum, NullSink, RawHeader, Record,
    Recoverer, RecoveryConfig, RecoveryEvent, RecoverySink, RecoverySummary, TypeTag, HEADER_SIZE,
};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
