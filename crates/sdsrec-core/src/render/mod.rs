//! Text rendering for recovered records and diagnostics.
//!
//! The record stream layout is fixed: downstream reinjection scripts
//! parse these lines, so everything here is part of the external
//! interface rather than cosmetics. Diagnostic lines follow the layout
//! the offset-indexing tool consumes.

use std::fmt::Write as FmtWrite;

use crate::scanner::{Datum, Record, RecoveryEvent, TypeTag};

/// Configuration for record rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Indentation string per nesting level (default: one tab)
    pub indent_str: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_str: "\t".to_string(),
        }
    }
}

impl RenderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }
}

/// Renders records into the line format expected by reinjection scripts
#[derive(Debug, Clone, Default)]
pub struct RecordRenderer {
    config: RenderConfig,
}

impl RecordRenderer {
    /// Creates a renderer with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer with a custom configuration
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render one record and its datum tree as a text block.
    pub fn render(&self, sequence: u64, record: &Record, datums: &[Datum<'_>]) -> String {
        let mut output = String::new();
        self.write_record(&mut output, sequence, record, datums)
            .expect("String write cannot fail");
        output
    }

    /// Write one record and its datum tree to a writer.
    pub fn write_record(
        &self,
        w: &mut impl FmtWrite,
        sequence: u64,
        record: &Record,
        datums: &[Datum<'_>],
    ) -> std::fmt::Result {
        writeln!(
            w,
            "{:08} - SDS header(0x{:x}) (0x{:04x}) pos 0x{:08x} sz 0x{:04x} ({}) bytes",
            sequence,
            record.header.header_id,
            record.header.spacer,
            record.offset,
            record.header.declared_size,
            record.header.declared_size,
        )?;
        for datum in datums {
            self.write_datum(w, datum, 1)?;
        }
        writeln!(w)
    }

    /// Write one datum line at `depth`, recursing into nested children.
    fn write_datum(&self, w: &mut impl FmtWrite, datum: &Datum<'_>, depth: usize) -> std::fmt::Result {
        for _ in 0..depth {
            w.write_str(&self.config.indent_str)?;
        }

        match datum.type_tag {
            TypeTag::Struct | TypeTag::StructList => {
                writeln!(
                    w,
                    "{:<16} : ({:02}) : {:03}",
                    datum.name_lossy(),
                    datum.type_tag.code(),
                    datum.declared_len,
                )?;
                for child in &datum.children {
                    self.write_datum(w, child, depth + 1)?;
                }
            }
            TypeTag::Void => {
                writeln!(
                    w,
                    "{:<16} : ({:02}) : {:03}\t'{}'",
                    datum.name_lossy(),
                    datum.type_tag.code(),
                    datum.declared_len,
                    void_hex(datum.value),
                )?;
            }
            _ => {
                writeln!(
                    w,
                    "{:<16} : ({:02}) : {:03}\t'{}'",
                    datum.name_lossy(),
                    datum.type_tag.code(),
                    datum.declared_len,
                    datum.value_lossy(),
                )?;
            }
        }
        Ok(())
    }
}

/// VOID payloads have no documented interpretation; show the leading
/// 32-bit little-endian word when one is present, raw byte hex otherwise.
fn void_hex(value: &[u8]) -> String {
    if value.len() >= 4 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&value[..4]);
        format!("{:x}", u32::from_le_bytes(word))
    } else {
        value.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Diagnostic line for one recovery event, in the layout the downstream
/// offset indexer consumes.
pub fn event_line(event: &RecoveryEvent) -> String {
    match event {
        RecoveryEvent::Recovered { offset } => {
            format!("\tvalid hdr    (0x{offset:08x})")
        }
        RecoveryEvent::HeaderCorruption { offset } => {
            format!("\thdr_cor err  (0x{offset:08x})")
        }
        RecoveryEvent::DataCorruption { offset, bad_at, .. } => {
            format!("\tsds_data err (0x{offset:08x}) @(0x{bad_at:x})")
        }
        RecoveryEvent::UnreadableRegion { start, end } => {
            format!("\tjunk region  (0x{start:08x}) - (0x{end:08x})")
        }
        RecoveryEvent::UnknownSpacer { offset, spacer } => {
            format!("\tspacer?      (0x{offset:08x}) 0x{spacer:04x}")
        }
    }
}
