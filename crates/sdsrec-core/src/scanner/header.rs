//! Record header detection and payload reading.
//!
//! An SDS record starts with a 16-byte header of four little-endian
//! 32-bit fields:
//!
//! - header id (observed values are small; at most 8)
//! - spacer (undocumented; constrained to an observed allowlist)
//! - declared payload size
//! - trailer (always zero in valid records)
//!
//! Header detection is a heuristic. While the controller is searching,
//! the acceptance predicate is judged on the window at every byte offset,
//! so it has to reject noise aggressively; the payload walk then arbitrates
//! the survivors.

use std::io::Read;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::scanner::RecoveryConfig;

/// Size of the fixed record header in bytes
pub const HEADER_SIZE: usize = 16;

/// The four raw fields of a 16-byte header window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHeader {
    /// Header id tag
    pub header_id: u32,
    /// Undocumented field, constrained to an observed allowlist
    pub spacer: u32,
    /// Declared payload size in bytes
    pub declared_size: u32,
    /// Zero in every valid record observed so far
    pub trailer: u32,
}

impl RawHeader {
    /// Reinterpret a 16-byte window as header fields.
    pub fn parse(window: &[u8; HEADER_SIZE]) -> Self {
        let word = |i: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&window[i * 4..i * 4 + 4]);
            u32::from_le_bytes(bytes)
        };
        Self {
            header_id: word(0),
            spacer: word(1),
            declared_size: word(2),
            trailer: word(3),
        }
    }
}

/// Probe verdict for one candidate window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVerdict {
    /// The window passes the full acceptance predicate
    Accepted,
    /// Rejected, but enough fields look right that the window is worth
    /// flagging as a possibly-damaged header
    Suspect,
    /// Rejected outright
    Mismatch,
}

impl HeaderVerdict {
    /// True only for [`HeaderVerdict::Accepted`]
    pub fn is_accepted(self) -> bool {
        matches!(self, HeaderVerdict::Accepted)
    }
}

/// Judge whether a header window looks like the start of a record.
///
/// Pure predicate: no I/O, never fails. `Suspect` and `Mismatch` are
/// treated identically for control flow; the distinction only feeds
/// diagnostics.
pub fn probe(
    header: &RawHeader,
    offset: u64,
    file_size: u64,
    config: &RecoveryConfig,
) -> HeaderVerdict {
    let spacer_known = config.is_known_spacer(header.spacer);

    if header.header_id <= config.max_header_id
        && spacer_known
        && header.trailer == 0
        && u64::from(header.declared_size) <= config.max_record_size
    {
        return HeaderVerdict::Accepted;
    }

    // Partial matches are rejected like everything else, but kept
    // distinguishable: the field combination suggests a header that took
    // damage rather than plain noise.
    if header.header_id < config.max_header_id
        || u64::from(header.declared_size) + offset < file_size
        || spacer_known
    {
        return HeaderVerdict::Suspect;
    }

    HeaderVerdict::Mismatch
}

/// True when the window is otherwise plausible but its spacer is not in
/// the allowlist.
///
/// The allowlist is empirical, not specified; unknown values seen next to
/// plausible fields are exactly the ones worth recording for later
/// inclusion.
pub fn has_unknown_spacer(header: &RawHeader, config: &RecoveryConfig) -> bool {
    header.header_id <= config.max_header_id
        && header.trailer == 0
        && !config.is_known_spacer(header.spacer)
}

/// One recovered record: an accepted header plus its owned payload
#[derive(Debug, Clone)]
pub struct Record {
    /// File offset of the 16-byte header
    pub offset: u64,
    /// Header fields as read from the file
    pub header: RawHeader,
    /// Exactly `header.declared_size` payload bytes
    pub payload: Bytes,
}

impl Record {
    /// Declared payload size as a usize
    pub fn declared_size(&self) -> usize {
        self.header.declared_size as usize
    }
}

/// Read the declared payload for an accepted header.
///
/// The reader must be positioned immediately after the header window. A
/// short read fails with [`Error::IncompleteRecord`]; the caller resyncs
/// by one byte, exactly as for a header mismatch.
pub fn read_record<R: Read>(reader: &mut R, header: RawHeader, offset: u64) -> Result<Record> {
    let declared = header.declared_size as usize;
    let mut payload = vec![0u8; declared];
    let mut filled = 0;

    while filled < declared {
        match reader.read(&mut payload[filled..]) {
            Ok(0) => {
                return Err(Error::IncompleteRecord {
                    offset,
                    declared: header.declared_size,
                    available: filled as u64,
                })
            }
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::stream(offset, err)),
        }
    }

    Ok(Record {
        offset,
        header,
        payload: Bytes::from(payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_window(header_id: u32, spacer: u32, declared: u32, trailer: u32) -> [u8; HEADER_SIZE] {
        let mut window = [0u8; HEADER_SIZE];
        window[0..4].copy_from_slice(&header_id.to_le_bytes());
        window[4..8].copy_from_slice(&spacer.to_le_bytes());
        window[8..12].copy_from_slice(&declared.to_le_bytes());
        window[12..16].copy_from_slice(&trailer.to_le_bytes());
        window
    }

    #[test]
    fn test_parse_little_endian_fields() {
        let header = RawHeader::parse(&header_window(3, 0x83ff, 0x1000, 0));
        assert_eq!(header.header_id, 3);
        assert_eq!(header.spacer, 0x83ff);
        assert_eq!(header.declared_size, 0x1000);
        assert_eq!(header.trailer, 0);
    }

    #[test]
    fn test_probe_accepts_known_headers() {
        let config = RecoveryConfig::default();
        for spacer in [0x0, 0x83ff, 0x7ff2, 0x2abb] {
            let header = RawHeader::parse(&header_window(8, spacer, 64, 0));
            assert!(probe(&header, 0, 1024, &config).is_accepted());
        }
    }

    #[test]
    fn test_probe_rejects_field_violations() {
        let config = RecoveryConfig::default();

        // header id above the bound
        let header = RawHeader::parse(&header_window(9, 0x83ff, 64, 0));
        assert!(!probe(&header, 0, 1024, &config).is_accepted());

        // spacer outside the allowlist
        let header = RawHeader::parse(&header_window(1, 0xbeef, 64, 0));
        assert!(!probe(&header, 0, 1024, &config).is_accepted());

        // non-zero trailer
        let header = RawHeader::parse(&header_window(1, 0x83ff, 64, 1));
        assert!(!probe(&header, 0, 1024, &config).is_accepted());
    }

    #[test]
    fn test_accepted_windows_always_satisfy_the_predicate() {
        // Sweep pseudo-random windows; any acceptance must imply the full
        // field predicate under the default configuration.
        let config = RecoveryConfig::default();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..2000 {
            let mut window = [0u8; HEADER_SIZE];
            for byte in window.iter_mut() {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                *byte = seed as u8;
            }
            let header = RawHeader::parse(&window);
            if probe(&header, 0, u64::MAX, &config).is_accepted() {
                assert!(header.header_id <= 8);
                assert!([0x0, 0x83ff, 0x7ff2, 0x2abb].contains(&header.spacer));
                assert_eq!(header.trailer, 0);
            }
        }
    }

    #[test]
    fn test_probe_classifies_suspects() {
        let config = RecoveryConfig::default();

        // valid spacer, everything else wrong
        let header = RawHeader::parse(&header_window(0xffff, 0x7ff2, u32::MAX, 7));
        assert_eq!(probe(&header, 0, 16, &config), HeaderVerdict::Suspect);

        // declared size that would still fit inside the file
        let header = RawHeader::parse(&header_window(0xffff, 0xbeef, 16, 7));
        assert_eq!(probe(&header, 0, 1024, &config), HeaderVerdict::Suspect);

        // nothing plausible at all
        let header = RawHeader::parse(&header_window(0xffff, 0xbeef, u32::MAX, 7));
        assert_eq!(probe(&header, 0, 16, &config), HeaderVerdict::Mismatch);
    }

    #[test]
    fn test_unknown_spacer_detection() {
        let config = RecoveryConfig::default();

        let header = RawHeader::parse(&header_window(1, 0xbeef, 64, 0));
        assert!(has_unknown_spacer(&header, &config));

        // known spacer: nothing to report
        let header = RawHeader::parse(&header_window(1, 0x2abb, 64, 0));
        assert!(!has_unknown_spacer(&header, &config));

        // implausible window: not worth reporting either
        let header = RawHeader::parse(&header_window(500, 0xbeef, 64, 0));
        assert!(!has_unknown_spacer(&header, &config));
    }

    #[test]
    fn test_read_record_exact_payload() {
        let header = RawHeader {
            header_id: 1,
            spacer: 0,
            declared_size: 4,
            trailer: 0,
        };
        let mut stream = std::io::Cursor::new(b"abcdzzz".to_vec());
        let record = read_record(&mut stream, header, 0).unwrap();
        assert_eq!(&record.payload[..], b"abcd");
    }

    #[test]
    fn test_read_record_short_stream() {
        let header = RawHeader {
            header_id: 1,
            spacer: 0,
            declared_size: 16,
            trailer: 0,
        };
        let mut stream = std::io::Cursor::new(b"abcd".to_vec());
        let err = read_record(&mut stream, header, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteRecord {
                declared: 16,
                available: 4,
                ..
            }
        ));
        assert!(err.is_recoverable());
    }
}
