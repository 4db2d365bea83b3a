//! Self-describing SDS field scanning.
//!
//! Each datum inside a record payload is encoded as three NUL-terminated
//! text fields followed by a value region:
//!
//! - name: terminated text
//! - type: terminated text; parses to one of eight known codes below 28
//! - length: terminated text; parses to the value size in bytes
//! - value: exactly `length` bytes; termination depends on the type
//!
//! INT, STRING and FLOAT values carry their own terminator, and the
//! terminated length must equal the declared length. CHAR, VOID and
//! BASE64 values may embed NUL bytes and are taken as opaque. STRUCT and
//! STRUCT_LIST values hold a nested datum sequence and are walked
//! recursively.

use tracing::trace;

use crate::error::{Error, Result};

/// Exclusive upper bound for SDS type codes
pub const TYPE_MAX: i64 = 28;

/// SDS datum type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    /// Integer in text form, terminated
    Int = 1,
    /// Raw character data, possibly embedding NUL bytes
    Char = 6,
    /// Text, terminated
    String = 7,
    /// Float in text form, terminated
    Float = 16,
    /// Nested datum sequence
    Struct = 21,
    /// Opaque payload; interpretation undocumented
    Void = 22,
    /// Nested datum sequence (distinction from STRUCT undocumented)
    StructList = 24,
    /// Base64 payload, never decoded, length-checked only
    Base64 = 27,
}

impl TypeTag {
    /// Numeric wire code for this type
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True for types whose value region holds a nested datum sequence
    pub fn is_nested(self) -> bool {
        matches!(self, TypeTag::Struct | TypeTag::StructList)
    }

    /// True for types whose value must carry its own terminator
    pub fn is_terminated(self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::String | TypeTag::Float)
    }
}

impl TryFrom<i64> for TypeTag {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(TypeTag::Int),
            6 => Ok(TypeTag::Char),
            7 => Ok(TypeTag::String),
            16 => Ok(TypeTag::Float),
            21 => Ok(TypeTag::Struct),
            22 => Ok(TypeTag::Void),
            24 => Ok(TypeTag::StructList),
            27 => Ok(TypeTag::Base64),
            _ => Err(Error::datum_format(
                0,
                format!("unknown type code: {value}"),
            )),
        }
    }
}

/// Parse an integer with C `atoi` semantics: optional leading whitespace,
/// optional sign, then leading ASCII digits. Trailing junk is ignored and
/// input without digits parses to 0.
pub fn ascii_int(text: &[u8]) -> i64 {
    let mut idx = 0;
    while idx < text.len() && text[idx].is_ascii_whitespace() {
        idx += 1;
    }

    let mut negative = false;
    if idx < text.len() && (text[idx] == b'+' || text[idx] == b'-') {
        negative = text[idx] == b'-';
        idx += 1;
    }

    let mut value: i64 = 0;
    while idx < text.len() && text[idx].is_ascii_digit() {
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(text[idx] - b'0'));
        idx += 1;
    }

    if negative {
        -value
    } else {
        value
    }
}

/// One decoded name/type/length/value field.
///
/// All byte views borrow from the owning record's payload; nothing is
/// copied out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum<'a> {
    /// Field name bytes, without the terminator. Not required to be UTF-8.
    pub name: &'a [u8],
    /// Decoded type tag
    pub type_tag: TypeTag,
    /// Declared value length in bytes
    pub declared_len: usize,
    /// Value bytes, exactly `declared_len` long
    pub value: &'a [u8],
    /// Nested datums; non-empty only for STRUCT/STRUCT_LIST
    pub children: Vec<Datum<'a>>,
}

impl Datum<'_> {
    /// Field name as text, lossily converted
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.name)
    }

    /// Value text up to its terminator (or the whole value if none),
    /// lossily converted
    pub fn value_lossy(&self) -> std::borrow::Cow<'_, str> {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        String::from_utf8_lossy(&self.value[..end])
    }
}

/// Fields scanned from a single datum, before nested descent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedDatum<'a> {
    /// Field name bytes, without the terminator
    pub name: &'a [u8],
    /// Decoded type tag
    pub type_tag: TypeTag,
    /// Declared value length in bytes
    pub declared_len: usize,
    /// Value bytes
    pub value: &'a [u8],
    /// Total bytes consumed: three terminated text fields plus the value
    pub consumed: usize,
}

/// Locate the first NUL at or after `from`, returning its index.
fn find_nul(window: &[u8], from: usize) -> Option<usize> {
    window[from..].iter().position(|&b| b == 0).map(|i| from + i)
}

/// Scan a single datum from the start of `window`.
///
/// The window length is the hard scan bound; this function never reads
/// past it. Pure and deterministic: the same window always yields the
/// same result.
pub fn scan_datum(window: &[u8]) -> Result<ScannedDatum<'_>> {
    let name_nul = find_nul(window, 0)
        .ok_or_else(|| Error::datum_format(0, "unterminated name field"))?;
    let name = &window[..name_nul];
    let type_start = name_nul + 1;
    // The terminated name length always equals the distance to the type
    // field once the first NUL is pinned; empty names are allowed.
    debug_assert_eq!(name.len() + 1, type_start);

    let type_nul = find_nul(window, type_start)
        .ok_or_else(|| Error::datum_format(type_start, "unterminated type field"))?;
    let type_code = ascii_int(&window[type_start..type_nul]);
    if type_code >= TYPE_MAX {
        return Err(Error::datum_format(
            type_start,
            format!("type code {type_code} out of range"),
        ));
    }
    let type_tag = TypeTag::try_from(type_code)
        .map_err(|_| Error::datum_format(type_start, format!("unknown type code: {type_code}")))?;

    let len_start = type_nul + 1;
    let len_nul = find_nul(window, len_start)
        .ok_or_else(|| Error::datum_format(len_start, "unterminated length field"))?;
    let declared = ascii_int(&window[len_start..len_nul]);

    // The declared length must be positive and leave room in the window,
    // measured from the start of the length field.
    let remaining = (window.len() - len_start).saturating_sub(1) as i64;
    if declared <= 0 || declared >= remaining {
        return Err(Error::datum_format(
            len_start,
            format!("declared length {declared} does not fit the window"),
        ));
    }
    let declared = declared as usize;

    let value_start = len_nul + 1;
    let value_end = value_start + declared;
    if value_end > window.len() {
        return Err(Error::datum_format(
            value_start,
            "value region extends past the window",
        ));
    }
    let value = &window[value_start..value_end];

    // INT, STRING and FLOAT values must be terminated at exactly the
    // declared length. The other types may embed NUL bytes.
    if type_tag.is_terminated() {
        match value.iter().position(|&b| b == 0) {
            Some(nul) if nul + 1 == declared => {}
            _ => {
                return Err(Error::datum_format(
                    value_start,
                    "value termination does not match declared length",
                ))
            }
        }
    }

    Ok(ScannedDatum {
        name,
        type_tag,
        declared_len: declared,
        value,
        consumed: value_end,
    })
}

/// Walk a payload as a datum sequence, recursing into nested structures.
///
/// Returns the decoded datums plus the number of bytes consumed. A
/// consumed count short of the payload length marks the corruption
/// boundary: everything before it parsed cleanly, nothing after it can be
/// trusted. A nested walk that fails mid-value fails the whole sequence,
/// with consumption counted down to the deepest good byte.
pub fn walk_datums(payload: &[u8]) -> (Vec<Datum<'_>>, usize) {
    let mut datums = Vec::new();
    let mut cursor = 0;

    while cursor < payload.len() {
        let scanned = match scan_datum(&payload[cursor..]) {
            Ok(scanned) => scanned,
            Err(err) => {
                trace!("datum scan failed {} bytes in: {err}", cursor);
                break;
            }
        };

        let mut children = Vec::new();
        if scanned.type_tag.is_nested() {
            let value_start = cursor + scanned.consumed - scanned.declared_len;
            let (nested, nested_consumed) = walk_datums(scanned.value);
            if nested_consumed < scanned.value.len() {
                return (datums, value_start + nested_consumed);
            }
            children = nested;
        }

        datums.push(Datum {
            name: scanned.name,
            type_tag: scanned.type_tag,
            declared_len: scanned.declared_len,
            value: scanned.value,
            children,
        });
        cursor += scanned.consumed;
    }

    (datums, cursor)
}

/// Validate a record payload, returning the number of unconsumed trailing
/// bytes. Zero means the payload is fully consistent; anything else
/// pinpoints how far from the declared end the corruption starts.
pub fn validate_payload(payload: &[u8]) -> usize {
    let (_, consumed) = walk_datums(payload);
    payload.len() - consumed
}
