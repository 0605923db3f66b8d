//! Pure transforms between textual names and their on-disk forms

pub(crate) mod lfn;
pub(crate) mod pattern;
pub(crate) mod sfn;

use bitflags::bitflags;

use crate::codepage::CodePage;
use crate::error::InputError;
use crate::file::Name;
use crate::region::data::short::{DELETED, DELETED_ESCAPE};

bitflags! {
    /// How faithfully a name maps to its 8.3 form
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub(crate) struct NameStatus: u8 {
        /// The short form lost information, a numbered tail is required
        const LOSS = 0x01;
        /// Long name entries are required
        const LFN = 0x02;
        /// Body is all lower case
        const BODY = 0x08;
        /// Extension is all lower case
        const EXT = 0x10;
    }
}

/// Characters refused anywhere in a name
const ILLEGAL: &[u8] = b"\"*:<>?|\x7F";
/// Characters valid in long names only, replaced in short names
const LONG_ONLY: &[u8] = b"+,;=[]";

/// One path component prepared for lookup and creation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ParsedName {
    /// UTF-16 name without trailing dots and spaces
    pub units: Name,
    /// Upper cased 8.3 form, space padded
    pub short: [u8; 11],
    pub status: NameStatus,
}

fn is_upper(unit: u16) -> bool {
    (b'A' as u16..=b'Z' as u16).contains(&unit)
}

fn is_lower(unit: u16) -> bool {
    (b'a' as u16..=b'z' as u16).contains(&unit)
}

/// Parse one component, `.` and `..` are handled by the path resolver
pub(crate) fn parse(component: &str, codepage: &dyn CodePage) -> Result<ParsedName, InputError> {
    let mut units = Name::new();
    for unit in component.encode_utf16() {
        if unit < 0x20 || (unit < 0x80 && ILLEGAL.contains(&(unit as u8))) {
            return Err(InputError::InvalidName);
        }
        units.push(unit).map_err(|_| InputError::InvalidName)?;
    }
    while let Some(&last) = units.last() {
        if last != b' ' as u16 && last != b'.' as u16 {
            break;
        }
        units.pop();
    }
    if units.is_empty() {
        return Err(InputError::InvalidName);
    }
    let (short, status) = short_form(&units, codepage);
    Ok(ParsedName { units, short, status })
}

/// Derive the 8.3 form of a long name
fn short_form(units: &[u16], codepage: &dyn CodePage) -> ([u8; 11], NameStatus) {
    let mut status = NameStatus::empty();
    let leading = units.iter().take_while(|&&unit| unit == b' ' as u16).count();
    if leading > 0 || units[leading] == b'.' as u16 {
        status |= NameStatus::LOSS | NameStatus::LFN;
    }
    // Index past the last dot, zero when there is no extension
    let dot = units.iter().rposition(|&unit| unit == b'.' as u16).map(|i| i + 1).unwrap_or(0);

    let mut short = [b' '; 11];
    // Case seen in the body (bits 2, 3) and the extension (bits 0, 1)
    let mut case = 0u8;
    let (mut i, mut limit) = (0, 8);
    let mut si = leading;
    while si < units.len() {
        let mut unit = units[si];
        si += 1;
        if unit == b' ' as u16 || (unit == b'.' as u16 && si != dot) {
            status |= NameStatus::LOSS | NameStatus::LFN;
            continue;
        }
        if i >= limit || si == dot {
            if limit == 11 {
                status |= NameStatus::LOSS | NameStatus::LFN;
                break;
            }
            if si != dot {
                status |= NameStatus::LOSS | NameStatus::LFN;
            }
            if si > dot {
                break;
            }
            si = dot;
            i = 8;
            limit = 11;
            case <<= 2;
            continue;
        }
        if unit >= 0x80 {
            status |= NameStatus::LFN;
            unit = codepage.from_unicode(codepage.to_upper(unit)) as u16;
        }
        let byte = if unit == 0 || (unit < 0x80 && LONG_ONLY.contains(&(unit as u8))) {
            status |= NameStatus::LOSS | NameStatus::LFN;
            b'_'
        } else {
            if is_upper(unit) {
                case |= 2;
            }
            if is_lower(unit) {
                case |= 1;
                unit -= 0x20;
            }
            unit as u8
        };
        short[i] = byte;
        i += 1;
    }
    if short[0] == DELETED {
        short[0] = DELETED_ESCAPE;
    }
    if limit == 8 {
        case <<= 2;
    }
    if case & 0x0C == 0x0C || case & 0x03 == 0x03 {
        status |= NameStatus::LFN;
    }
    if !status.contains(NameStatus::LFN) {
        if case & 0x01 != 0 {
            status |= NameStatus::EXT;
        }
        if case & 0x04 != 0 {
            status |= NameStatus::BODY;
        }
    }
    (short, status)
}

/// Decode UTF-16 units, unpaired surrogates become `?`
pub(crate) fn to_string(units: &[u16]) -> alloc::string::String {
    char::decode_utf16(units.iter().copied()).map(|c| c.unwrap_or('?')).collect()
}
