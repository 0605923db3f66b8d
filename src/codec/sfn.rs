use alloc::string::String;

use crate::codepage::CodePage;
use crate::region::data::short::{CaseFlags, DELETED, DELETED_ESCAPE};

/// Short name with a `~N` tail, sequences above 5 are hashed with the long name
pub(crate) fn numbered(short: &[u8; 11], units: &[u16], sequence: u32) -> [u8; 11] {
    let mut name = *short;
    let mut sequence = sequence;
    if sequence > 5 {
        let mut sreg = sequence;
        for &unit in units {
            let mut unit = unit;
            for _ in 0..16 {
                sreg = (sreg << 1) + (unit & 1) as u32;
                unit >>= 1;
                if sreg & 0x10000 != 0 {
                    sreg ^= 0x11021;
                }
            }
        }
        sequence = sreg;
    }

    let mut tail = [0u8; 8];
    let mut i = 7;
    loop {
        let digit = (sequence % 16) as u8;
        sequence /= 16;
        tail[i] = if digit > 9 { b'A' + digit - 10 } else { b'0' + digit };
        i -= 1;
        if i == 0 || sequence == 0 {
            break;
        }
    }
    tail[i] = b'~';

    let mut j = 0;
    while j < i && name[j] != b' ' {
        j += 1;
    }
    while j < 8 {
        name[j] = if i < 8 { tail[i] } else { b' ' };
        i += 1;
        j += 1;
    }
    name
}

/// Readable form of an 8.3 name, lower cased where `case` says so
///
/// Empty when some byte has no Unicode counterpart.
pub(crate) fn display(short: &[u8; 11], case: CaseFlags, codepage: &dyn CodePage) -> String {
    let mut text = String::with_capacity(12);
    for (i, &byte) in short.iter().enumerate() {
        if byte == b' ' {
            continue;
        }
        let byte = if i == 0 && byte == DELETED_ESCAPE { DELETED } else { byte };
        if i == 8 {
            text.push('.');
        }
        let lower = match i < 8 {
            true => case.contains(CaseFlags::LOWER_BODY),
            false => case.contains(CaseFlags::LOWER_EXTENSION),
        };
        let byte = if lower { byte.to_ascii_lowercase() } else { byte };
        match char::from_u32(codepage.to_unicode(byte) as u32) {
            Some(c) if c != '\0' => text.push(c),
            _ => return String::new(),
        }
    }
    text
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codepage::{ASCII, LATIN1};

    #[test]
    fn test_numbered() {
        let units: heapless::Vec<u16, 32> = "long file name.txt".encode_utf16().collect();
        assert_eq!(&numbered(b"LONGFILETXT", &units, 1), b"LONGFI~1TXT");
        assert_eq!(&numbered(b"LONGFILETXT", &units, 5), b"LONGFI~5TXT");
        assert_eq!(&numbered(b"AB      TXT", &units, 2), b"AB~2    TXT");
        let hashed = numbered(b"LONGFILETXT", &units, 6);
        assert_eq!(hashed[8..], *b"TXT");
        assert!(hashed[..8].contains(&b'~'));
        assert_ne!(hashed, numbered(b"LONGFILETXT", &units, 7));
    }

    #[test]
    fn test_display() {
        assert_eq!(display(b"README  TXT", CaseFlags::empty(), &ASCII), "README.TXT");
        let lower = CaseFlags::LOWER_BODY | CaseFlags::LOWER_EXTENSION;
        assert_eq!(display(b"README  TXT", lower, &ASCII), "readme.txt");
        assert_eq!(display(b"README  TXT", CaseFlags::LOWER_EXTENSION, &ASCII), "README.txt");
        assert_eq!(display(b"MAKEFILE   ", CaseFlags::empty(), &ASCII), "MAKEFILE");
        assert_eq!(display(b"\x05BC        ", CaseFlags::empty(), &LATIN1), "\u{E5}BC");
        assert_eq!(display(b"\xC9       TXT", CaseFlags::empty(), &ASCII), "");
    }
}
