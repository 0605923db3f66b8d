/// Translation between the single byte OEM code used by short names and UTF-16
pub trait CodePage {
    /// Zero when the OEM code has no Unicode counterpart
    fn to_unicode(&self, oem: u8) -> u16;
    /// Zero when the code point is not representable
    fn from_unicode(&self, unicode: u16) -> u8;
    /// Upper case conversion used for case insensitive matching
    fn to_upper(&self, unicode: u16) -> u16 {
        match unicode {
            0x61..=0x7A => unicode - 0x20,
            _ => unicode,
        }
    }
}

/// US-ASCII, extended characters are not representable in short names
#[derive(Copy, Clone, Debug, Default)]
pub struct Ascii;

impl CodePage for Ascii {
    fn to_unicode(&self, oem: u8) -> u16 {
        match oem {
            0x00..=0x7F => oem as u16,
            _ => 0,
        }
    }

    fn from_unicode(&self, unicode: u16) -> u8 {
        match unicode {
            0x00..=0x7F => unicode as u8,
            _ => 0,
        }
    }
}

/// ISO-8859-1, every OEM code maps to the code point of the same value
#[derive(Copy, Clone, Debug, Default)]
pub struct Latin1;

impl CodePage for Latin1 {
    fn to_unicode(&self, oem: u8) -> u16 {
        oem as u16
    }

    fn from_unicode(&self, unicode: u16) -> u8 {
        match unicode {
            0x00..=0xFF => unicode as u8,
            _ => 0,
        }
    }

    fn to_upper(&self, unicode: u16) -> u16 {
        match unicode {
            0x61..=0x7A => unicode - 0x20,
            0xE0..=0xFE if unicode != 0xF7 => unicode - 0x20,
            0xFF => 0x178,
            _ => unicode,
        }
    }
}

pub static ASCII: Ascii = Ascii;
pub static LATIN1: Latin1 = Latin1;
