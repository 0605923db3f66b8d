use alloc::vec::Vec;

use crate::region::data::Checksum;

/// Volume up-case table, holding only the units that do not map to themselves
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UpcaseTable {
    // Sorted by source unit
    mappings: Vec<(u16, u16)>,
}

impl UpcaseTable {
    pub fn to_upper(&self, unit: u16) -> u16 {
        match self.mappings.binary_search_by_key(&unit, |&(from, _)| from) {
            Ok(index) => self.mappings[index].1,
            Err(_) => unit,
        }
    }

    pub fn equals(&self, left: &[u16], right: &[u16]) -> bool {
        left.len() == right.len()
            && left.iter().zip(right.iter()).all(|(&l, &r)| self.to_upper(l) == self.to_upper(r))
    }
}

/// ASCII folding, used when a volume carries no table
impl Default for UpcaseTable {
    fn default() -> Self {
        let mappings = (b'a'..=b'z').map(|c| (c as u16, c as u16 - 0x20)).collect();
        Self { mappings }
    }
}

/// Streaming decoder of the compressed on-disk table
///
/// A 0xFFFF unit is followed by the length of a run of identity mappings.
#[derive(Debug, Default)]
pub(crate) struct Decoder {
    mappings: Vec<(u16, u16)>,
    index: u32,
    run_pending: bool,
    checksum: Checksum,
}

impl Decoder {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.checksum.write(bytes);
        for pair in bytes.chunks_exact(2) {
            let unit = u16::from_le_bytes([pair[0], pair[1]]);
            if self.run_pending {
                self.run_pending = false;
                self.index = self.index.saturating_add(unit as u32);
                continue;
            }
            if unit == 0xFFFF {
                self.run_pending = true;
                continue;
            }
            if self.index <= u16::MAX as u32 && unit as u32 != self.index {
                self.mappings.push((self.index as u16, unit));
            }
            self.index += 1;
        }
    }

    pub fn checksum(&self) -> u32 {
        self.checksum.sum()
    }

    /// Units beyond the end of the table map to themselves
    pub fn finish(self) -> UpcaseTable {
        UpcaseTable { mappings: self.mappings }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn compressed() -> Vec<u8> {
        let mut units = alloc::vec![0xFFFFu16, 0x61];
        units.extend(0x41..=0x5Au16);
        units.extend([0xFFFF, 0x65]);
        // Latin-1 lower case letters, the division sign excepted
        units.extend((0xE0..=0xFEu16).map(|unit| if unit == 0xF7 { unit } else { unit - 0x20 }));
        units.push(0x178);
        units.iter().flat_map(|unit| unit.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_compressed() {
        let bytes = compressed();
        let mut decoder = Decoder::default();
        for chunk in bytes.chunks(8) {
            decoder.feed(chunk);
        }
        let mut checksum = Checksum::default();
        checksum.write(&bytes);
        assert_eq!(decoder.checksum(), checksum.sum());
        let table = decoder.finish();
        assert_eq!(table.mappings.len(), 26 + 30 + 1);
        assert_eq!(table.to_upper(b'q' as u16), b'Q' as u16);
        assert_eq!(table.to_upper(0xE9), 0xC9);
        assert_eq!(table.to_upper(0xF7), 0xF7);
        assert_eq!(table.to_upper(0xFF), 0x178);
        assert_eq!(table.to_upper(0x3B1), 0x3B1);
    }

    #[test]
    fn test_equals() {
        let table = UpcaseTable::default();
        let left: Vec<u16> = "Hello.TXT".encode_utf16().collect();
        let right: Vec<u16> = "HELLO.txt".encode_utf16().collect();
        assert!(table.equals(&left, &right));
        assert!(!table.equals(&left, &right[..8]));
        assert_eq!(table.to_upper(0xE9), 0xE9);
    }
}
