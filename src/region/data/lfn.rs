use crate::endian::Little as LE;
use crate::file::Attributes;

/// Set on the ordinal of the entry holding the end of the name
pub(crate) const LAST_LONG_ENTRY: u8 = 0x40;
pub(crate) const UNITS_PER_ENTRY: usize = 13;
/// 255 units need at most 20 entries
pub(crate) const MAX_LONG_ENTRIES: usize = 20;

/// Long name fragment, stored in reverse order right before its short entry
#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct LfnEntry {
    pub ordinal: u8,
    pub name1: [LE<u16>; 5],
    pub attributes: u8,
    pub entry_type: u8,
    pub checksum: u8,
    pub name2: [LE<u16>; 6],
    pub cluster: LE<u16>,
    pub name3: [LE<u16>; 2],
}

impl LfnEntry {
    pub fn new(ordinal: u8, checksum: u8, units: &[u16; UNITS_PER_ENTRY]) -> Self {
        let mut entry = Self {
            ordinal,
            attributes: Attributes::LONG_NAME.bits(),
            checksum,
            ..Default::default()
        };
        entry.set_units(units);
        entry
    }

    /// Sequence number counted from 1
    pub fn sequence(&self) -> u8 {
        self.ordinal & !LAST_LONG_ENTRY
    }

    pub fn is_last(&self) -> bool {
        self.ordinal & LAST_LONG_ENTRY != 0
    }

    pub fn units(&self) -> [u16; UNITS_PER_ENTRY] {
        let (name1, name2, name3) = (self.name1, self.name2, self.name3);
        let mut units = [0u16; UNITS_PER_ENTRY];
        let fragments = name1.iter().chain(name2.iter()).chain(name3.iter());
        for (unit, fragment) in units.iter_mut().zip(fragments) {
            *unit = fragment.to_ne();
        }
        units
    }

    pub fn set_units(&mut self, units: &[u16; UNITS_PER_ENTRY]) {
        let mut name1 = [LE::default(); 5];
        let mut name2 = [LE::default(); 6];
        let mut name3 = [LE::default(); 2];
        let fragments = name1.iter_mut().chain(name2.iter_mut()).chain(name3.iter_mut());
        for (fragment, &unit) in fragments.zip(units.iter()) {
            *fragment = unit.into();
        }
        self.name1 = name1;
        self.name2 = name2;
        self.name3 = name3;
    }
}
