use crate::region::data::lfn::{LAST_LONG_ENTRY, LfnEntry, MAX_LONG_ENTRIES, UNITS_PER_ENTRY};

/// Scratch capacity of a long name being assembled, one above the longest name
pub(crate) const SCRATCH_UNITS: usize = 256;

const INVALID: u8 = 0xFF;

/// Collects long name entries, met in reverse order, until the short entry shows up
pub(crate) struct LongNameAssembler {
    units: [u16; SCRATCH_UNITS],
    ordinal: u8,
    checksum: u8,
}

impl Default for LongNameAssembler {
    fn default() -> Self {
        Self { units: [0; SCRATCH_UNITS], ordinal: INVALID, checksum: 0 }
    }
}

impl LongNameAssembler {
    pub(crate) fn reset(&mut self) {
        self.ordinal = INVALID;
    }

    /// Feed the next long name entry, returns false once the sequence is broken
    pub(crate) fn feed(&mut self, entry: &LfnEntry) -> bool {
        if entry.is_last() {
            self.checksum = entry.checksum;
            self.ordinal = entry.sequence();
        }
        let valid = entry.sequence() == self.ordinal
            && entry.checksum == self.checksum
            && self.pick(entry);
        self.ordinal = if valid { self.ordinal - 1 } else { INVALID };
        valid
    }

    fn pick(&mut self, entry: &LfnEntry) -> bool {
        let cluster = entry.cluster;
        let sequence = entry.sequence() as usize;
        if cluster.to_ne() != 0 || sequence == 0 || sequence > MAX_LONG_ENTRIES {
            return false;
        }
        let mut index = (sequence - 1) * UNITS_PER_ENTRY;
        let mut last = 1;
        for unit in entry.units() {
            if last == 0 {
                if unit != 0xFFFF {
                    return false;
                }
                continue;
            }
            if index >= SCRATCH_UNITS {
                return false;
            }
            self.units[index] = unit;
            index += 1;
            last = unit;
        }
        if entry.is_last() && last != 0 {
            if index >= SCRATCH_UNITS {
                return false;
            }
            self.units[index] = 0;
        }
        true
    }

    /// The assembled name if every entry arrived and it belongs to `checksum`
    pub(crate) fn finish(&self, checksum: u8) -> Option<&[u16]> {
        if self.ordinal != 0 || self.checksum != checksum {
            return None;
        }
        let length = self.units.iter().position(|&unit| unit == 0).unwrap_or(SCRATCH_UNITS);
        Some(&self.units[..length])
    }
}

/// Build the long name entry with 1 based `sequence`, units past the end are 0 then 0xFFFF
pub(crate) fn encode(units: &[u16], sequence: u8, checksum: u8) -> LfnEntry {
    let mut index = (sequence as usize - 1) * UNITS_PER_ENTRY;
    let mut fragment = [0u16; UNITS_PER_ENTRY];
    let mut unit = 0;
    for slot in fragment.iter_mut() {
        if unit != 0xFFFF {
            unit = units.get(index).copied().unwrap_or(0);
            index += 1;
        }
        *slot = unit;
        if unit == 0 {
            unit = 0xFFFF;
        }
    }
    let mut ordinal = sequence;
    if unit == 0xFFFF || index >= units.len() {
        ordinal |= LAST_LONG_ENTRY;
    }
    LfnEntry::new(ordinal, checksum, &fragment)
}

/// Number of long name entries needed for a name
pub(crate) fn entries_for(units: &[u16]) -> usize {
    units.len().div_ceil(UNITS_PER_ENTRY)
}
