pub(crate) mod entry_type;
pub(crate) mod entryset;
pub(crate) mod lfn;
pub(crate) mod short;

use core::fmt::Debug;

use crate::endian::Little as LE;
use entry_type::RawEntryType;

pub(crate) const ENTRY_SIZE: usize = 32;
pub(crate) type RawEntry = [u8; ENTRY_SIZE];

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct AllocationBitmap {
    pub entry_type: RawEntryType,
    pub bitmap_flags: u8,
    _reserved: [u8; 18],
    pub first_cluster: LE<u32>,
    pub data_length: LE<u64>,
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct UpcaseTable {
    pub entry_type: RawEntryType,
    _reserved1: [u8; 3],
    pub table_checksum: LE<u32>,
    _reserved2: [u8; 12],
    pub first_cluster: LE<u32>,
    pub data_length: LE<u64>,
}

pub(crate) const MAX_LABEL_LENGTH: usize = 11;

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct VolumeLabel {
    pub entry_type: RawEntryType,
    pub character_count: u8,
    pub volume_label: [LE<u16>; MAX_LABEL_LENGTH],
    _reserved: [u8; 8],
}

#[derive(Default, Debug)]
pub(crate) struct Checksum(u32);

impl Checksum {
    pub fn write(&mut self, bytes: &[u8]) {
        let mut sum = self.0;
        for &b in bytes.iter() {
            sum = sum.rotate_right(1).wrapping_add(b as u32);
        }
        self.0 = sum;
    }

    pub fn sum(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use core::mem::size_of;

    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<AllocationBitmap>(), ENTRY_SIZE);
        assert_eq!(size_of::<UpcaseTable>(), ENTRY_SIZE);
        assert_eq!(size_of::<VolumeLabel>(), ENTRY_SIZE);
    }
}
