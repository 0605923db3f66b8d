use core::fmt::Debug;

use bitfield::bitfield;

use super::super::entry_type::{EntryType, RawEntryType};
use crate::endian::Little as LE;
use crate::types::ClusterID;

pub(crate) const NAME_UNITS_PER_ENTRY: usize = 15;

bitfield! {
    /// General secondary flags
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Flags(u8);
    pub allocation_possible, set_allocation_possible: 0;
    pub no_fat_chain, set_no_fat_chain: 1;
}

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub struct Secondary<T: Copy + Clone + Debug> {
    pub(crate) entry_type: RawEntryType,
    general_secondary_flags: u8,
    pub(crate) custom_defined: T,
    pub(crate) first_cluster: LE<u32>,
    pub(crate) data_length: LE<u64>,
}

impl<T: Copy + Clone + Debug> Secondary<T> {
    pub(crate) fn new(entry_type: EntryType, custom_defined: T) -> Self {
        let mut flags = Flags::default();
        flags.set_allocation_possible(true);
        Self {
            entry_type: RawEntryType::new(entry_type, true),
            general_secondary_flags: flags.0,
            custom_defined,
            first_cluster: LE::default(),
            data_length: LE::default(),
        }
    }

    pub(crate) fn general_secondary_flags(&self) -> Flags {
        Flags(self.general_secondary_flags)
    }

    pub(crate) fn set_general_secondary_flags(&mut self, flags: Flags) {
        self.general_secondary_flags = flags.0
    }

    pub fn first_cluster(&self) -> ClusterID {
        self.first_cluster.to_ne().into()
    }

    pub fn data_length(&self) -> u64 {
        self.data_length.to_ne()
    }
}

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub struct StreamExtension {
    _reserved1: u8,
    pub name_length: u8,
    pub name_hash: LE<u16>,
    _reserved2: [u8; 2],
    pub valid_data_length: LE<u64>,
    _reserved3: [u8; 4],
}

impl StreamExtension {
    pub(crate) fn new(name_length: u8, name_hash: u16) -> Self {
        Self { name_length, name_hash: name_hash.into(), ..Default::default() }
    }
}

impl Secondary<StreamExtension> {
    /// Chain and both sizes, the valid length always follows the data length
    pub(crate) fn set_allocation(&mut self, cluster: ClusterID, size: u64, contiguous: bool) {
        self.first_cluster = u32::from(cluster).into();
        self.data_length = size.into();
        self.custom_defined.valid_data_length = size.into();
        let mut flags = self.general_secondary_flags();
        flags.set_allocation_possible(true);
        flags.set_no_fat_chain(contiguous && cluster.valid());
        self.set_general_secondary_flags(flags);
    }
}

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct Filename {
    pub entry_type: RawEntryType,
    general_secondary_flags: u8,
    pub filename: [LE<u16>; NAME_UNITS_PER_ENTRY],
}

impl Filename {
    pub(crate) fn new(units: &[u16]) -> Self {
        let mut filename = [LE::default(); NAME_UNITS_PER_ENTRY];
        for (slot, &unit) in filename.iter_mut().zip(units.iter()) {
            *slot = unit.into();
        }
        let entry_type = RawEntryType::new(EntryType::Filename, true);
        Self { entry_type, general_secondary_flags: 0, filename }
    }
}
