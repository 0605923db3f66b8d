use super::super::entry_type::{EntryType, RawEntryType};
use crate::datetime::{DateTime, Timestamp, UTCOffset};
use crate::endian::Little as LE;
use crate::file::Attributes;
use crate::upcase_table::UpcaseTable;

#[derive(Copy, Clone, Default, Debug)]
#[repr(C, packed(1))]
pub struct FileDirectory {
    pub(crate) entry_type: RawEntryType,
    pub(crate) secondary_count: u8,
    pub(crate) set_checksum: LE<u16>,
    pub(crate) file_attributes: LE<u16>,
    _reserved1: [u8; 2],
    create_timestamp: LE<u32>,
    last_modified_timestamp: LE<u32>,
    last_accessed_timestamp: LE<u32>,
    create_10ms_increment: u8,
    last_modified_10ms_increment: u8,
    create_utc_offset: u8,
    last_modified_utc_offset: u8,
    last_accessed_utc_offset: u8,
    _reserved2: [u8; 7],
}

impl FileDirectory {
    pub(crate) fn new(secondary_count: u8, attributes: Attributes, now: DateTime) -> Self {
        let mut file_directory = FileDirectory {
            entry_type: RawEntryType::new(EntryType::FileDirectory, true),
            secondary_count,
            file_attributes: (attributes.bits() as u16).into(),
            ..Default::default()
        };
        file_directory.set_create_timestamp(now);
        file_directory.set_last_modified_timestamp(now);
        file_directory.set_last_accessed_timestamp(now);
        file_directory
    }

    pub fn file_attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.file_attributes.to_ne() as u8)
    }

    pub(crate) fn set_file_attributes(&mut self, attributes: Attributes) {
        let reserved = self.file_attributes.to_ne() & 0xFFC0;
        self.file_attributes = (reserved | attributes.bits() as u16).into();
    }

    pub(crate) fn set_create_timestamp(&mut self, datetime: DateTime) {
        self.create_timestamp = u32::from(datetime.timestamp).into();
        self.create_10ms_increment = Self::increment(&datetime);
        self.create_utc_offset = datetime.utc_offset.raw();
    }

    pub fn last_modified_timestamp(&self) -> DateTime {
        DateTime {
            timestamp: Timestamp::from_raw(self.last_modified_timestamp.to_ne()),
            millisecond: self.last_modified_10ms_increment as u16 * 10,
            utc_offset: UTCOffset::from_raw(self.last_modified_utc_offset),
        }
    }

    pub(crate) fn set_last_modified_timestamp(&mut self, datetime: DateTime) {
        self.last_modified_timestamp = u32::from(datetime.timestamp).into();
        self.last_modified_10ms_increment = Self::increment(&datetime);
        self.last_modified_utc_offset = datetime.utc_offset.raw();
    }

    pub(crate) fn set_last_accessed_timestamp(&mut self, datetime: DateTime) {
        self.last_accessed_timestamp = u32::from(datetime.timestamp).into();
        self.last_accessed_utc_offset = datetime.utc_offset.raw();
    }

    /// Sub two-second part in 10ms units, 0..=199
    fn increment(datetime: &DateTime) -> u8 {
        (datetime.millisecond / 10).min(199) as u8
    }
}

/// Entry set and name hash checksum, 16-bit rotate and add
pub(crate) struct Checksum(u16);

impl Checksum {
    pub(crate) fn new() -> Self {
        Self(0)
    }

    pub(crate) fn write(&mut self, value: u8) {
        self.0 = self.0.rotate_right(1).wrapping_add(value as u16)
    }

    pub(crate) fn sum(&self) -> u16 {
        self.0
    }
}

/// Hash of the up-cased name kept in the stream extension
pub(crate) fn name_hash(name: &[u16], upcase_table: &UpcaseTable) -> u16 {
    let mut checksum = Checksum::new();
    for &unit in name {
        let unit = upcase_table.to_upper(unit);
        checksum.write(unit as u8);
        checksum.write((unit >> 8) as u8);
    }
    checksum.sum()
}

#[cfg(test)]
mod test {
    use core::mem::size_of;

    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<FileDirectory>(), 32);
    }

    #[test]
    fn test_name_hash_is_case_insensitive() {
        let table = UpcaseTable::default();
        let lower: heapless::Vec<u16, 8> = "readme".encode_utf16().collect();
        let upper: heapless::Vec<u16, 8> = "README".encode_utf16().collect();
        assert_eq!(name_hash(&lower, &table), name_hash(&upper, &table));
        let other: heapless::Vec<u16, 8> = "README2".encode_utf16().collect();
        assert_ne!(name_hash(&other, &table), name_hash(&upper, &table));
    }

    #[test]
    fn test_attributes_keep_reserved_bits() {
        let mut file_directory = FileDirectory::new(2, Attributes::ARCHIVE, DateTime::FIXED);
        file_directory.file_attributes = 0x8020.into();
        file_directory.set_file_attributes(Attributes::READ_ONLY);
        assert_eq!(file_directory.file_attributes.to_ne(), 0x8001);
        assert_eq!(file_directory.file_attributes(), Attributes::READ_ONLY);
    }
}
