use crate::datetime::Timestamp;
use crate::endian::Little as LE;
use crate::file::Attributes;
use crate::types::ClusterID;

/// Marks a deleted entry
pub(crate) const DELETED: u8 = 0xE5;
/// Stands for a leading 0xE5 in a live name
pub(crate) const DELETED_ESCAPE: u8 = 0x05;

bitflags::bitflags! {
    /// Case information of short names without a long name
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub(crate) struct CaseFlags: u8 {
        const LOWER_BODY = 0x08;
        const LOWER_EXTENSION = 0x10;
    }
}

/// Legacy 8.3 directory entry
#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct ShortEntry {
    pub name: [u8; 11],
    pub attributes: u8,
    pub case: u8,
    pub create_time_tenth: u8,
    pub create_timestamp: LE<u32>,
    pub access_date: LE<u16>,
    pub cluster_high: LE<u16>,
    pub modified_timestamp: LE<u32>,
    pub cluster_low: LE<u16>,
    pub file_size: LE<u32>,
}

impl ShortEntry {
    pub fn new(name: [u8; 11], case: CaseFlags, attributes: Attributes, now: Timestamp) -> Self {
        let timestamp = LE::from(u32::from(now));
        Self {
            name,
            attributes: attributes.bits(),
            case: case.bits(),
            create_timestamp: timestamp,
            modified_timestamp: timestamp,
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_retain(self.attributes)
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes & 0x3F == Attributes::LONG_NAME.bits()
    }

    pub fn is_volume_label(&self) -> bool {
        !self.is_long_name() && self.attributes().contains(Attributes::VOLUME)
    }

    pub fn case(&self) -> CaseFlags {
        CaseFlags::from_bits_truncate(self.case)
    }

    /// The high word is meaningful on FAT32 only
    pub fn cluster(&self, fat32: bool) -> ClusterID {
        let low = self.cluster_low.to_ne() as u32;
        match fat32 {
            true => ClusterID::from((self.cluster_high.to_ne() as u32) << 16 | low),
            false => ClusterID::from(low),
        }
    }

    pub fn set_cluster(&mut self, cluster: ClusterID, fat32: bool) {
        let value = u32::from(cluster);
        self.cluster_low = (value as u16).into();
        if fat32 {
            self.cluster_high = ((value >> 16) as u16).into();
        }
    }

    pub fn modified(&self) -> Timestamp {
        Timestamp::from_raw(self.modified_timestamp.to_ne())
    }

    pub fn set_modified(&mut self, timestamp: Timestamp) {
        self.modified_timestamp = u32::from(timestamp).into();
        self.access_date = 0.into();
    }

    pub fn file_size(&self) -> u32 {
        self.file_size.to_ne()
    }

    /// Checksum binding long name entries to this short name
    pub fn checksum(&self) -> u8 {
        checksum(&self.name)
    }
}

pub(crate) fn checksum(name: &[u8; 11]) -> u8 {
    name.iter().fold(0u8, |sum, &byte| sum.rotate_right(1).wrapping_add(byte))
}
