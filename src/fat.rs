use core::fmt::Debug;

use crate::error::{DataError, Error};
use crate::fs::FsType;
use crate::io;
use crate::region::fat::Link;
use crate::region::{le16, le32};
use crate::types::ClusterID;
use crate::volume::Volume;

/// Link table flavour, picked once at mount
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LinkTable {
    /// 12-bit entries, two entries packed in three bytes
    Fat12,
    Fat16,
    /// 28 significant bits, the upper 4 bits are reserved
    Fat32,
    ExFAT,
}

impl LinkTable {
    pub fn new(fs_type: FsType) -> Self {
        match fs_type {
            FsType::FAT12 => Self::Fat12,
            FsType::FAT16 => Self::Fat16,
            FsType::FAT32 => Self::Fat32,
            FsType::ExFAT => Self::ExFAT,
        }
    }

    pub fn end_of_chain(&self) -> u32 {
        match self {
            Self::Fat12 => 0xFFF,
            Self::Fat16 => 0xFFFF,
            Self::Fat32 => 0x0FFF_FFFF,
            Self::ExFAT => 0xFFFF_FFFF,
        }
    }

    /// Byte offset of the entry of `cluster` from the start of the table
    fn byte_offset(&self, cluster: u32) -> u64 {
        let cluster = cluster as u64;
        match self {
            Self::Fat12 => cluster + cluster / 2,
            Self::Fat16 => cluster * 2,
            Self::Fat32 | Self::ExFAT => cluster * 4,
        }
    }

    /// Sectors a table with `num_entries` entries occupies at least
    pub fn sectors_needed(&self, num_entries: u32, sector_size: u32) -> u32 {
        let bytes = match self {
            Self::Fat12 => num_entries as u64 * 3 / 2 + (num_entries & 1) as u64,
            _ => self.byte_offset(num_entries),
        };
        bytes.div_ceil(sector_size as u64) as u32
    }
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    fn link_location(&self, cluster: ClusterID) -> Result<(crate::types::SectorID, usize), Error<E>> {
        if !self.layout.valid(cluster) {
            warn!("Link table access out of range, cluster {}", cluster);
            return Err(DataError::FATChain.into());
        }
        let sector_size = self.layout.sector_size as u64;
        let offset = self.links.byte_offset(cluster.into());
        Ok((self.layout.fat_base + offset / sector_size, (offset % sector_size) as usize))
    }

    /// Raw link value of `cluster`
    pub(crate) fn read_link_value(&mut self, cluster: ClusterID) -> Result<u32, Error<E>> {
        let (sector, index) = self.link_location(cluster)?;
        self.window.load(&mut self.io, sector)?;
        let value = match self.links {
            LinkTable::Fat12 => {
                let low = self.window.bytes()[index];
                let sector_size = self.layout.sector_size as usize;
                let (sector, index) = match index + 1 == sector_size {
                    true => (sector + 1u64, 0),
                    false => (sector, index + 1),
                };
                self.window.load(&mut self.io, sector)?;
                let value = u16::from_le_bytes([low, self.window.bytes()[index]]);
                match u32::from(cluster) & 1 {
                    1 => (value >> 4) as u32,
                    _ => (value & 0xFFF) as u32,
                }
            }
            LinkTable::Fat16 => le16(self.window.bytes(), index) as u32,
            LinkTable::Fat32 => le32(self.window.bytes(), index) & 0x0FFF_FFFF,
            LinkTable::ExFAT => le32(self.window.bytes(), index),
        };
        Ok(value)
    }

    pub(crate) fn read_link(&mut self, cluster: ClusterID) -> Result<Link, Error<E>> {
        let value = self.read_link_value(cluster)?;
        Link::decode(value, self.layout.num_fat_entries).map_err(|value| {
            warn!("Reserved link value {} on cluster {}", value, cluster);
            DataError::FATChain.into()
        })
    }

    pub(crate) fn write_link(&mut self, cluster: ClusterID, value: u32) -> Result<(), Error<E>> {
        let (sector, index) = self.link_location(cluster)?;
        self.window.load(&mut self.io, sector)?;
        match self.links {
            LinkTable::Fat12 => {
                let odd = u32::from(cluster) & 1 == 1;
                let bytes = self.window.bytes_mut();
                bytes[index] = match odd {
                    true => (bytes[index] & 0x0F) | (value << 4) as u8,
                    false => value as u8,
                };
                let sector_size = self.layout.sector_size as usize;
                let (sector, index) = match index + 1 == sector_size {
                    true => (sector + 1u64, 0),
                    false => (sector, index + 1),
                };
                self.window.load(&mut self.io, sector)?;
                let bytes = self.window.bytes_mut();
                bytes[index] = match odd {
                    true => (value >> 4) as u8,
                    false => (bytes[index] & 0xF0) | ((value >> 8) & 0x0F) as u8,
                };
            }
            LinkTable::Fat16 => {
                let bytes = &mut self.window.bytes_mut()[index..index + 2];
                bytes.copy_from_slice(&(value as u16).to_le_bytes());
            }
            LinkTable::Fat32 => {
                let reserved = le32(self.window.bytes(), index) & 0xF000_0000;
                let value = reserved | (value & 0x0FFF_FFFF);
                let bytes = &mut self.window.bytes_mut()[index..index + 4];
                bytes.copy_from_slice(&value.to_le_bytes());
            }
            LinkTable::ExFAT => {
                let bytes = &mut self.window.bytes_mut()[index..index + 4];
                bytes.copy_from_slice(&value.to_le_bytes());
            }
        }
        Ok(())
    }

    /// Terminate the chain at `cluster`
    pub(crate) fn write_end_of_chain(&mut self, cluster: ClusterID) -> Result<(), Error<E>> {
        let end = self.links.end_of_chain();
        self.write_link(cluster, end)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing;

    #[test]
    fn test_fat12_straddles_sector_boundary() {
        let mut volume = testing::volume(testing::fat12());
        // Entry 341 occupies bytes 511 and 512 of the first FAT
        let cluster = ClusterID::from(341);
        volume.write_link(cluster, 0xABC).unwrap();
        volume.write_link(ClusterID::from(340), 0x123).unwrap();
        volume.write_link(ClusterID::from(342), 0x456).unwrap();
        assert_eq!(volume.read_link_value(cluster).unwrap(), 0xABC);
        assert_eq!(volume.read_link_value(340.into()).unwrap(), 0x123);
        assert_eq!(volume.read_link_value(342.into()).unwrap(), 0x456);
        volume.window.flush(&mut volume.io).unwrap();
        // Mirrored into the second FAT
        let fat_base = u64::from(volume.layout.fat_base);
        let fat_length = volume.layout.fat_length as u64;
        assert_eq!(volume.io.sector(fat_base)[511], volume.io.sector(fat_base + fat_length)[511]);
        assert_eq!(volume.io.sector(fat_base + 1)[0], 0xAB);
    }

    #[test]
    fn test_fat32_keeps_reserved_bits() {
        let mut volume = testing::volume(testing::fat32());
        let cluster = ClusterID::from(100);
        let (sector, index) = volume.link_location(cluster).unwrap();
        volume.window.load(&mut volume.io, sector).unwrap();
        volume.window.bytes_mut()[index + 3] = 0xF0;
        volume.write_link(cluster, 0x0FFF_FFFF).unwrap();
        assert_eq!(le32(volume.window.bytes(), index), 0xFFFF_FFFF);
        assert_eq!(volume.read_link(cluster).unwrap(), Link::End);
        volume.write_link(cluster, 101).unwrap();
        assert_eq!(le32(volume.window.bytes(), index), 0xF000_0065);
        assert_eq!(volume.read_link(cluster).unwrap(), Link::Next(101.into()));
    }

    #[test]
    fn test_out_of_range() {
        let mut volume = testing::volume(testing::fat16());
        let beyond = ClusterID::from(volume.layout.num_fat_entries);
        assert!(matches!(volume.read_link(beyond), Err(Error::Data(DataError::FATChain))));
        assert!(matches!(volume.read_link(1.into()), Err(Error::Data(DataError::FATChain))));
    }

    #[test]
    fn test_sectors_needed() {
        assert_eq!(LinkTable::Fat12.sectors_needed(2849, 512), 9);
        assert_eq!(LinkTable::Fat16.sectors_needed(256, 512), 1);
        assert_eq!(LinkTable::Fat32.sectors_needed(129, 512), 2);
    }
}
