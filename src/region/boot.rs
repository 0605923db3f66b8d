// Boot records: exFAT main boot sector, FAT12/16/32 BPB, FSInfo and MBR

use bitfield::bitfield;

use crate::endian::Little as LE;

pub(crate) const SIGNATURE: [u8; 2] = hex!("55 AA");
pub(crate) const SIGNATURE_OFFSET: usize = 510;

pub(crate) fn has_signature(sector: &[u8]) -> bool {
    sector.len() >= 512 && sector[SIGNATURE_OFFSET..SIGNATURE_OFFSET + 2] == SIGNATURE
}

bitfield! {
    #[derive(Copy, Clone, Debug, Default)]
    pub struct VolumeFlags(u16);
    pub media_failure, set_media_failure: 2, 2;
    pub volume_dirty, set_volume_dirty: 1, 1;
    pub active_fat, set_active_fat: 0, 0;
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct BootSector {
    pub jump_boot: [u8; 3],
    pub filesystem_name: [u8; 8],
    pub must_be_zero: [u8; 53],
    pub partition_offset: LE<u64>, // shall ignore when 0
    pub volume_length: LE<u64>,
    pub fat_offset: LE<u32>,          // unit sector
    pub fat_length: LE<u32>,          // unit sector
    pub cluster_heap_offset: LE<u32>, // unit sector
    pub cluster_count: LE<u32>,
    pub first_cluster_of_root_directory: LE<u32>,
    pub volume_serial_number: LE<u32>,
    pub filesystem_revision: LE<u16>,
    pub volume_flags: LE<u16>,
    pub bytes_per_sector_shift: u8, // [9..=12]
    pub sectors_per_cluster_shift: u8,
    pub number_of_fats: u8,
    pub drive_select: u8,
    pub percent_inuse: u8,
    _reserved: [u8; 7],
    pub bootcode: [u8; 390],
    pub boot_signature: [u8; 2],
}

impl BootSector {
    pub fn is_exfat(&self) -> bool {
        self.jump_boot == hex!("EB 76 90") && &self.filesystem_name == b"EXFAT   "
    }

    pub fn volume_flags(&self) -> VolumeFlags {
        VolumeFlags(self.volume_flags.to_ne())
    }
}

/// Fields shared by every FAT12/16/32 boot sector
#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct BiosParameterBlock {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: LE<u16>,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: LE<u16>,
    pub num_fats: u8,
    pub root_entries: LE<u16>,
    pub total_sectors16: LE<u16>,
    pub media: u8,
    pub fat_length16: LE<u16>,
    pub sectors_per_track: LE<u16>,
    pub num_heads: LE<u16>,
    pub hidden_sectors: LE<u32>,
    pub total_sectors32: LE<u32>,
}

impl BiosParameterBlock {
    pub fn total_sectors(&self) -> u32 {
        match self.total_sectors16.to_ne() {
            0 => self.total_sectors32.to_ne(),
            sectors => sectors as u32,
        }
    }

    /// Loose sanity check of a FAT boot sector without a FAT32 type string
    pub fn plausible(&self) -> bool {
        let bytes_per_sector = self.bytes_per_sector.to_ne();
        let sectors_per_cluster = self.sectors_per_cluster;
        matches!(self.jump_boot[0], 0xEB | 0xE9 | 0xE8)
            && bytes_per_sector.is_power_of_two()
            && (512..=4096).contains(&bytes_per_sector)
            && sectors_per_cluster.is_power_of_two()
            && self.reserved_sectors.to_ne() != 0
            && matches!(self.num_fats, 1 | 2)
            && self.root_entries.to_ne() != 0
            && (self.total_sectors16.to_ne() >= 128 || self.total_sectors32.to_ne() >= 0x10000)
            && self.fat_length16.to_ne() != 0
    }
}

/// Extended boot record trailer, located at different offsets on FAT12/16 and FAT32
#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct ExtendedBootRecord {
    pub drive_number: u8,
    _reserved: u8,
    pub boot_signature: u8,
    pub volume_id: LE<u32>,
    pub volume_label: [u8; 11],
    pub filesystem_type: [u8; 8],
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct Fat16BootSector {
    pub bpb: BiosParameterBlock,
    pub ebr: ExtendedBootRecord,
}

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct Fat32BootSector {
    pub bpb: BiosParameterBlock,
    pub fat_length32: LE<u32>,
    pub ext_flags: LE<u16>,
    pub filesystem_version: LE<u16>,
    pub root_cluster: LE<u32>,
    pub fs_info: LE<u16>,
    pub backup_boot_sector: LE<u16>,
    _reserved: [u8; 12],
    pub ebr: ExtendedBootRecord,
}

impl Fat32BootSector {
    pub fn is_fat32(&self) -> bool {
        &self.ebr.filesystem_type == b"FAT32   "
    }
}

pub(crate) const FSINFO_LEAD_SIGNATURE: u32 = 0x41615252;
pub(crate) const FSINFO_STRUCT_SIGNATURE: u32 = 0x61417272;
pub(crate) const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA550000;

/// FAT32 free cluster hints
#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct FsInfo {
    pub lead_signature: LE<u32>,
    _reserved1: [u8; 480],
    pub struct_signature: LE<u32>,
    pub free_count: LE<u32>,
    pub next_free: LE<u32>,
    _reserved2: [u8; 12],
    pub trail_signature: LE<u32>,
}

impl FsInfo {
    pub fn valid(&self) -> bool {
        self.lead_signature.to_ne() == FSINFO_LEAD_SIGNATURE
            && self.struct_signature.to_ne() == FSINFO_STRUCT_SIGNATURE
            && self.trail_signature.to_ne() == FSINFO_TRAIL_SIGNATURE
    }
}

pub(crate) const PARTITION_TABLE_OFFSET: usize = 446;

#[derive(Copy, Clone, Debug)]
#[repr(C, packed(1))]
pub(crate) struct PartitionEntry {
    pub boot_indicator: u8,
    pub chs_start: [u8; 3],
    pub system_id: u8,
    pub chs_end: [u8; 3],
    pub start_lba: LE<u32>,
    pub num_sectors: LE<u32>,
}

#[derive(Default, Debug)]
pub(crate) struct BootChecksum(u32);

impl BootChecksum {
    pub fn write(&mut self, index: usize, sector: &[u8]) {
        let mut sum = self.0;
        for (i, &byte) in sector.iter().enumerate() {
            match (index, i) {
                (0, 106 | 107 | 112) => continue,
                _ => sum = sum.rotate_right(1).wrapping_add(byte as u32),
            }
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
        assert_eq!(size_of::<BootSector>(), 512);
        assert_eq!(size_of::<BiosParameterBlock>(), 36);
        assert_eq!(size_of::<Fat16BootSector>(), 62);
        assert_eq!(size_of::<Fat32BootSector>(), 90);
        assert_eq!(size_of::<FsInfo>(), 512);
        assert_eq!(size_of::<PartitionEntry>(), 16);
        assert_eq!(memoffset::offset_of!(Fat32BootSector, root_cluster), 44);
        assert_eq!(memoffset::offset_of!(BootSector, percent_inuse), 112);
        assert_eq!(memoffset::offset_of!(BootSector, volume_flags), 106);
    }

    #[test]
    fn test_volume_flags() {
        let mut sector = [0u8; 512];
        sector[106] = 0b011;
        let boot_sector: BootSector = crate::region::load(&sector);
        let flags = boot_sector.volume_flags();
        assert_eq!(flags.active_fat(), 1);
        assert_eq!(flags.volume_dirty(), 1);
        assert_eq!(flags.media_failure(), 0);
    }

    #[test]
    fn test_boot_checksum_skips_volatile_fields() {
        let mut sector = [0u8; 512];
        let mut checksum = BootChecksum::default();
        checksum.write(0, &sector);
        let sum = checksum.sum();
        sector[106] = 0xFF;
        sector[112] = 50;
        let mut checksum = BootChecksum::default();
        checksum.write(0, &sector);
        assert_eq!(checksum.sum(), sum);
        sector[113] = 1;
        let mut checksum = BootChecksum::default();
        checksum.write(0, &sector);
        assert_ne!(checksum.sum(), sum);
    }
}
