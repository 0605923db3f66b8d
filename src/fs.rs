use core::fmt::Display;

use crate::types::{ClusterID, SectorID};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsType {
    FAT12,
    FAT16,
    FAT32,
    ExFAT,
}

impl Display for FsType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::FAT12 => "FAT12",
            Self::FAT16 => "FAT16",
            Self::FAT32 => "FAT32",
            Self::ExFAT => "exFAT",
        };
        f.write_str(name)
    }
}

pub(crate) const MAX_FAT12: u32 = 0xFF5;
pub(crate) const MAX_FAT16: u32 = 0xFFF5;
pub(crate) const MAX_FAT32: u32 = 0x0FFF_FFF5;
pub(crate) const MAX_EXFAT: u32 = 0x7FFF_FFFD;

impl FsType {
    /// Variant implied by the number of clusters of a FAT volume
    pub(crate) fn from_cluster_count(count: u32) -> Option<Self> {
        if count == 0 || count > MAX_FAT32 {
            None
        } else if count <= MAX_FAT12 {
            Some(Self::FAT12)
        } else if count <= MAX_FAT16 {
            Some(Self::FAT16)
        } else {
            Some(Self::FAT32)
        }
    }
}

/// Where the root directory lives
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RootDirectory {
    /// FAT12/16 fixed area right after the FATs
    Fixed { base: SectorID, entries: u16 },
    /// FAT32 and exFAT, an ordinary cluster chain
    Chain(ClusterID),
}

/// Volume geometry computed once at mount
#[derive(Copy, Clone, Debug)]
pub(crate) struct Layout {
    pub fs_type: FsType,
    pub sector_size: u32,
    /// Sectors per cluster
    pub cluster_sectors: u32,
    pub num_fats: u8,
    /// Sectors per FAT
    pub fat_length: u32,
    /// Number of FAT entries, cluster count + 2
    pub num_fat_entries: u32,
    pub fat_base: SectorID,
    pub root: RootDirectory,
    pub data_base: SectorID,
    /// exFAT allocation bitmap, contiguous
    pub bitmap_base: SectorID,
}

impl Layout {
    pub fn cluster_size(&self) -> u32 {
        self.sector_size * self.cluster_sectors
    }

    pub fn cluster_count(&self) -> u32 {
        self.num_fat_entries - 2
    }

    pub fn is_exfat(&self) -> bool {
        self.fs_type == FsType::ExFAT
    }

    /// Data cluster within range
    pub fn valid(&self, cluster: ClusterID) -> bool {
        cluster.valid() && u32::from(cluster) < self.num_fat_entries
    }

    /// First sector of a data cluster
    pub fn sector_of(&self, cluster: ClusterID) -> Option<SectorID> {
        if !self.valid(cluster) {
            return None;
        }
        Some(self.data_base + cluster.offset() as u64 * self.cluster_sectors as u64)
    }

    pub fn root_cluster(&self) -> ClusterID {
        match self.root {
            RootDirectory::Chain(cluster) => cluster,
            RootDirectory::Fixed { .. } => ClusterID::NONE,
        }
    }

    /// Bytes needed to cover `size`, rounded up to clusters
    pub fn clusters_of(&self, size: u64) -> u64 {
        size.div_ceil(self.cluster_size() as u64)
    }

    /// Largest file size the variant can represent
    pub fn max_file_size(&self) -> u64 {
        match self.fs_type {
            FsType::ExFAT => u64::MAX,
            _ => u32::MAX as u64,
        }
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {}x{}B clusters, FAT@{} {}x{} sectors, data@{}",
            self.fs_type,
            self.cluster_count(),
            self.cluster_size(),
            self.fat_base,
            self.num_fats,
            self.fat_length,
            self.data_base
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_variant_by_cluster_count() {
        assert_eq!(FsType::from_cluster_count(0), None);
        assert_eq!(FsType::from_cluster_count(4085), Some(FsType::FAT12));
        assert_eq!(FsType::from_cluster_count(4086), Some(FsType::FAT16));
        assert_eq!(FsType::from_cluster_count(65525), Some(FsType::FAT16));
        assert_eq!(FsType::from_cluster_count(65526), Some(FsType::FAT32));
        assert_eq!(FsType::from_cluster_count(0x0FFF_FFF6), None);
    }
}
