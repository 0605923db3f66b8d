use alloc::string::String;

use bitflags::bitflags;

use crate::datetime::Timestamp;

#[cfg(feature = "max-filename-size-64")]
pub const MAX_FILENAME_SIZE: usize = 64;
#[cfg(all(feature = "limit-filename-size", not(feature = "max-filename-size-64")))]
pub const MAX_FILENAME_SIZE: usize = 128;
/// Capacity of the long name buffer in UTF-16 units
#[cfg(not(feature = "limit-filename-size"))]
pub const MAX_FILENAME_SIZE: usize = 255;

/// Long name buffer shared by the entry codecs
pub(crate) type Name = heapless::Vec<u16, MAX_FILENAME_SIZE>;

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Marks a long name entry
        const LONG_NAME = 0x0F;
    }
}

impl Attributes {
    /// Bits a caller may change with chmod
    pub const CHANGEABLE: Self = Self::READ_ONLY
        .union(Self::HIDDEN)
        .union(Self::SYSTEM)
        .union(Self::ARCHIVE);
    /// Bits reported in file information
    pub(crate) const MASK: Self = Self::CHANGEABLE.union(Self::DIRECTORY);
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
        const OPEN_EXISTING = 0x00;
        const CREATE_NEW = 0x04;
        const CREATE_ALWAYS = 0x08;
        const OPEN_ALWAYS = 0x10;
        const OPEN_APPEND = 0x30;
    }
}

impl OpenMode {
    pub(crate) fn creates(&self) -> bool {
        self.intersects(Self::CREATE_NEW | Self::CREATE_ALWAYS | Self::OPEN_ALWAYS)
    }

    pub(crate) fn seeks_end(&self) -> bool {
        self.bits() & 0x20 != 0
    }

    pub(crate) fn writes(&self) -> bool {
        self.intersects(Self::WRITE)
    }
}

bitflags! {
    /// Layout selection of the formatting tool, shared vocabulary only
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct FormatOptions: u8 {
        const FAT = 0x01;
        const FAT32 = 0x02;
        const EXFAT = 0x04;
        const ANY = 0x07;
        /// Single fixed disk, no partition table
        const SFD = 0x08;
    }
}

/// How the chain of an object is laid out on the volume
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ChainStatus {
    /// Links must be followed through the FAT
    #[default]
    NotContiguous,
    /// Clusters are consecutive and the FAT is not consulted
    Contiguous,
    /// Was contiguous at open and got fragmented since
    FragmentedThisSession,
}

/// Directory listing record
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub size: u64,
    pub modified: Timestamp,
    pub attributes: Attributes,
    /// Long name when present, otherwise the short name
    pub name: String,
    /// Short name, empty on exFAT or when it carries no extra information
    pub short_name: String,
}

impl FileInfo {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }
}

/// Position argument of [`crate::File::seek`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u64),
    End(i64),
    Current(i64),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_open_mode() {
        assert!(OpenMode::OPEN_APPEND.contains(OpenMode::OPEN_ALWAYS));
        assert!(OpenMode::OPEN_APPEND.seeks_end());
        assert!(!OpenMode::OPEN_ALWAYS.seeks_end());
        assert!(!(OpenMode::READ | OpenMode::OPEN_EXISTING).creates());
        assert!((OpenMode::WRITE | OpenMode::CREATE_NEW).creates());
        assert_eq!(Attributes::MASK.bits(), 0x37);
        assert_eq!(FormatOptions::ANY, FormatOptions::FAT | FormatOptions::FAT32 | FormatOptions::EXFAT);
    }
}
