use alloc::vec::Vec;
use core::fmt::Debug;

use crate::cluster_heap::context::LockTable;
use crate::error::{DataError, DeviceError, Error, ImplementationError, OperationError};
use crate::fat::LinkTable;
use crate::fs::{FsType, Layout, MAX_EXFAT, RootDirectory};
use crate::io::{self, MAX_SECTOR_SIZE, MIN_SECTOR_SIZE};
use crate::options::Options;
use crate::path::Frame;
use crate::region::boot::{self, BiosParameterBlock, BootChecksum, BootSector, FsInfo};
use crate::region::boot::{Fat16BootSector, Fat32BootSector, PARTITION_TABLE_OFFSET, PartitionEntry};
use crate::region::data::entry_type::{EntryType, RawEntryType};
use crate::region::data::{self, ENTRY_SIZE};
use crate::region::fat::Link;
use crate::region::{le32, load, store};
use crate::types::{ClusterID, SectorID};
use crate::upcase_table::{Decoder, UpcaseTable};
use crate::window::{Mirror, Window};

/// Result of examining one candidate boot sector
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Format {
    ExFAT,
    FAT,
    /// Valid boot signature but not a FAT volume, may be a partition table
    Other,
    Invalid,
}

/// Geometry and hints gathered from the boot region
struct Detected {
    layout: Layout,
    fsinfo: Option<SectorID>,
    serial_number: u32,
}

/// One mounted logical drive
pub(crate) struct Volume<IO> {
    pub io: IO,
    pub options: Options,
    pub layout: Layout,
    pub links: LinkTable,
    pub window: Window,
    /// Free cluster count, `None` until counted
    pub free: Option<u32>,
    /// Most recently allocated cluster
    pub last: Option<ClusterID>,
    fsinfo: Option<SectorID>,
    pub fsinfo_dirty: bool,
    pub serial_number: u32,
    /// Bumped on every mount and unmount, handles of an older generation are stale
    pub generation: u32,
    pub enabled: bool,
    /// Current directory, empty for the root
    pub cwd: Vec<Frame>,
    pub locks: LockTable,
    pub upcase: UpcaseTable,
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    pub(crate) fn mount(mut io: IO, options: Options) -> Result<Self, Error<E>> {
        Self::initialize(&mut io)?;
        let sector_size = io.sector_size();
        if !sector_size.is_power_of_two() || !(MIN_SECTOR_SIZE..=MAX_SECTOR_SIZE).contains(&sector_size) {
            return Err(ImplementationError::SectorSize.into());
        }
        let mut window = Window::new(sector_size as usize);
        let detected = Self::detect(&mut io, &mut window)?;
        let mut volume = Self {
            io,
            options,
            layout: detected.layout,
            links: LinkTable::new(detected.layout.fs_type),
            window,
            free: None,
            last: None,
            fsinfo: detected.fsinfo,
            fsinfo_dirty: false,
            serial_number: detected.serial_number,
            generation: 1,
            enabled: true,
            cwd: Vec::new(),
            locks: LockTable::new(options.locks),
            upcase: UpcaseTable::default(),
        };
        volume.load_hints()?;
        debug!("Mounted {}", volume.layout);
        Ok(volume)
    }

    fn initialize(io: &mut IO) -> Result<(), Error<E>> {
        let status = io.initialize().map_err(Error::IO)?;
        if status.no_disk() || status.not_initialized() {
            return Err(DeviceError::NotReady.into());
        }
        Ok(())
    }

    /// Classify the sector as a FAT, exFAT or other boot record
    fn check_fs(io: &mut IO, window: &mut Window, sector: SectorID) -> Result<Format, Error<E>> {
        window.load(io, sector)?;
        let bytes = window.bytes();
        let signature = boot::has_signature(bytes);
        let boot_sector: BootSector = load(bytes);
        if signature && boot_sector.is_exfat() {
            return Ok(Format::ExFAT);
        }
        let fat32: Fat32BootSector = load(bytes);
        if matches!(bytes[0], 0xEB | 0xE9 | 0xE8) {
            if signature && fat32.is_fat32() {
                return Ok(Format::FAT);
            }
            if fat32.bpb.plausible() {
                return Ok(Format::FAT);
            }
        }
        Ok(if signature { Format::Other } else { Format::Invalid })
    }

    /// Sector 0 first, then the primary partitions of an MBR in order
    fn find_volume(io: &mut IO, window: &mut Window) -> Result<(Format, SectorID), Error<E>> {
        let format = Self::check_fs(io, window, SectorID::BOOT)?;
        if format != Format::Other {
            return Ok((format, SectorID::BOOT));
        }
        let mut starts = [0u32; 4];
        for (i, start) in starts.iter_mut().enumerate() {
            let offset = PARTITION_TABLE_OFFSET + i * core::mem::size_of::<PartitionEntry>();
            let entry: PartitionEntry = load(&window.bytes()[offset..]);
            *start = entry.start_lba.to_ne();
        }
        let mut format = Format::Invalid;
        for start in starts.into_iter().filter(|&start| start != 0) {
            let sector = SectorID::from(start as u64);
            format = Self::check_fs(io, window, sector)?;
            if matches!(format, Format::ExFAT | Format::FAT) {
                debug!("Volume found in partition at sector {}", sector);
                return Ok((format, sector));
            }
        }
        Ok((format, SectorID::BOOT))
    }

    fn detect(io: &mut IO, window: &mut Window) -> Result<Detected, Error<E>> {
        let (format, base) = Self::find_volume(io, window)?;
        let detected = match format {
            Format::ExFAT => Self::detect_exfat(io, window, base)?,
            Format::FAT => Self::detect_fat(io, window, base)?,
            Format::Other => return Err(DataError::NotFAT.into()),
            Format::Invalid => return Err(DataError::BootSignature.into()),
        };
        let mirror = match detected.layout.num_fats {
            1 => None,
            copies => Some(Mirror { base: detected.layout.fat_base, length: detected.layout.fat_length, copies }),
        };
        window.set_mirror(mirror);
        Ok(detected)
    }

    fn detect_fat(io: &mut IO, window: &mut Window, base: SectorID) -> Result<Detected, Error<E>> {
        let bytes = window.bytes();
        let bpb: BiosParameterBlock = load(bytes);
        let fat32: Fat32BootSector = load(bytes);
        let fat16: Fat16BootSector = load(bytes);
        let sector_size = io.sector_size() as u32;
        if bpb.bytes_per_sector.to_ne() as u32 != sector_size {
            return Err(DataError::Geometry.into());
        }
        let fat_length = match bpb.fat_length16.to_ne() {
            0 => fat32.fat_length32.to_ne(),
            length => length as u32,
        };
        let num_fats = bpb.num_fats;
        let cluster_sectors = bpb.sectors_per_cluster as u32;
        let root_entries = bpb.root_entries.to_ne();
        let entries_per_sector = sector_size / ENTRY_SIZE as u32;
        let reserved = bpb.reserved_sectors.to_ne() as u32;
        let total_sectors = bpb.total_sectors();
        let geometry_ok = matches!(num_fats, 1 | 2)
            && cluster_sectors.is_power_of_two()
            && root_entries as u32 % entries_per_sector == 0
            && reserved != 0;
        if !geometry_ok {
            return Err(DataError::Geometry.into());
        }
        let fats_length = fat_length as u64 * num_fats as u64;
        let root_sectors = root_entries as u64 / entries_per_sector as u64;
        let system_sectors = reserved as u64 + fats_length + root_sectors;
        if (total_sectors as u64) < system_sectors {
            return Err(DataError::Geometry.into());
        }
        let cluster_count = (total_sectors as u64 - system_sectors) / cluster_sectors as u64;
        let fs_type = FsType::from_cluster_count(cluster_count as u32)
            .filter(|_| cluster_count <= u32::MAX as u64)
            .ok_or(Error::Data(DataError::Geometry))?;
        let fat_base = base + reserved;
        let root = match fs_type {
            FsType::FAT32 => {
                if fat32.filesystem_version.to_ne() != 0 || root_entries != 0 {
                    return Err(DataError::Geometry.into());
                }
                RootDirectory::Chain(fat32.root_cluster.to_ne().into())
            }
            _ => {
                if root_entries == 0 {
                    return Err(DataError::Geometry.into());
                }
                RootDirectory::Fixed { base: fat_base + fats_length, entries: root_entries }
            }
        };
        let num_fat_entries = cluster_count as u32 + 2;
        if fat_length < LinkTable::new(fs_type).sectors_needed(num_fat_entries, sector_size) {
            return Err(DataError::Geometry.into());
        }
        let (serial_number, fsinfo) = match fs_type {
            FsType::FAT32 => {
                let fsinfo = fat32.ext_flags.to_ne() == 0 && fat32.fs_info.to_ne() == 1;
                (fat32.ebr.volume_id.to_ne(), fsinfo.then(|| base + 1u64))
            }
            _ => (fat16.ebr.volume_id.to_ne(), None),
        };
        let layout = Layout {
            fs_type,
            sector_size,
            cluster_sectors,
            num_fats,
            fat_length,
            num_fat_entries,
            fat_base,
            root,
            data_base: base + system_sectors,
            bitmap_base: SectorID::default(),
        };
        if let RootDirectory::Chain(cluster) = root {
            if !layout.valid(cluster) {
                return Err(DataError::Geometry.into());
            }
        }
        Ok(Detected { layout, fsinfo, serial_number })
    }

    fn detect_exfat(io: &mut IO, window: &mut Window, base: SectorID) -> Result<Detected, Error<E>> {
        let boot_sector: BootSector = load(window.bytes());
        if boot_sector.must_be_zero.iter().any(|&byte| byte != 0) {
            return Err(DataError::NotFAT.into());
        }
        if boot_sector.filesystem_revision.to_ne() != 0x100 {
            return Err(DataError::Geometry.into());
        }
        let sector_size = io.sector_size() as u32;
        let bytes_shift = boot_sector.bytes_per_sector_shift as u32;
        let cluster_shift = boot_sector.sectors_per_cluster_shift as u32;
        if bytes_shift > 12 || 1 << bytes_shift != sector_size || bytes_shift + cluster_shift > 25 {
            return Err(DataError::Geometry.into());
        }
        if boot_sector.number_of_fats != 1 {
            return Err(ImplementationError::TexFATNotSupported.into());
        }
        let cluster_count = boot_sector.cluster_count.to_ne();
        if cluster_count == 0 || cluster_count > MAX_EXFAT {
            return Err(DataError::Geometry.into());
        }
        let cluster_sectors = 1 << cluster_shift;
        let data_base = base + boot_sector.cluster_heap_offset.to_ne();
        let volume_end = base + boot_sector.volume_length.to_ne();
        if volume_end < data_base + cluster_count as u64 * cluster_sectors as u64 {
            return Err(DataError::Geometry.into());
        }
        let layout = Layout {
            fs_type: FsType::ExFAT,
            sector_size,
            cluster_sectors,
            num_fats: 1,
            fat_length: boot_sector.fat_length.to_ne(),
            num_fat_entries: cluster_count + 2,
            fat_base: base + boot_sector.fat_offset.to_ne(),
            root: RootDirectory::Chain(boot_sector.first_cluster_of_root_directory.to_ne().into()),
            data_base,
            bitmap_base: SectorID::default(),
        };
        if !layout.valid(layout.root_cluster()) {
            return Err(DataError::Geometry.into());
        }
        let serial_number = boot_sector.volume_serial_number.to_ne();
        let flags = boot_sector.volume_flags();
        Self::validate_boot_checksum(io, window, base)?;
        if flags.volume_dirty() != 0 {
            warn!("Volume was not cleanly unmounted");
        }
        if flags.media_failure() != 0 {
            warn!("Volume reports media failure");
        }
        Ok(Detected { layout, fsinfo: None, serial_number })
    }

    /// exFAT main boot region checksum, sectors 0 to 10 against sector 11
    fn validate_boot_checksum(io: &mut IO, window: &mut Window, base: SectorID) -> Result<(), Error<E>> {
        let mut checksum = BootChecksum::default();
        for i in 0..11u64 {
            window.load(io, base + i)?;
            checksum.write(i as usize, window.bytes());
        }
        window.load(io, base + 11u64)?;
        if le32(window.bytes(), 0) != checksum.sum() {
            warn!("Boot region checksum mismatch");
            return Err(DataError::BootChecksum.into());
        }
        Ok(())
    }

    /// Allocation hints, the FSInfo sector or the exFAT metadata entries
    fn load_hints(&mut self) -> Result<(), Error<E>> {
        self.free = None;
        self.last = None;
        self.fsinfo_dirty = false;
        if self.layout.is_exfat() {
            return self.load_exfat_metadata();
        }
        let sector = match self.fsinfo {
            Some(sector) => sector,
            None => return Ok(()),
        };
        self.window.load(&mut self.io, sector)?;
        let fsinfo: FsInfo = load(self.window.bytes());
        if !fsinfo.valid() {
            debug!("FSInfo sector ignored");
            return Ok(());
        }
        let free = fsinfo.free_count.to_ne();
        self.free = (free <= self.layout.cluster_count()).then_some(free);
        let next = ClusterID::from(fsinfo.next_free.to_ne());
        self.last = self.layout.valid(next).then_some(next);
        trace!("FSInfo free {:?} last {:?}", self.free, self.last);
        Ok(())
    }

    /// Locate the allocation bitmap and load the up-case table, both live in the
    /// first cluster of the root directory
    fn load_exfat_metadata(&mut self) -> Result<(), Error<E>> {
        let root = self.layout.root_cluster();
        let first = self.layout.sector_of(root).ok_or(Error::Data(DataError::Geometry))?;
        let mut bitmap: Option<data::AllocationBitmap> = None;
        let mut upcase: Option<data::UpcaseTable> = None;
        'scan: for i in 0..self.layout.cluster_sectors as u64 {
            self.window.load(&mut self.io, first + i)?;
            for entry in self.window.bytes().chunks_exact(ENTRY_SIZE) {
                let entry_type = RawEntryType::from(entry[0]);
                if entry_type.is_end_of_directory() {
                    break 'scan;
                }
                match entry_type {
                    t if t == RawEntryType::new(EntryType::AllocationBitmap, true) => {
                        bitmap = bitmap.or(Some(load(entry)))
                    }
                    t if t == RawEntryType::new(EntryType::UpcaseTable, true) => {
                        upcase = upcase.or(Some(load(entry)))
                    }
                    _ => {}
                }
            }
        }
        let bitmap = bitmap.ok_or(Error::Data(DataError::AllocationBitmap))?;
        let cluster = ClusterID::from(bitmap.first_cluster.to_ne());
        let bitmap_length = bitmap.data_length.to_ne();
        if !self.layout.valid(cluster) || bitmap_length < self.layout.cluster_count().div_ceil(8) as u64 {
            return Err(DataError::AllocationBitmap.into());
        }
        self.layout.bitmap_base = self.layout.sector_of(cluster).ok_or(Error::Data(DataError::Geometry))?;
        // The bitmap is addressed as one run of sectors
        let mut current = cluster;
        for _ in 0..self.layout.num_fat_entries {
            match self.read_link(current)? {
                Link::Next(next) if next == current + 1u32 => current = next,
                Link::End => break,
                _ => {
                    warn!("Allocation bitmap is fragmented");
                    return Err(DataError::AllocationBitmap.into());
                }
            }
        }
        self.upcase = match upcase {
            Some(entry) => self.load_upcase_table(&entry)?,
            None => {
                warn!("No up-case table, using ASCII folding");
                UpcaseTable::default()
            }
        };
        Ok(())
    }

    fn load_upcase_table(&mut self, entry: &data::UpcaseTable) -> Result<UpcaseTable, Error<E>> {
        let mut remaining = entry.data_length.to_ne();
        let mut cluster = ClusterID::from(entry.first_cluster.to_ne());
        let mut decoder = Decoder::default();
        let mut visited = 0;
        while remaining > 0 {
            let first = self.layout.sector_of(cluster).ok_or(Error::Data(DataError::UpcaseTableChecksum))?;
            for i in 0..self.layout.cluster_sectors as u64 {
                if remaining == 0 {
                    break;
                }
                self.window.load(&mut self.io, first + i)?;
                let length = remaining.min(self.layout.sector_size as u64) as usize;
                decoder.feed(&self.window.bytes()[..length]);
                remaining -= length as u64;
            }
            visited += 1;
            if remaining == 0 {
                break;
            }
            cluster = match self.read_link(cluster)? {
                Link::Next(next) if visited < self.layout.num_fat_entries => next,
                _ => return Err(DataError::UpcaseTableChecksum.into()),
            };
        }
        if decoder.checksum() != entry.table_checksum.to_ne() {
            warn!("Up-case table checksum mismatch");
            return Err(DataError::UpcaseTableChecksum.into());
        }
        Ok(decoder.finish())
    }

    /// Media change and write protection checks made before every operation
    pub(crate) fn prepare(&mut self, write: bool) -> Result<(), Error<E>> {
        if !self.enabled {
            return Err(OperationError::NotEnabled.into());
        }
        let status = self.io.status();
        if status.no_disk() {
            return Err(DeviceError::NotReady.into());
        }
        if status.not_initialized() {
            debug!("Media changed, mounting again");
            self.remount()?;
        }
        if write && (self.options.read_only || self.io.status().write_protected()) {
            return Err(DeviceError::WriteProtected.into());
        }
        Ok(())
    }

    /// Read the boot region again, every handle of the previous mount becomes stale
    pub(crate) fn remount(&mut self) -> Result<(), Error<E>> {
        self.window.invalidate();
        self.generation = self.generation.wrapping_add(1);
        self.cwd.clear();
        self.locks.clear();
        self.enabled = false;
        Self::initialize(&mut self.io)?;
        let detected = Self::detect(&mut self.io, &mut self.window)?;
        self.layout = detected.layout;
        self.links = LinkTable::new(detected.layout.fs_type);
        self.fsinfo = detected.fsinfo;
        self.serial_number = detected.serial_number;
        self.upcase = UpcaseTable::default();
        self.load_hints()?;
        self.enabled = true;
        debug!("Mounted again {}", self.layout);
        Ok(())
    }

    fn writable(&mut self) -> bool {
        !self.options.read_only && !self.io.status().write_protected()
    }

    /// Write back the window and FSInfo, then flush the device. FSInfo stays
    /// untouched on a read-only mount or a write protected device.
    pub(crate) fn sync(&mut self) -> Result<(), Error<E>> {
        self.window.flush(&mut self.io)?;
        if self.fsinfo_dirty && !self.writable() {
            debug!("FSInfo not written back, volume is read-only");
            self.fsinfo_dirty = false;
        }
        if let (true, Some(sector)) = (self.fsinfo_dirty, self.fsinfo) {
            let mut fsinfo: FsInfo = load(&[0u8; 512]);
            fsinfo.lead_signature = boot::FSINFO_LEAD_SIGNATURE.into();
            fsinfo.struct_signature = boot::FSINFO_STRUCT_SIGNATURE.into();
            fsinfo.trail_signature = boot::FSINFO_TRAIL_SIGNATURE.into();
            fsinfo.free_count = self.free.unwrap_or(u32::MAX).into();
            fsinfo.next_free = self.last.map(u32::from).unwrap_or(u32::MAX).into();
            self.window.clear(&mut self.io, sector)?;
            store(self.window.bytes_mut(), &fsinfo);
            self.window.flush(&mut self.io)?;
            self.fsinfo_dirty = false;
            trace!("FSInfo written, free {:?}", self.free);
        }
        self.io.flush().map_err(Error::IO)
    }

    /// Leave the window clean whatever the outcome of an operation
    pub(crate) fn settle<T>(&mut self, result: Result<T, Error<E>>) -> Result<T, Error<E>> {
        match result {
            Ok(value) => {
                self.window.flush(&mut self.io)?;
                Ok(value)
            }
            Err(error) => {
                if self.window.flush(&mut self.io).is_err() {
                    self.window.invalidate();
                }
                Err(error)
            }
        }
    }

    pub(crate) fn unmount(&mut self) -> Result<(), Error<E>> {
        let result = self.sync();
        self.enabled = false;
        self.generation = self.generation.wrapping_add(1);
        self.locks.clear();
        self.cwd.clear();
        self.window.invalidate();
        result
    }

    /// Free space is counted the first time it is asked for
    pub(crate) fn free_clusters(&mut self) -> Result<u32, Error<E>> {
        match self.free {
            Some(free) if free <= self.layout.cluster_count() => Ok(free),
            _ => {
                let free = self.count_free()?;
                self.free = Some(free);
                self.fsinfo_dirty = self.writable();
                Ok(free)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::FileSystem;
    use crate::io::memory::MemoryIO;
    use crate::io::{IO, Status};
    use crate::testing;

    #[test]
    fn test_mount_every_variant() {
        for (io, fs_type) in [
            (testing::fat12(), FsType::FAT12),
            (testing::fat16(), FsType::FAT16),
            (testing::fat32(), FsType::FAT32),
            (testing::exfat(), FsType::ExFAT),
        ] {
            let volume = testing::volume(io);
            assert_eq!(volume.layout.fs_type, fs_type);
            assert!(volume.enabled);
            assert!(!volume.window.is_dirty());
        }
    }

    #[test]
    fn test_exfat_metadata() {
        let volume = testing::volume(testing::exfat());
        assert_eq!(volume.layout.bitmap_base, volume.layout.sector_of(2.into()).unwrap());
        assert_eq!(volume.upcase.to_upper(b'a' as u16), b'A' as u16);
        assert_eq!(volume.upcase.to_upper(0xE9), 0xC9);
        assert_eq!(volume.upcase.to_upper(0xFF), 0x178);
        assert_eq!(volume.serial_number, testing::SERIAL_NUMBER);
    }

    #[test]
    fn test_exfat_boot_checksum() {
        let mut io = testing::exfat();
        io.sector_mut(1)[0] ^= 0xFF;
        let result = Volume::mount(io, Options::default());
        assert!(matches!(result, Err(Error::Data(DataError::BootChecksum))));
    }

    #[test]
    fn test_exfat_dirty_volume_mounts() {
        let mut io = testing::exfat();
        // Volume flags are left out of the boot checksum
        io.sector_mut(0)[106] = 0b110;
        let volume = testing::volume(io);
        assert_eq!(volume.layout.fs_type, FsType::ExFAT);
    }

    #[test]
    fn test_blank_device() {
        let io = MemoryIO::new(512, 4096);
        let result = Volume::mount(io, Options::default());
        assert!(matches!(result, Err(Error::Data(DataError::BootSignature))));
    }

    #[test]
    fn test_partitioned_device() {
        let image = testing::fat16();
        let offset = 63u64;
        let mut io = MemoryIO::new(512, image.num_sectors() + offset);
        for sector in 0..image.num_sectors() {
            io.sector_mut(sector + offset).copy_from_slice(&image.sector(sector));
        }
        let mbr = io.sector_mut(0);
        mbr[PARTITION_TABLE_OFFSET + 4] = 0x06;
        mbr[PARTITION_TABLE_OFFSET + 8..PARTITION_TABLE_OFFSET + 12]
            .copy_from_slice(&(offset as u32).to_le_bytes());
        mbr[510..512].copy_from_slice(&boot::SIGNATURE);
        let volume = testing::volume(io);
        assert_eq!(volume.layout.fs_type, FsType::FAT16);
        assert_eq!(volume.layout.fat_base, SectorID::from(offset + 1));
    }

    #[test]
    fn test_fsinfo_round_trip() {
        let mut volume = testing::volume(testing::fat32());
        assert_eq!(volume.free, Some(testing::FAT32_CLUSTERS - 1));
        volume.free = Some(1234);
        volume.last = Some(77.into());
        volume.fsinfo_dirty = true;
        volume.sync().unwrap();
        let io = volume.io;
        let volume = testing::volume(io);
        assert_eq!(volume.free, Some(1234));
        assert_eq!(volume.last, Some(ClusterID::from(77)));
    }

    #[test]
    fn test_read_only_mount_never_writes() {
        let mut protected = Status::default();
        protected.set_write_protected(true);
        let read_only = Options { read_only: true, ..testing::options() };
        for (status, options) in [(Status::default(), read_only), (protected, testing::options())] {
            let mut io = testing::fat32();
            // Free count unknown, so it gets counted
            io.sector_mut(1)[488..492].copy_from_slice(&u32::MAX.to_le_bytes());
            io.set_status(status);
            let fsinfo = io.sector(1);
            let fs = FileSystem::mount(io, options).unwrap();
            assert_eq!(fs.free_clusters().unwrap(), testing::FAT32_CLUSTERS - 1);
            let mut root = fs.open_dir("/").unwrap();
            assert_eq!(root.read().unwrap(), None);
            root.close().unwrap();
            fs.sync().unwrap();
            fs.unmount().unwrap();
            let io = match fs.try_free() {
                Ok(io) => io,
                Err(_) => panic!("volume still shared"),
            };
            assert_eq!(io.num_writes, 0);
            assert_eq!(io.sector(1), fsinfo);
        }
    }

    #[test]
    fn test_media_change_bumps_generation() {
        let mut volume = testing::volume(testing::fat16());
        let generation = volume.generation;
        let mut status = Status::default();
        status.set_not_initialized(true);
        volume.io.set_status(status);
        volume.prepare(false).unwrap();
        assert_eq!(volume.generation, generation + 1);
        assert!(!volume.io.status().not_initialized());
    }

    #[test]
    fn test_write_protection() {
        let mut volume = testing::volume(testing::fat12());
        let mut status = Status::default();
        status.set_write_protected(true);
        volume.io.set_status(status);
        volume.prepare(false).unwrap();
        assert!(matches!(volume.prepare(true), Err(Error::Device(DeviceError::WriteProtected))));
        volume.unmount().unwrap();
        assert!(matches!(volume.prepare(false), Err(Error::Operation(OperationError::NotEnabled))));
    }
}
