//! Freshly formatted in-memory volumes shared by the unit tests

use crate::FileSystem;
use crate::datetime::DateTime;
use crate::io::memory::MemoryIO;
use crate::options::Options;
use crate::region::boot::{self, BootChecksum};
use crate::region::data::Checksum;
use crate::volume::Volume;

pub(crate) const SERIAL_NUMBER: u32 = 0x1234_ABCD;
pub(crate) const FAT32_CLUSTERS: u32 = 66000;

const SECTOR_SIZE: u16 = 512;

fn put(bytes: &mut [u8], offset: usize, value: &[u8]) {
    bytes[offset..offset + value.len()].copy_from_slice(value);
}

fn clock() -> DateTime {
    DateTime::FIXED
}

pub(crate) fn options() -> Options {
    Options { clock, ..Default::default() }
}

pub(crate) fn volume(io: MemoryIO) -> Volume<MemoryIO> {
    Volume::mount(io, options()).unwrap()
}

pub(crate) fn filesystem(io: MemoryIO) -> FileSystem<MemoryIO> {
    FileSystem::mount(io, options()).unwrap()
}

struct Geometry {
    total_sectors: u32,
    cluster_sectors: u8,
    reserved: u16,
    root_entries: u16,
    fat_length: u32,
    media: u8,
}

/// BIOS parameter block common to every FAT variant
fn bpb(io: &mut MemoryIO, geometry: &Geometry) {
    let sector = io.sector_mut(0);
    put(sector, 0, &[0xEB, 0x3C, 0x90]);
    put(sector, 3, b"MSWIN4.1");
    put(sector, 11, &SECTOR_SIZE.to_le_bytes());
    sector[13] = geometry.cluster_sectors;
    put(sector, 14, &geometry.reserved.to_le_bytes());
    sector[16] = 2;
    put(sector, 17, &geometry.root_entries.to_le_bytes());
    match u16::try_from(geometry.total_sectors) {
        Ok(total) => put(sector, 19, &total.to_le_bytes()),
        Err(_) => put(sector, 32, &geometry.total_sectors.to_le_bytes()),
    }
    sector[21] = geometry.media;
    if geometry.root_entries != 0 {
        put(sector, 22, &(geometry.fat_length as u16).to_le_bytes());
    }
    put(sector, 24, &63u16.to_le_bytes());
    put(sector, 26, &255u16.to_le_bytes());
    put(sector, boot::SIGNATURE_OFFSET, &boot::SIGNATURE);
}

/// Extended boot record at `offset`
fn ebr(io: &mut MemoryIO, offset: usize, filesystem_type: &[u8; 8]) {
    let sector = io.sector_mut(0);
    sector[offset] = 0x80;
    sector[offset + 2] = 0x29;
    put(sector, offset + 3, &SERIAL_NUMBER.to_le_bytes());
    put(sector, offset + 7, b"NO NAME    ");
    put(sector, offset + 18, filesystem_type);
}

/// Reserved entries 0 and 1 in both FATs, plus the end of the FAT32 root chain
fn reserved_links(io: &mut MemoryIO, geometry: &Geometry, links: &[u8]) {
    for copy in 0..2u64 {
        let sector = geometry.reserved as u64 + copy * geometry.fat_length as u64;
        put(io.sector_mut(sector), 0, links);
    }
}

/// 1.44 MB floppy layout
pub(crate) fn fat12() -> MemoryIO {
    let geometry =
        Geometry { total_sectors: 2880, cluster_sectors: 1, reserved: 1, root_entries: 224, fat_length: 9, media: 0xF0 };
    let mut io = MemoryIO::new(SECTOR_SIZE, geometry.total_sectors as u64);
    bpb(&mut io, &geometry);
    ebr(&mut io, 36, b"FAT12   ");
    reserved_links(&mut io, &geometry, &[0xF0, 0xFF, 0xFF]);
    io
}

pub(crate) fn fat16() -> MemoryIO {
    let geometry = Geometry {
        total_sectors: 16384,
        cluster_sectors: 1,
        reserved: 1,
        root_entries: 512,
        fat_length: 64,
        media: 0xF8,
    };
    let mut io = MemoryIO::new(SECTOR_SIZE, geometry.total_sectors as u64);
    bpb(&mut io, &geometry);
    ebr(&mut io, 36, b"FAT16   ");
    reserved_links(&mut io, &geometry, &[0xF8, 0xFF, 0xFF, 0xFF]);
    io
}

/// One sector clusters with the root directory in cluster 2
pub(crate) fn fat32() -> MemoryIO {
    let geometry = Geometry {
        total_sectors: 32 + 2 * 516 + FAT32_CLUSTERS,
        cluster_sectors: 1,
        reserved: 32,
        root_entries: 0,
        fat_length: 516,
        media: 0xF8,
    };
    let mut io = MemoryIO::new(SECTOR_SIZE, geometry.total_sectors as u64);
    bpb(&mut io, &geometry);
    let sector = io.sector_mut(0);
    put(sector, 0, &[0xEB, 0x58, 0x90]);
    put(sector, 36, &geometry.fat_length.to_le_bytes());
    put(sector, 44, &2u32.to_le_bytes());
    put(sector, 48, &1u16.to_le_bytes());
    put(sector, 50, &6u16.to_le_bytes());
    ebr(&mut io, 64, b"FAT32   ");
    let fsinfo = io.sector_mut(1);
    put(fsinfo, 0, &boot::FSINFO_LEAD_SIGNATURE.to_le_bytes());
    put(fsinfo, 484, &boot::FSINFO_STRUCT_SIGNATURE.to_le_bytes());
    put(fsinfo, 488, &(FAT32_CLUSTERS - 1).to_le_bytes());
    put(fsinfo, 492, &2u32.to_le_bytes());
    put(fsinfo, 508, &boot::FSINFO_TRAIL_SIGNATURE.to_le_bytes());
    let links = [0xF8, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF, 0xFF, 0x0F];
    reserved_links(&mut io, &geometry, &links);
    io
}

const EXFAT_FAT_OFFSET: u32 = 24;
const EXFAT_FAT_LENGTH: u32 = 16;
const EXFAT_HEAP_OFFSET: u32 = 64;
const EXFAT_CLUSTERS: u32 = 1024;
const EXFAT_CLUSTER_SHIFT: u8 = 3;

/// Compressed up-case table folding ASCII and Latin-1 letters
fn upcase_table() -> alloc::vec::Vec<u8> {
    let mut units = alloc::vec![0xFFFFu16, 0x61];
    units.extend(0x41..=0x5Au16);
    units.extend([0xFFFF, 0x65]);
    units.extend((0xE0..=0xFEu16).map(|unit| if unit == 0xF7 { unit } else { unit - 0x20 }));
    units.extend([0x178, 0xFFFF, 0xFE00]);
    units.iter().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// 4 KiB clusters: bitmap in cluster 2, up-case table in 3 and root directory in 4
pub(crate) fn exfat() -> MemoryIO {
    let cluster_sectors = 1u32 << EXFAT_CLUSTER_SHIFT;
    let volume_length = EXFAT_HEAP_OFFSET + EXFAT_CLUSTERS * cluster_sectors;
    let mut io = MemoryIO::new(SECTOR_SIZE, volume_length as u64);

    let sector = io.sector_mut(0);
    put(sector, 0, &[0xEB, 0x76, 0x90]);
    put(sector, 3, b"EXFAT   ");
    put(sector, 72, &(volume_length as u64).to_le_bytes());
    put(sector, 80, &EXFAT_FAT_OFFSET.to_le_bytes());
    put(sector, 84, &EXFAT_FAT_LENGTH.to_le_bytes());
    put(sector, 88, &EXFAT_HEAP_OFFSET.to_le_bytes());
    put(sector, 92, &EXFAT_CLUSTERS.to_le_bytes());
    put(sector, 96, &4u32.to_le_bytes());
    put(sector, 100, &SERIAL_NUMBER.to_le_bytes());
    put(sector, 104, &0x100u16.to_le_bytes());
    sector[108] = 9;
    sector[109] = EXFAT_CLUSTER_SHIFT;
    sector[110] = 1;
    sector[111] = 0x80;
    put(sector, boot::SIGNATURE_OFFSET, &boot::SIGNATURE);
    for i in 1..=8 {
        put(io.sector_mut(i), 510, &boot::SIGNATURE);
    }
    let mut checksum = BootChecksum::default();
    for i in 0..11u64 {
        checksum.write(i as usize, &io.sector(i));
    }
    let sum = checksum.sum().to_le_bytes();
    for chunk in io.sector_mut(11).chunks_exact_mut(4) {
        chunk.copy_from_slice(&sum);
    }

    // Clusters 2 to 4 each end their own chain
    let mut links = alloc::vec::Vec::new();
    for value in [0xFFFF_FFF8u32, u32::MAX, u32::MAX, u32::MAX, u32::MAX] {
        links.extend_from_slice(&value.to_le_bytes());
    }
    put(io.sector_mut(EXFAT_FAT_OFFSET as u64), 0, &links);

    let cluster_sector = |cluster: u32| (EXFAT_HEAP_OFFSET + (cluster - 2) * cluster_sectors) as u64;
    io.sector_mut(cluster_sector(2))[0] = 0b111;
    let table = upcase_table();
    put(io.sector_mut(cluster_sector(3)), 0, &table);
    let mut table_checksum = Checksum::default();
    table_checksum.write(&table);

    let root = io.sector_mut(cluster_sector(4));
    root[0] = 0x81;
    put(root, 20, &2u32.to_le_bytes());
    put(root, 24, &(EXFAT_CLUSTERS.div_ceil(8) as u64).to_le_bytes());
    root[32] = 0x82;
    put(root, 36, &table_checksum.sum().to_le_bytes());
    put(root, 52, &3u32.to_le_bytes());
    put(root, 56, &(table.len() as u64).to_le_bytes());
    io
}
