use core::fmt::Debug;

use crate::cluster_heap::object::Object;
use crate::error::{DataError, Error, OperationError};
use crate::fs::RootDirectory;
use crate::io;
use crate::region::data::entry_type::RawEntryType;
use crate::region::data::short::DELETED;
use crate::region::data::{ENTRY_SIZE, RawEntry};
use crate::region::fat::Link;
use crate::types::{ClusterID, SectorID};
use crate::volume::Volume;

/// Legacy directories are limited to 65536 entries
const MAX_DIRECTORY_SIZE: u32 = 0x20_0000;
const MAX_EXFAT_DIRECTORY_SIZE: u32 = 0x1000_0000;

/// Position of one 32 byte entry inside a directory
#[derive(Copy, Clone, Debug)]
pub(crate) struct Cursor {
    /// The directory walked, its chain state follows stretching
    pub object: Object,
    /// Byte offset of the entry from the start of the directory
    pub offset: u32,
    /// NONE inside a fixed root directory
    pub cluster: ClusterID,
    /// None once the end of the directory is reached
    pub sector: Option<SectorID>,
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    fn directory_limit(&self) -> u32 {
        match self.layout.is_exfat() {
            true => MAX_EXFAT_DIRECTORY_SIZE,
            false => MAX_DIRECTORY_SIZE,
        }
    }

    pub(crate) fn cursor(&mut self, directory: &Object) -> Result<Cursor, Error<E>> {
        self.rewind_to(directory, 0)
    }

    /// Cursor at byte `offset` of `directory`
    pub(crate) fn rewind_to(&mut self, directory: &Object, offset: u32) -> Result<Cursor, Error<E>> {
        if offset >= self.directory_limit() || offset % ENTRY_SIZE as u32 != 0 {
            return Err(DataError::Metadata.into());
        }
        let mut cluster = directory.sclust;
        if !cluster.valid() {
            if let RootDirectory::Chain(root) = self.layout.root {
                cluster = root;
            }
        }
        let sector_size = self.layout.sector_size;
        let mut remaining = offset;
        let base = match (cluster.valid(), self.layout.root) {
            (false, RootDirectory::Fixed { base, entries }) => {
                if offset / ENTRY_SIZE as u32 >= entries as u32 {
                    return Err(DataError::Metadata.into());
                }
                base
            }
            (false, _) => return Err(DataError::FATChain.into()),
            (true, _) => {
                let cluster_size = self.layout.cluster_size();
                while remaining >= cluster_size {
                    cluster = match self.next_cluster(directory, cluster)? {
                        Link::Next(next) if self.layout.valid(next) => next,
                        _ => return Err(DataError::FATChain.into()),
                    };
                    remaining -= cluster_size;
                }
                self.layout.sector_of(cluster).ok_or(Error::Data(DataError::FATChain))?
            }
        };
        let sector = base + (remaining / sector_size) as u64;
        Ok(Cursor { object: *directory, offset, cluster, sector: Some(sector) })
    }

    /// Move to the next entry, a chained directory grows by one cluster when
    /// `stretch` is set. Returns false at the end of the directory.
    pub(crate) fn advance(&mut self, cursor: &mut Cursor, stretch: bool) -> Result<bool, Error<E>> {
        let mut sector = match cursor.sector {
            Some(sector) => sector,
            None => return Ok(false),
        };
        let offset = cursor.offset + ENTRY_SIZE as u32;
        if offset >= self.directory_limit() {
            cursor.sector = None;
            return Ok(false);
        }
        let sector_size = self.layout.sector_size;
        if offset % sector_size == 0 {
            sector += 1u64;
            if !cursor.cluster.valid() {
                if let RootDirectory::Fixed { entries, .. } = self.layout.root {
                    if offset / ENTRY_SIZE as u32 >= entries as u32 {
                        cursor.sector = None;
                        return Ok(false);
                    }
                }
            } else if (offset / sector_size) % self.layout.cluster_sectors == 0 {
                let next = match self.next_cluster(&cursor.object, cursor.cluster)? {
                    Link::Next(next) if self.layout.valid(next) => next,
                    Link::End if stretch => self.stretch(cursor)?,
                    Link::End => {
                        cursor.sector = None;
                        return Ok(false);
                    }
                    _ => return Err(DataError::FATChain.into()),
                };
                cursor.cluster = next;
                sector = self.layout.sector_of(next).ok_or(Error::Data(DataError::FATChain))?;
            }
        }
        cursor.offset = offset;
        cursor.sector = Some(sector);
        Ok(true)
    }

    /// Append a zero filled cluster to the directory under the cursor
    fn stretch(&mut self, cursor: &mut Cursor) -> Result<ClusterID, Error<E>> {
        let cluster = self.extend(&mut cursor.object, cursor.cluster)?;
        self.clear_cluster(cluster)?;
        if self.layout.is_exfat() {
            self.flush_fragments(&mut cursor.object)?;
            if cursor.object.sclust.valid() {
                cursor.object.size += self.layout.cluster_size() as u64;
                cursor.object.stretched = true;
            }
        }
        trace!("Directory {} stretched with cluster {}", cursor.object.sclust, cluster);
        Ok(cluster)
    }

    /// Zero fill a cluster, leaving its first sector in the window
    pub(crate) fn clear_cluster(&mut self, cluster: ClusterID) -> Result<(), Error<E>> {
        let first = self.layout.sector_of(cluster).ok_or(Error::Data(DataError::FATChain))?;
        for i in (0..self.layout.cluster_sectors as u64).rev() {
            self.window.clear(&mut self.io, first + i)?;
        }
        Ok(())
    }

    /// Find `count` consecutive free entries, stretching the directory when needed.
    /// Returns the cursor of the first one.
    pub(crate) fn alloc_entries(&mut self, directory: &Object, count: usize) -> Result<Cursor, Error<E>> {
        let exfat = self.layout.is_exfat();
        let mut cursor = self.cursor(directory)?;
        let mut start = cursor;
        let mut found = 0;
        loop {
            let entry = self.entry(&cursor)?;
            let free = match exfat {
                true => !RawEntryType::from(entry[0]).in_use(),
                false => entry[0] == DELETED || entry[0] == 0,
            };
            if !free {
                found = 0;
            } else {
                if found == 0 {
                    start = cursor;
                }
                found += 1;
                if found == count {
                    start.object = cursor.object;
                    return Ok(start);
                }
            }
            if !self.advance(&mut cursor, true)? {
                return Err(OperationError::DirectoryFull.into());
            }
        }
    }

    fn cursor_location(&mut self, cursor: &Cursor) -> Result<(SectorID, usize), Error<E>> {
        let sector = cursor.sector.ok_or(Error::Data(DataError::Metadata))?;
        Ok((sector, (cursor.offset % self.layout.sector_size) as usize))
    }

    pub(crate) fn entry(&mut self, cursor: &Cursor) -> Result<RawEntry, Error<E>> {
        let (sector, offset) = self.cursor_location(cursor)?;
        self.window.load(&mut self.io, sector)?;
        let mut entry: RawEntry = [0; ENTRY_SIZE];
        entry.copy_from_slice(&self.window.bytes()[offset..offset + ENTRY_SIZE]);
        Ok(entry)
    }

    pub(crate) fn put_entry(&mut self, cursor: &Cursor, entry: &RawEntry) -> Result<(), Error<E>> {
        let (sector, offset) = self.cursor_location(cursor)?;
        self.window.load(&mut self.io, sector)?;
        self.window.bytes_mut()[offset..offset + ENTRY_SIZE].copy_from_slice(entry);
        Ok(())
    }
}
