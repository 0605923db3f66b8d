use alloc::vec::Vec;
use core::fmt::Debug;

use super::context::Access;
use super::directory::entry::{Body, Record};
use super::object::Object;
use crate::error::{AllocationError, DataError, Error, InputError, OperationError};
use crate::file::{Attributes, ChainStatus, OpenMode, SeekFrom};
use crate::fs::FsType;
use crate::io;
use crate::path::Target;
use crate::region::data::ENTRY_SIZE;
use crate::region::data::short::ShortEntry;
use crate::region::fat::Link;
use crate::region::{load, store};
use crate::sync::{Shared, acquire, try_acquire};
use crate::types::{ClusterID, SectorID};
use crate::volume::Volume;

/// A run of consecutive clusters in a chain
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub start: ClusterID,
    pub length: u32,
}

/// State of an open file, everything but the volume itself
#[derive(Debug)]
struct Handle {
    object: Object,
    mode: OpenMode,
    position: u64,
    /// Cluster holding the byte before the position, NONE at the start
    cluster: ClusterID,
    /// Sector and byte offset of the short entry, legacy volumes only
    entry: Option<(SectorID, usize)>,
    modified: bool,
    link_map: Option<Vec<Fragment>>,
    poisoned: bool,
    closed: bool,
}

pub struct File<IO: io::IO> {
    volume: Shared<Volume<IO>>,
    timeout: u32,
    handle: Handle,
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    /// Resolve, create or reset the file `path` names, according to `mode`
    fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<Handle, Error<E>> {
        let resolution = self.resolve(path)?;
        let mut directory = resolution.directory(self.generation);
        let access = match mode.difference(OpenMode::READ).is_empty() {
            true => Access::Read,
            false => Access::Write,
        };
        let record = match (resolution.target, resolution.name) {
            (Target::Found(record), _) => {
                let object = self.object_of(&record, &directory);
                self.locks.check(object.lock_key(), access)?;
                let attributes = record.body.attributes();
                if mode.creates() {
                    if attributes.intersects(Attributes::READ_ONLY | Attributes::DIRECTORY) {
                        return Err(OperationError::Denied.into());
                    }
                    if mode.contains(OpenMode::CREATE_NEW) {
                        return Err(OperationError::AlreadyExists.into());
                    }
                } else {
                    if attributes.contains(Attributes::DIRECTORY) {
                        return Err(OperationError::NotFound.into());
                    }
                    if mode.writes() && attributes.contains(Attributes::READ_ONLY) {
                        return Err(OperationError::Denied.into());
                    }
                }
                match mode.contains(OpenMode::CREATE_ALWAYS) {
                    true => self.reset_file(&directory, record)?,
                    false => record,
                }
            }
            (Target::Missing, Some(name)) if mode.creates() => {
                if !self.locks.has_room() {
                    return Err(OperationError::TooManyOpenFiles.into());
                }
                let template = self.template(Attributes::ARCHIVE);
                let record = self.register(&mut directory, &name, template)?;
                trace!("Created file {}", path);
                record
            }
            (Target::Missing, _) => return Err(OperationError::NotFound.into()),
            (Target::Origin, _) => return Err(InputError::InvalidName.into()),
        };
        let object = self.object_of(&record, &directory);
        let entry = match self.layout.is_exfat() {
            true => None,
            false => self.entry_location(&object)?,
        };
        self.locks.acquire(object.lock_key(), access)?;
        let mut handle = Handle {
            object,
            mode,
            position: 0,
            cluster: ClusterID::NONE,
            entry,
            modified: false,
            link_map: None,
            poisoned: false,
            closed: false,
        };
        if mode.seeks_end() {
            let size = handle.object.size;
            if let Err(error) = self.seek_file(&mut handle, size) {
                self.locks.release(object.lock_key());
                return Err(error);
            }
        }
        Ok(handle)
    }

    /// Drop the content of an existing file as create-always asks
    fn reset_file(&mut self, directory: &Object, mut record: Record) -> Result<Record, Error<E>> {
        let mut object = self.object_of(&record, directory);
        let now = (self.options.clock)();
        let fat32 = self.layout.fs_type == FsType::FAT32;
        match &mut record.body {
            Body::Short(entry) => {
                entry.attributes = Attributes::ARCHIVE.bits();
                entry.create_timestamp = u32::from(now.timestamp).into();
                entry.set_modified(now.timestamp);
                entry.set_cluster(ClusterID::NONE, fat32);
                entry.file_size = 0.into();
            }
            Body::Set(set) => {
                let mut file_directory = set.file_directory();
                file_directory.set_file_attributes(Attributes::ARCHIVE);
                file_directory.set_create_timestamp(now);
                file_directory.set_last_modified_timestamp(now);
                set.set_file_directory(&file_directory);
                let mut stream = set.stream();
                stream.set_allocation(ClusterID::NONE, 0, false);
                set.set_stream(&stream);
            }
        }
        self.rewrite(directory, &mut record)?;
        if object.sclust.valid() {
            let sclust = object.sclust;
            self.remove_chain(&mut object, sclust, ClusterID::NONE)?;
            debug!("Chain from {} released by create-always", sclust);
        }
        Ok(record)
    }

    /// Move the position to `offset`. A writable file grows up to `offset`, or
    /// as far as free clusters allow.
    fn seek_file(&mut self, handle: &mut Handle, offset: u64) -> Result<u64, Error<E>> {
        let write = handle.mode.writes();
        let mut offset = offset.min(self.layout.max_file_size());
        if !write || handle.link_map.is_some() {
            offset = offset.min(handle.object.size);
        }
        if offset == 0 {
            handle.position = 0;
            handle.cluster = ClusterID::NONE;
            return Ok(0);
        }
        let cluster_size = self.layout.cluster_size() as u64;
        if let Some(map) = &handle.link_map {
            handle.cluster = Self::map_cluster(map, (offset - 1) / cluster_size)?;
            handle.position = offset;
            return Ok(offset);
        }
        let mut cluster = handle.object.sclust;
        if !cluster.valid() {
            if !write {
                warn!("File of {} bytes without a chain", handle.object.size);
                return Err(DataError::FATChain.into());
            }
            cluster = match self.extend(&mut handle.object, ClusterID::NONE) {
                Ok(cluster) => cluster,
                Err(Error::Allocation(AllocationError::NoMoreCluster)) => {
                    handle.position = 0;
                    handle.cluster = ClusterID::NONE;
                    return Ok(0);
                }
                Err(error) => return Err(error),
            };
            handle.object.sclust = cluster;
            handle.modified = true;
        }
        let mut covered = cluster_size;
        while covered < offset {
            // Contiguous exFAT chains end where the size says
            if write && handle.object.size < covered {
                handle.object.size = covered;
                handle.modified = true;
            }
            cluster = match self.next_cluster(&handle.object, cluster)? {
                Link::Next(next) if self.layout.valid(next) => next,
                Link::End if write => {
                    match self.extend(&mut handle.object, cluster) {
                        Ok(next) => next,
                        Err(Error::Allocation(AllocationError::NoMoreCluster)) => {
                            debug!("Disk full, position clipped at {}", covered);
                            offset = covered;
                            break;
                        }
                        Err(error) => return Err(error),
                    }
                }
                link => {
                    warn!("Chain from {} broken at {} ({:?})", handle.object.sclust, cluster, link);
                    return Err(DataError::FATChain.into());
                }
            };
            covered += cluster_size;
        }
        if offset > handle.object.size {
            handle.object.size = offset;
            handle.modified = true;
        }
        handle.position = offset;
        handle.cluster = cluster;
        Ok(offset)
    }

    fn map_cluster(map: &[Fragment], mut index: u64) -> Result<ClusterID, Error<E>> {
        for fragment in map.iter() {
            if index < fragment.length as u64 {
                return Ok(fragment.start + index as u32);
            }
            index -= fragment.length as u64;
        }
        Err(DataError::FATChain.into())
    }

    fn build_link_map(&mut self, handle: &Handle, capacity: usize) -> Result<Vec<Fragment>, Error<E>> {
        let mut map: Vec<Fragment> = Vec::new();
        let mut cluster = handle.object.sclust;
        if !cluster.valid() {
            return Ok(map);
        }
        for _ in 0..self.layout.num_fat_entries {
            match map.last_mut() {
                Some(last) if last.start + last.length == cluster => last.length += 1,
                _ => {
                    if map.len() == capacity {
                        return Err(AllocationError::NotEnoughCore.into());
                    }
                    map.push(Fragment { start: cluster, length: 1 });
                }
            }
            cluster = match self.next_cluster(&handle.object, cluster)? {
                Link::Next(next) if self.layout.valid(next) => next,
                Link::End => return Ok(map),
                _ => return Err(DataError::FATChain.into()),
            };
        }
        warn!("Chain from {} loops", handle.object.sclust);
        Err(DataError::ChainLoop.into())
    }

    /// Cut the file at its position
    fn truncate_file(&mut self, handle: &mut Handle) -> Result<(), Error<E>> {
        if !handle.mode.writes() {
            return Err(OperationError::Denied.into());
        }
        if handle.position >= handle.object.size {
            return Ok(());
        }
        self.flush_fragments(&mut handle.object)?;
        let sclust = handle.object.sclust;
        if handle.position == 0 {
            if sclust.valid() {
                self.remove_chain(&mut handle.object, sclust, ClusterID::NONE)?;
            }
            handle.object.sclust = ClusterID::NONE;
        } else if let Link::Next(next) = self.next_cluster(&handle.object, handle.cluster)? {
            if self.layout.valid(next) {
                self.remove_chain(&mut handle.object, next, handle.cluster)?;
            }
        }
        handle.object.size = handle.position;
        handle.link_map = None;
        handle.modified = true;
        Ok(())
    }

    /// Reserve one contiguous run of clusters for an empty file
    fn expand_file(&mut self, handle: &mut Handle, size: u64, allocate: bool) -> Result<(), Error<E>> {
        let empty = handle.object.size == 0 && !handle.object.sclust.valid();
        if size == 0 || !empty || !handle.mode.writes() || size > self.layout.max_file_size() {
            return Err(OperationError::Denied.into());
        }
        let count = self.layout.clusters_of(size);
        if count > self.layout.cluster_count() as u64 {
            return Err(OperationError::Denied.into());
        }
        let count = count as u32;
        let hint = self.last.map(|last| last + 1u32).unwrap_or(ClusterID::FIRST);
        let start = self.find_run(hint, count)?.ok_or(Error::Operation(OperationError::Denied))?;
        if !allocate {
            // Only steer the next allocation to the run
            self.last = Some(ClusterID::from(u32::from(start) - 1));
            return Ok(());
        }
        self.claim_run(start, count)?;
        handle.object.sclust = start;
        handle.object.size = size;
        handle.object.status = ChainStatus::Contiguous;
        handle.object.n_frag = 0;
        handle.modified = true;
        debug!("Expanded to {} clusters from {}", count, start);
        Ok(())
    }

    /// Write the size, chain and timestamps of a modified file back to its entry
    fn commit(&mut self, handle: &mut Handle) -> Result<(), Error<E>> {
        if !handle.modified {
            return Ok(());
        }
        let object = &mut handle.object;
        self.flush_fragments(object)?;
        let now = (self.options.clock)();
        if self.layout.is_exfat() {
            let (mut cursor, mut set) = self.load_object_set(object)?;
            let mut file_directory = set.file_directory();
            let attributes = file_directory.file_attributes() | Attributes::ARCHIVE;
            file_directory.set_file_attributes(attributes);
            file_directory.set_last_modified_timestamp(now);
            file_directory.set_last_accessed_timestamp(now);
            set.set_file_directory(&file_directory);
            let mut stream = set.stream();
            let contiguous = object.status == ChainStatus::Contiguous;
            stream.set_allocation(object.sclust, object.size, contiguous);
            set.set_stream(&stream);
            set.update_checksum();
            self.store_set(&mut cursor, &set)?;
        } else {
            let (sector, offset) = handle.entry.ok_or(Error::Data(DataError::Metadata))?;
            let fat32 = self.layout.fs_type == FsType::FAT32;
            self.window.load(&mut self.io, sector)?;
            let bytes = &mut self.window.bytes_mut()[offset..offset + ENTRY_SIZE];
            let mut entry: ShortEntry = load(bytes);
            entry.attributes |= Attributes::ARCHIVE.bits();
            entry.set_cluster(object.sclust, fat32);
            entry.file_size = (object.size as u32).into();
            entry.set_modified(now.timestamp);
            store(bytes, &entry);
        }
        handle.modified = false;
        trace!("Entry of chain {} updated, size {}", object.sclust, object.size);
        Ok(())
    }

    fn release_file(&mut self, handle: &mut Handle) {
        if handle.object.generation == self.generation {
            self.locks.release(handle.object.lock_key());
        }
        handle.closed = true;
    }
}

impl<E: Debug, IO: io::IO<Error = E>> File<IO> {
    pub(crate) fn open(
        shared: &Shared<Volume<IO>>,
        timeout: u32,
        path: &str,
        mode: OpenMode,
    ) -> Result<Self, Error<E>> {
        let mut volume = acquire!(shared, timeout);
        volume.prepare(!mode.difference(OpenMode::READ).is_empty())?;
        let result = volume.open_file(path, mode);
        let handle = volume.settle(result)?;
        Ok(Self { volume: shared.clone(), timeout, handle })
    }

    fn run<T, F>(&mut self, write: bool, f: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Volume<IO>, &mut Handle) -> Result<T, Error<E>>,
    {
        let mut volume = acquire!(self.volume, self.timeout);
        volume.prepare(write)?;
        let handle = &mut self.handle;
        if handle.closed || handle.poisoned || handle.object.generation != volume.generation {
            return Err(OperationError::InvalidObject.into());
        }
        let result = f(&mut volume, handle);
        if let Err(error) = &result {
            if error.is_consistency() {
                warn!("File of chain {} unusable after {}", handle.object.sclust, error);
                handle.poisoned = true;
            }
        }
        volume.settle(result)
    }

    pub fn size(&self) -> u64 {
        self.handle.object.size
    }

    pub fn position(&self) -> u64 {
        self.handle.position
    }

    /// Move the position, returns the position reached.
    ///
    /// A file opened for writing grows when seeking beyond its end, the position
    /// stops short when the volume runs out of clusters.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64, Error<E>> {
        let (size, position) = (self.handle.object.size, self.handle.position);
        let offset = match from {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => size.checked_add_signed(delta),
            SeekFrom::Current(delta) => position.checked_add_signed(delta),
        };
        let offset = offset.ok_or(Error::Input(InputError::InvalidParameter))?;
        let write = self.handle.mode.writes();
        self.run(write, |volume, handle| volume.seek_file(handle, offset))
    }

    /// Run length list of the chain, `capacity` bounds the number of fragments
    pub fn build_link_map(&mut self, capacity: usize) -> Result<Vec<Fragment>, Error<E>> {
        self.run(false, |volume, handle| volume.build_link_map(handle, capacity))
    }

    /// Seek through `map` instead of the link table, seeking then stops at the end of the file
    pub fn set_link_map(&mut self, map: Option<Vec<Fragment>>) {
        self.handle.link_map = map;
    }

    /// Free everything beyond the position
    pub fn truncate(&mut self) -> Result<(), Error<E>> {
        self.run(true, |volume, handle| volume.truncate_file(handle))
    }

    /// Give an empty file one contiguous run of `size` bytes, or with `allocate`
    /// unset only make it the next place clusters are taken from
    pub fn expand(&mut self, size: u64, allocate: bool) -> Result<(), Error<E>> {
        self.run(true, |volume, handle| volume.expand_file(handle, size, allocate))
    }

    pub fn sync(&mut self) -> Result<(), Error<E>> {
        let write = self.handle.modified;
        self.run(write, |volume, handle| {
            volume.commit(handle)?;
            volume.sync()
        })
    }

    /// Sector holding the byte before the position
    pub fn sector(&mut self) -> Result<Option<SectorID>, Error<E>> {
        self.run(false, |volume, handle| {
            if handle.position == 0 || !handle.cluster.valid() {
                return Ok(None);
            }
            let first = volume.layout.sector_of(handle.cluster).ok_or(Error::Data(DataError::FATChain))?;
            let offset = (handle.position - 1) % volume.layout.cluster_size() as u64;
            Ok(Some(first + offset / volume.layout.sector_size as u64))
        })
    }

    pub fn close(mut self) -> Result<(), Error<E>> {
        if self.handle.closed {
            return Ok(());
        }
        let write = self.handle.modified;
        let result = self.run(write, |volume, handle| {
            volume.commit(handle)?;
            volume.sync()
        });
        let volume = self.volume.clone();
        let mut volume = acquire!(volume, self.timeout);
        volume.release_file(&mut self.handle);
        result
    }
}

impl<IO: io::IO> Drop for File<IO> {
    fn drop(&mut self) {
        if self.handle.closed {
            return;
        }
        let mut volume = match try_acquire(&self.volume, self.timeout) {
            Some(volume) => volume,
            None => {
                warn!("File of chain {} dropped without closing", self.handle.object.sclust);
                return;
            }
        };
        let current = self.handle.object.generation == volume.generation;
        if current && !self.handle.poisoned {
            let result = volume.commit(&mut self.handle);
            if let Err(error) = volume.settle(result) {
                warn!("File of chain {} not committed: {}", self.handle.object.sclust, error);
            }
        }
        volume.release_file(&mut self.handle);
    }
}
