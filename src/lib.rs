#![doc = include_str!("../README.md")]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

#[macro_use]
extern crate hex_literal;
extern crate heapless;
#[macro_use]
extern crate log;

mod cluster_heap;
mod codec;
pub mod codepage;
pub mod datetime;
mod endian;
pub mod error;
mod fat;
pub mod file;
pub mod fs;
pub mod io;
pub mod options;
mod path;
mod region;
pub(crate) mod sync;
#[cfg(test)]
mod testing;
pub mod types;
mod upcase_table;
mod volume;
mod window;

use alloc::string::String;
use core::fmt::Debug;

pub use cluster_heap::directory::Directory;
pub use cluster_heap::file::{File, Fragment};
pub use datetime::{DateTime, Timestamp};
use error::Error;
pub use file::{Attributes, FileInfo, OpenMode, SeekFrom};
pub use fs::FsType;
pub use options::Options;
use sync::{Shared, acquire, shared};
use volume::Volume;

/// Geometry of a mounted volume
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Info {
    pub fs_type: FsType,
    pub sector_size: u32,
    pub cluster_size: u32,
    pub clusters: u32,
    pub serial_number: u32,
}

/// A FAT12, FAT16, FAT32 or exFAT volume on a block device.
///
/// Every operation takes the volume gate for its whole duration, files and
/// directories opened from here share it.
pub struct FileSystem<IO: io::IO> {
    volume: Shared<Volume<IO>>,
    timeout: u32,
}

impl<E: Debug, IO: io::IO<Error = E>> FileSystem<IO> {
    pub fn mount(io: IO, options: Options) -> Result<Self, Error<E>> {
        let timeout = options.timeout;
        let volume = Volume::mount(io, options)?;
        Ok(Self { volume: shared(volume), timeout })
    }

    fn run<T, F>(&self, write: bool, f: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Volume<IO>) -> Result<T, Error<E>>,
    {
        let mut volume = acquire!(self.volume, self.timeout);
        volume.prepare(write)?;
        let result = f(&mut volume);
        volume.settle(result)
    }

    /// Flush everything, open handles become invalid and further calls fail `NotEnabled`
    pub fn unmount(&self) -> Result<(), Error<E>> {
        let mut volume = acquire!(self.volume, self.timeout);
        volume.unmount()
    }

    /// Read the boot region again, open handles become invalid
    pub fn remount(&self) -> Result<(), Error<E>> {
        let mut volume = acquire!(self.volume, self.timeout);
        volume.remount()
    }

    pub fn info(&self) -> Result<Info, Error<E>> {
        self.run(false, |volume| {
            let layout = &volume.layout;
            Ok(Info {
                fs_type: layout.fs_type,
                sector_size: layout.sector_size,
                cluster_size: layout.cluster_size(),
                clusters: layout.cluster_count(),
                serial_number: volume.serial_number,
            })
        })
    }

    pub fn fs_type(&self) -> Result<FsType, Error<E>> {
        self.info().map(|info| info.fs_type)
    }

    pub fn serial_number(&self) -> Result<u32, Error<E>> {
        self.info().map(|info| info.serial_number)
    }

    pub fn open(&self, path: &str, mode: OpenMode) -> Result<File<IO>, Error<E>> {
        File::open(&self.volume, self.timeout, path, mode)
    }

    pub fn open_dir(&self, path: &str) -> Result<Directory<IO>, Error<E>> {
        Directory::open(&self.volume, self.timeout, path, None)
    }

    /// Open the directory `path` and return its first record matching `pattern`,
    /// continue with [`Directory::find_next`]
    pub fn find_first(&self, path: &str, pattern: &str) -> Result<(Directory<IO>, Option<FileInfo>), Error<E>> {
        let mut directory = Directory::open(&self.volume, self.timeout, path, Some(pattern))?;
        let first = directory.find_next()?;
        Ok((directory, first))
    }

    pub fn stat(&self, path: &str) -> Result<FileInfo, Error<E>> {
        self.run(false, |volume| volume.stat(path))
    }

    pub fn mkdir(&self, path: &str) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.mkdir(path))
    }

    /// Remove a file or an empty directory
    pub fn remove(&self, path: &str) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.remove(path))
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.rename(from, to))
    }

    /// Change the attributes selected by `mask`, only read-only, hidden, system
    /// and archive can change
    pub fn chmod(&self, path: &str, attributes: Attributes, mask: Attributes) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.chmod(path, attributes, mask))
    }

    pub fn utime(&self, path: &str, datetime: DateTime) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.utime(path, datetime))
    }

    pub fn chdir(&self, path: &str) -> Result<(), Error<E>> {
        self.run(false, |volume| volume.chdir(path))
    }

    pub fn getcwd(&self) -> Result<String, Error<E>> {
        self.run(false, |volume| Ok(volume.getcwd()))
    }

    pub fn free_clusters(&self) -> Result<u32, Error<E>> {
        self.run(false, |volume| volume.free_clusters())
    }

    pub fn label(&self) -> Result<String, Error<E>> {
        self.run(false, |volume| volume.label())
    }

    pub fn set_label(&self, label: &str) -> Result<(), Error<E>> {
        self.run(true, |volume| volume.set_label(label))
    }

    /// Write back cached metadata and flush the device
    pub fn sync(&self) -> Result<(), Error<E>> {
        self.run(false, |volume| volume.sync())
    }

    /// Give the device back, fails while files or directories are still open
    pub fn try_free(self) -> Result<IO, Self> {
        let FileSystem { volume, timeout } = self;
        match sync::try_unwrap(volume) {
            Ok(volume) => Ok(volume.io),
            Err(volume) => Err(Self { volume, timeout }),
        }
    }
}
