pub(crate) mod cursor;
pub(crate) mod entry;
mod label;

use alloc::vec::Vec;
use core::fmt::Debug;

use cursor::Cursor;
use entry::Scan;

use super::context::Access;
use super::object::Object;
use crate::codec::pattern;
use crate::error::{Error, OperationError};
use crate::file::FileInfo;
use crate::io;
use crate::path::Target;
use crate::sync::{Shared, acquire, try_acquire};
use crate::volume::Volume;

/// An open directory, listing its records in on-disk order
pub struct Directory<IO: io::IO> {
    volume: Shared<Volume<IO>>,
    timeout: u32,
    cursor: Cursor,
    /// Wildcard of find_first and find_next
    pattern: Option<Vec<u16>>,
    closed: bool,
}

impl<E: Debug, IO: io::IO<Error = E>> Directory<IO> {
    pub(crate) fn open(
        shared: &Shared<Volume<IO>>,
        timeout: u32,
        path: &str,
        pattern: Option<&str>,
    ) -> Result<Self, Error<E>> {
        let mut volume = acquire!(shared, timeout);
        volume.prepare(false)?;
        let result = Self::locate(&mut volume, path);
        let cursor = volume.settle(result)?;
        let pattern = pattern.map(|pattern| pattern.encode_utf16().collect());
        Ok(Self { volume: shared.clone(), timeout, cursor, pattern, closed: false })
    }

    fn locate(volume: &mut Volume<IO>, path: &str) -> Result<Cursor, Error<E>> {
        let resolution = volume.resolve(path)?;
        let directory = resolution.directory(volume.generation);
        let object = match &resolution.target {
            Target::Origin => directory,
            Target::Found(record) => volume.object_of(record, &directory),
            Target::Missing => return Err(OperationError::NoPath.into()),
        };
        if !object.is_directory() {
            return Err(OperationError::NoPath.into());
        }
        let cursor = volume.cursor(&object)?;
        if !object.is_root() {
            volume.locks.acquire(object.lock_key(), Access::Read)?;
        }
        Ok(cursor)
    }

    fn run<T, F>(&mut self, f: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Volume<IO>, &mut Cursor, Option<&[u16]>) -> Result<T, Error<E>>,
    {
        let mut volume = acquire!(self.volume, self.timeout);
        volume.prepare(false)?;
        if self.closed || self.cursor.object.generation != volume.generation {
            return Err(OperationError::InvalidObject.into());
        }
        let result = f(&mut volume, &mut self.cursor, self.pattern.as_deref());
        volume.settle(result)
    }

    /// Next record, None once the directory is exhausted
    pub fn read(&mut self) -> Result<Option<FileInfo>, Error<E>> {
        self.run(|volume, cursor, _| Self::next(volume, cursor))
    }

    fn next(volume: &mut Volume<IO>, cursor: &mut Cursor) -> Result<Option<FileInfo>, Error<E>> {
        let record = match volume.scan(cursor, Scan::Any)? {
            Some(record) => record,
            None => {
                cursor.sector = None;
                return Ok(None);
            }
        };
        let info = volume.file_info(&record);
        volume.advance(cursor, false)?;
        Ok(Some(info))
    }

    /// Start reading from the first record again
    pub fn rewind(&mut self) -> Result<(), Error<E>> {
        self.run(|volume, cursor, _| {
            *cursor = volume.cursor(&cursor.object)?;
            Ok(())
        })
    }

    /// Next record whose long or short name matches the pattern given to find_first
    pub fn find_next(&mut self) -> Result<Option<FileInfo>, Error<E>> {
        self.run(|volume, cursor, pattern| loop {
            let info = match Self::next(volume, cursor)? {
                Some(info) => info,
                None => return Ok(None),
            };
            let pattern = match pattern {
                Some(pattern) => pattern,
                None => return Ok(Some(info)),
            };
            let fold = |unit| volume.fold(unit);
            let name: Vec<u16> = info.name.encode_utf16().collect();
            if pattern::matches(pattern, &name, &fold) {
                return Ok(Some(info));
            }
            let short_name: Vec<u16> = info.short_name.encode_utf16().collect();
            if !short_name.is_empty() && pattern::matches(pattern, &short_name, &fold) {
                return Ok(Some(info));
            }
        })
    }

    fn release(&mut self, volume: &mut Volume<IO>) {
        let object: &Object = &self.cursor.object;
        if !object.is_root() && object.generation == volume.generation {
            volume.locks.release(object.lock_key());
        }
        self.closed = true;
    }

    pub fn close(mut self) -> Result<(), Error<E>> {
        let volume = self.volume.clone();
        let mut volume = acquire!(volume, self.timeout);
        self.release(&mut volume);
        Ok(())
    }
}

impl<IO: io::IO> Drop for Directory<IO> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let object = self.cursor.object;
        if object.is_root() {
            return;
        }
        match try_acquire(&self.volume, self.timeout) {
            Some(mut volume) if object.generation == volume.generation => volume.locks.release(object.lock_key()),
            Some(_) => {}
            None => warn!("Lock of directory {} leaked", object.sclust),
        }
    }
}
