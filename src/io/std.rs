use std::fs;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::Path;

use super::Status;
use crate::types::SectorID;

/// Disk image or raw device accessed through the host filesystem
#[derive(Debug)]
pub struct FileIO {
    file: fs::File,
    sector_size: u16,
    read_only: bool,
}

impl FileIO {
    pub fn open<P: AsRef<Path>>(filepath: P) -> std::io::Result<Self> {
        let file = fs::File::options().read(true).write(true).open(filepath)?;
        Ok(Self { file, sector_size: 512, read_only: false })
    }

    pub fn open_read_only<P: AsRef<Path>>(filepath: P) -> std::io::Result<Self> {
        let file = fs::File::options().read(true).open(filepath)?;
        Ok(Self { file, sector_size: 512, read_only: true })
    }

    pub fn with_sector_size(mut self, sector_size: u16) -> Self {
        self.sector_size = sector_size;
        self
    }

    fn seek(&mut self, sector: SectorID) -> std::io::Result<u64> {
        let offset = u64::from(sector) * self.sector_size as u64;
        self.file.seek(SeekFrom::Start(offset))
    }
}

impl super::IO for FileIO {
    type Error = std::io::Error;

    fn status(&mut self) -> Status {
        let mut status = Status::default();
        status.set_write_protected(self.read_only);
        status
    }

    fn sector_size(&self) -> u16 {
        self.sector_size
    }

    fn read(&mut self, sector: SectorID, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.seek(sector)?;
        self.file.read_exact(buf)
    }

    fn write(&mut self, sector: SectorID, buf: &[u8]) -> Result<(), Self::Error> {
        self.seek(sector)?;
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.file.flush()
    }
}
