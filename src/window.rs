use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::error::Error;
use crate::io;
use crate::types::SectorID;

/// FAT area written back to every copy
#[derive(Copy, Clone, Debug)]
pub(crate) struct Mirror {
    pub base: SectorID,
    pub length: u32,
    pub copies: u8,
}

/// The one sector sized working buffer of a volume
#[derive(Debug)]
pub(crate) struct Window {
    buffer: Vec<u8>,
    sector: Option<SectorID>,
    dirty: bool,
    mirror: Option<Mirror>,
}

impl Window {
    pub fn new(sector_size: usize) -> Self {
        Self { buffer: vec![0; sector_size], sector: None, dirty: false, mirror: None }
    }

    pub fn set_mirror(&mut self, mirror: Option<Mirror>) {
        self.mirror = mirror;
    }

    pub fn sector(&self) -> Option<SectorID> {
        self.sector
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Borrowing mutably marks the window dirty
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.buffer
    }

    /// Forget the cached sector without writing it back
    pub fn invalidate(&mut self) {
        self.sector = None;
        self.dirty = false;
    }

    pub fn flush<E: Debug, IO: io::IO<Error = E>>(&mut self, io: &mut IO) -> Result<(), Error<E>> {
        let sector = match (self.dirty, self.sector) {
            (true, Some(sector)) => sector,
            _ => return Ok(()),
        };
        io.write(sector, &self.buffer).map_err(Error::IO)?;
        self.dirty = false;
        if let Some(mirror) = self.mirror {
            if sector >= mirror.base && sector - mirror.base < mirror.length as u64 {
                for i in 1..mirror.copies as u64 {
                    let copy = sector + i * mirror.length as u64;
                    io.write(copy, &self.buffer).map_err(Error::IO)?;
                }
            }
        }
        Ok(())
    }

    /// Make `sector` the cached one, writing back the previous one when dirty
    pub fn load<E: Debug, IO: io::IO<Error = E>>(
        &mut self,
        io: &mut IO,
        sector: SectorID,
    ) -> Result<(), Error<E>> {
        if self.sector == Some(sector) {
            return Ok(());
        }
        self.flush(io)?;
        if let Err(e) = io.read(sector, &mut self.buffer) {
            self.sector = None;
            return Err(Error::IO(e));
        }
        self.sector = Some(sector);
        Ok(())
    }

    /// Cache a zero filled `sector` without reading it
    pub fn clear<E: Debug, IO: io::IO<Error = E>>(
        &mut self,
        io: &mut IO,
        sector: SectorID,
    ) -> Result<(), Error<E>> {
        self.flush(io)?;
        self.buffer.fill(0);
        self.sector = Some(sector);
        self.dirty = true;
        Ok(())
    }
}
