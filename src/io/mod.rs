pub mod memory;
#[cfg(feature = "std")]
pub mod std;

use core::fmt::Debug;

use bitfield::bitfield;

use crate::types::SectorID;

pub const MIN_SECTOR_SIZE: u16 = 512;
pub const MAX_SECTOR_SIZE: u16 = 4096;

bitfield! {
    /// Drive status bits reported by the block device
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Status(u8);
    impl Debug;
    pub not_initialized, set_not_initialized: 0;
    pub no_disk, set_no_disk: 1;
    pub write_protected, set_write_protected: 2;
}

/// Block device driver supplied by the host.
///
/// Sector numbers are absolute on the physical drive, buffers are exactly
/// one sector long.
pub trait IO {
    type Error: Debug;

    /// Current drive status, polled before every volume operation
    fn status(&mut self) -> Status {
        Status::default()
    }

    /// Bring the drive up, returning the status afterwards
    fn initialize(&mut self) -> Result<Status, Self::Error> {
        Ok(self.status())
    }

    fn sector_size(&self) -> u16 {
        MIN_SECTOR_SIZE
    }

    fn read(&mut self, sector: SectorID, buf: &mut [u8]) -> Result<(), Self::Error>;
    fn write(&mut self, sector: SectorID, buf: &[u8]) -> Result<(), Self::Error>;
    /// Complete any pending write process
    fn flush(&mut self) -> Result<(), Self::Error>;
}

impl<T: IO + ?Sized> IO for &mut T {
    type Error = T::Error;

    fn status(&mut self) -> Status {
        (**self).status()
    }

    fn initialize(&mut self) -> Result<Status, Self::Error> {
        (**self).initialize()
    }

    fn sector_size(&self) -> u16 {
        (**self).sector_size()
    }

    fn read(&mut self, sector: SectorID, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(sector, buf)
    }

    fn write(&mut self, sector: SectorID, buf: &[u8]) -> Result<(), Self::Error> {
        (**self).write(sector, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}
