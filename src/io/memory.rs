use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use super::Status;
use crate::types::SectorID;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryError {
    OutOfRange(u64),
    Injected,
}

/// Sparse in-memory block device, sectors never written read as zero
#[derive(Clone, Debug)]
pub struct MemoryIO {
    sectors: BTreeMap<u64, Vec<u8>>,
    sector_size: u16,
    num_sectors: u64,
    status: Status,
    /// Fail every access to this sector
    pub fail_sector: Option<u64>,
    pub num_writes: usize,
}

impl MemoryIO {
    pub fn new(sector_size: u16, num_sectors: u64) -> Self {
        Self {
            sectors: BTreeMap::new(),
            sector_size,
            num_sectors,
            status: Status::default(),
            fail_sector: None,
            num_writes: 0,
        }
    }

    pub fn num_sectors(&self) -> u64 {
        self.num_sectors
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status
    }

    /// Raw sector access, bypassing the volume
    pub fn sector(&self, sector: u64) -> Vec<u8> {
        match self.sectors.get(&sector) {
            Some(bytes) => bytes.clone(),
            None => vec![0; self.sector_size as usize],
        }
    }

    pub fn sector_mut(&mut self, sector: u64) -> &mut [u8] {
        let size = self.sector_size as usize;
        self.sectors.entry(sector).or_insert_with(|| vec![0; size])
    }

    fn check(&self, sector: SectorID) -> Result<u64, MemoryError> {
        let index = u64::from(sector);
        if index >= self.num_sectors {
            return Err(MemoryError::OutOfRange(index));
        }
        if self.fail_sector == Some(index) {
            return Err(MemoryError::Injected);
        }
        Ok(index)
    }
}

impl super::IO for MemoryIO {
    type Error = MemoryError;

    fn status(&mut self) -> Status {
        self.status
    }

    fn initialize(&mut self) -> Result<Status, Self::Error> {
        self.status.set_not_initialized(false);
        Ok(self.status)
    }

    fn sector_size(&self) -> u16 {
        self.sector_size
    }

    fn read(&mut self, sector: SectorID, buf: &mut [u8]) -> Result<(), Self::Error> {
        let index = self.check(sector)?;
        match self.sectors.get(&index) {
            Some(bytes) => buf.copy_from_slice(&bytes[..buf.len()]),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write(&mut self, sector: SectorID, buf: &[u8]) -> Result<(), Self::Error> {
        let index = self.check(sector)?;
        self.num_writes += 1;
        self.sector_mut(index)[..buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::IO;

    #[test]
    fn test_sparse() {
        let mut io = MemoryIO::new(512, 4);
        let mut buf = [0xAAu8; 512];
        io.read(1.into(), &mut buf).unwrap();
        assert_eq!(buf, [0u8; 512]);
        io.write(2.into(), &[0x55; 512]).unwrap();
        io.read(2.into(), &mut buf).unwrap();
        assert_eq!(buf, [0x55; 512]);
        assert_eq!(io.read(4.into(), &mut buf), Err(MemoryError::OutOfRange(4)));
        io.fail_sector = Some(2);
        assert_eq!(io.write(2.into(), &buf), Err(MemoryError::Injected));
    }
}
