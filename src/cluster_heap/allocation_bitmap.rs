use core::fmt::Debug;

use crate::error::{DataError, Error};
use crate::io;
use crate::types::{ClusterID, SectorID};
use crate::volume::Volume;

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    /// Sector, byte index and bit mask of a cluster in the exFAT allocation bitmap
    fn bitmap_location(&self, cluster: ClusterID) -> (SectorID, usize, u8) {
        let index = cluster.offset() as u64;
        let bits_per_sector = self.layout.sector_size as u64 * 8;
        let sector = self.layout.bitmap_base + index / bits_per_sector;
        let byte = (index % bits_per_sector / 8) as usize;
        (sector, byte, 1 << (index % 8))
    }

    pub(crate) fn is_allocated(&mut self, cluster: ClusterID) -> Result<bool, Error<E>> {
        let (sector, byte, mask) = self.bitmap_location(cluster);
        self.window.load(&mut self.io, sector)?;
        Ok(self.window.bytes()[byte] & mask != 0)
    }

    /// Flip `count` bits starting at `cluster`, every bit must currently be `!allocated`
    pub(crate) fn change_bitmap(
        &mut self,
        cluster: ClusterID,
        count: u32,
        allocated: bool,
    ) -> Result<(), Error<E>> {
        for i in 0..count {
            let cluster = cluster + i;
            if !self.layout.valid(cluster) {
                return Err(DataError::FATChain.into());
            }
            let (sector, byte, mask) = self.bitmap_location(cluster);
            self.window.load(&mut self.io, sector)?;
            if (self.window.bytes()[byte] & mask != 0) == allocated {
                warn!("Allocation bitmap bit of cluster {} already {}", cluster, allocated);
                return Err(DataError::BitmapMismatch.into());
            }
            self.window.bytes_mut()[byte] ^= mask;
        }
        Ok(())
    }

    /// Number of clear bits in the bitmap
    pub(crate) fn count_free_bits(&mut self) -> Result<u32, Error<E>> {
        let total = self.layout.cluster_count() as u64;
        let bits_per_sector = self.layout.sector_size as u64 * 8;
        let mut free = 0;
        let mut index = 0u64;
        while index < total {
            self.window.load(&mut self.io, self.layout.bitmap_base + index / bits_per_sector)?;
            let bits = (total - index).min(bits_per_sector);
            let bytes = self.window.bytes();
            for i in 0..bits as usize {
                if bytes[i / 8] & (1 << (i % 8)) == 0 {
                    free += 1;
                }
            }
            index += bits;
        }
        Ok(free)
    }
}
