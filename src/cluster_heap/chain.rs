use core::fmt::Debug;

use super::object::Object;
use crate::error::{AllocationError, DataError, Error};
use crate::file::ChainStatus;
use crate::io;
use crate::region::fat::Link;
use crate::types::ClusterID;
use crate::volume::Volume;

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    /// Cluster following `cluster` in the chain of `object`
    ///
    /// exFAT chains that are contiguous, or whose links are not written yet,
    /// are followed without consulting the link table.
    pub(crate) fn next_cluster(&mut self, object: &Object, cluster: ClusterID) -> Result<Link, Error<E>> {
        if !self.layout.is_exfat() {
            return self.read_link(cluster);
        }
        if object.sclust.valid() && cluster >= object.sclust {
            let offset = cluster - object.sclust;
            match object.status {
                ChainStatus::Contiguous => {
                    let last = self.layout.clusters_of(object.size).max(1) - 1;
                    if (offset as u64) < last {
                        return Ok(Link::Next(cluster + 1u32));
                    }
                    if offset as u64 == last {
                        return Ok(Link::End);
                    }
                    warn!("Cluster {} beyond contiguous chain from {}", cluster, object.sclust);
                    return Err(DataError::FATChain.into());
                }
                ChainStatus::FragmentedThisSession if offset < object.n_cont => {
                    return Ok(Link::Next(cluster + 1u32));
                }
                _ => {}
            }
        }
        if object.n_frag > 0 {
            let first = ClusterID::from(u32::from(object.tail) - (object.n_frag - 1));
            if cluster >= first && cluster <= object.tail {
                return Ok(match cluster == object.tail {
                    true => Link::End,
                    false => Link::Next(cluster + 1u32),
                });
            }
        }
        self.read_link(cluster)
    }

    /// Next cluster in allocation order, wrapping to the first data cluster
    fn successor(&self, cluster: ClusterID) -> ClusterID {
        let next = cluster + 1u32;
        match self.layout.valid(next) {
            true => next,
            false => ClusterID::FIRST,
        }
    }

    fn is_free(&mut self, cluster: ClusterID) -> Result<bool, Error<E>> {
        match self.layout.is_exfat() {
            true => Ok(!self.is_allocated(cluster)?),
            false => Ok(self.read_link_value(cluster)? == 0),
        }
    }

    /// First cluster of `count` free consecutive clusters, scanning from `start` and
    /// wrapping once around the volume
    pub(crate) fn find_run(&mut self, start: ClusterID, count: u32) -> Result<Option<ClusterID>, Error<E>> {
        let total = self.layout.cluster_count();
        if count == 0 || count > total {
            return Ok(None);
        }
        let mut cluster = match self.layout.valid(start) {
            true => start,
            false => ClusterID::FIRST,
        };
        let (mut run_start, mut run_length) = (cluster, 0);
        for _ in 0..total {
            if self.is_free(cluster)? {
                if run_length == 0 {
                    run_start = cluster;
                }
                run_length += 1;
                if run_length == count {
                    return Ok(Some(run_start));
                }
            } else {
                run_length = 0;
            }
            let next = self.successor(cluster);
            if next < cluster {
                run_length = 0;
            }
            cluster = next;
        }
        Ok(None)
    }

    fn consume(&mut self, last: ClusterID, count: u32) {
        self.last = Some(last);
        if let Some(free) = self.free {
            self.free = Some(free.saturating_sub(count));
        }
        self.fsinfo_dirty = true;
    }

    fn release(&mut self, count: u32) {
        if let Some(free) = self.free {
            self.free = Some((free + count).min(self.layout.cluster_count()));
        }
        self.fsinfo_dirty = true;
    }

    /// Take one free cluster, searching after `hint`. The new cluster is marked as
    /// end of chain, or as used in the exFAT bitmap.
    pub(crate) fn allocate(&mut self, hint: ClusterID) -> Result<ClusterID, Error<E>> {
        if self.free == Some(0) {
            // The cached count may be stale
            let free = self.count_free()?;
            self.free = Some(free);
            if free == 0 {
                return Err(AllocationError::NoMoreCluster.into());
            }
        }
        let start = self.successor(hint);
        let cluster = match self.find_run(start, 1)? {
            Some(cluster) => cluster,
            None => {
                self.free = Some(0);
                self.fsinfo_dirty = true;
                return Err(AllocationError::NoMoreCluster.into());
            }
        };
        match self.layout.is_exfat() {
            true => self.change_bitmap(cluster, 1, true)?,
            false => self.write_end_of_chain(cluster)?,
        }
        self.consume(cluster, 1);
        trace!("Allocated cluster {}", cluster);
        Ok(cluster)
    }

    /// Make `count` consecutive clusters from `start` one chain
    pub(crate) fn claim_run(&mut self, start: ClusterID, count: u32) -> Result<(), Error<E>> {
        match self.layout.is_exfat() {
            true => self.change_bitmap(start, count, true)?,
            false => {
                for i in 0..count {
                    let cluster = start + i;
                    match i + 1 == count {
                        true => self.write_end_of_chain(cluster)?,
                        false => self.write_link(cluster, u32::from(cluster) + 1)?,
                    }
                }
            }
        }
        self.consume(start + (count - 1), count);
        Ok(())
    }

    /// Stretch the chain of `object` after `cluster`, or start a new chain when
    /// `cluster` is NONE. An existing link is followed instead.
    pub(crate) fn extend(&mut self, object: &mut Object, cluster: ClusterID) -> Result<ClusterID, Error<E>> {
        let stretching = cluster.valid();
        let mut hint = self.last.unwrap_or(ClusterID::NONE);
        if stretching {
            match self.next_cluster(object, cluster)? {
                Link::Next(next) => return Ok(next),
                Link::Free => {
                    warn!("Free cluster {} inside a chain", cluster);
                    return Err(DataError::FATChain.into());
                }
                Link::End => {}
            }
            hint = cluster;
            if !self.layout.is_exfat() && !self.is_free(self.successor(cluster))? {
                hint = self.last.unwrap_or(cluster);
            }
        }
        let new = self.allocate(hint)?;
        if !stretching {
            object.status = ChainStatus::Contiguous;
            object.n_frag = 0;
        } else if object.status == ChainStatus::Contiguous && new != cluster + 1u32 {
            object.n_cont = cluster - object.sclust;
            object.status = ChainStatus::FragmentedThisSession;
            debug!("Chain from {} fragmented after cluster {}", object.sclust, cluster);
        }
        if !self.layout.is_exfat() {
            if stretching {
                self.write_link(cluster, new.into())?;
            }
            return Ok(new);
        }
        if object.status != ChainStatus::Contiguous {
            if new == cluster + 1u32 {
                object.n_frag = if object.n_frag == 0 { 2 } else { object.n_frag + 1 };
            } else {
                if object.n_frag == 0 {
                    object.n_frag = 1;
                }
                self.fill_last_fragment(object, cluster, new.into())?;
                object.n_frag = 1;
            }
            object.tail = new;
        }
        Ok(new)
    }

    /// Write the links of the pending run ending at `last`, pointing the last one at `term`
    fn fill_last_fragment(&mut self, object: &mut Object, last: ClusterID, term: u32) -> Result<(), Error<E>> {
        while object.n_frag > 0 {
            let cluster = ClusterID::from(u32::from(last) - (object.n_frag - 1));
            let value = match object.n_frag > 1 {
                true => u32::from(cluster) + 1,
                false => term,
            };
            self.write_link(cluster, value)?;
            object.n_frag -= 1;
        }
        Ok(())
    }

    /// Persist links deferred by exFAT fragment bookkeeping
    pub(crate) fn flush_fragments(&mut self, object: &mut Object) -> Result<(), Error<E>> {
        if !self.layout.is_exfat() {
            return Ok(());
        }
        if object.status == ChainStatus::FragmentedThisSession {
            for i in 0..object.n_cont {
                let cluster = object.sclust + i;
                self.write_link(cluster, u32::from(cluster) + 1)?;
            }
            object.status = ChainStatus::NotContiguous;
        }
        if object.n_frag > 0 {
            let (tail, end) = (object.tail, self.links.end_of_chain());
            self.fill_last_fragment(object, tail, end)?;
        }
        Ok(())
    }

    /// Free the chain from `cluster` on, terminating the chain at `previous` if valid
    pub(crate) fn remove_chain(
        &mut self,
        object: &mut Object,
        cluster: ClusterID,
        previous: ClusterID,
    ) -> Result<(), Error<E>> {
        if !self.layout.valid(cluster) {
            return Err(DataError::FATChain.into());
        }
        let exfat = self.layout.is_exfat();
        if previous.valid() && (!exfat || object.status != ChainStatus::Contiguous) {
            self.write_end_of_chain(previous)?;
        }
        // Consecutive clusters released together in the bitmap
        let mut run: Option<(ClusterID, u32)> = None;
        let mut current = cluster;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > self.layout.num_fat_entries {
                warn!("Chain loop while removing from cluster {}", cluster);
                return Err(DataError::ChainLoop.into());
            }
            let next = self.next_cluster(object, current)?;
            if next == Link::Free {
                break;
            }
            if !exfat {
                self.write_link(current, 0)?;
            }
            self.release(1);
            run = match run {
                Some((start, length)) if start + length == current => Some((start, length + 1)),
                Some((start, length)) => {
                    if exfat {
                        self.change_bitmap(start, length, false)?;
                    }
                    Some((current, 1))
                }
                None => Some((current, 1)),
            };
            match next {
                Link::Next(next) => current = next,
                _ => break,
            }
        }
        if let (true, Some((start, length))) = (exfat, run) {
            self.change_bitmap(start, length, false)?;
        }
        if !previous.valid() {
            object.status = ChainStatus::NotContiguous;
            object.n_frag = 0;
            return Ok(());
        }
        if !exfat {
            return Ok(());
        }
        match object.status {
            ChainStatus::NotContiguous => {
                // The remaining chain may have become contiguous
                let mut current = object.sclust;
                for _ in 0..self.layout.num_fat_entries {
                    if current == previous {
                        object.status = ChainStatus::Contiguous;
                        break;
                    }
                    match self.next_cluster(object, current)? {
                        Link::Next(next) if next == current + 1u32 => current = next,
                        Link::Next(_) => break,
                        _ => return Err(DataError::FATChain.into()),
                    }
                }
            }
            ChainStatus::FragmentedThisSession => {
                if previous >= object.sclust && previous <= object.sclust + object.n_cont {
                    object.status = ChainStatus::Contiguous;
                }
            }
            ChainStatus::Contiguous => {}
        }
        Ok(())
    }

    /// Full scan of the link table or bitmap
    pub(crate) fn count_free(&mut self) -> Result<u32, Error<E>> {
        if self.layout.is_exfat() {
            return self.count_free_bits();
        }
        let mut free = 0;
        for cluster in u32::from(ClusterID::FIRST)..self.layout.num_fat_entries {
            if self.read_link_value(cluster.into())? == 0 {
                free += 1;
            }
        }
        debug!("{} free clusters counted", free);
        Ok(free)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing;

    fn chain(volume: &mut Volume<crate::io::memory::MemoryIO>, object: &Object) -> alloc::vec::Vec<u32> {
        let mut clusters = alloc::vec![u32::from(object.sclust)];
        let mut cluster = object.sclust;
        while let Link::Next(next) = volume.next_cluster(object, cluster).unwrap() {
            clusters.push(next.into());
            cluster = next;
        }
        clusters
    }

    #[test]
    fn test_allocate_matches_full_scan() {
        for io in [testing::fat12(), testing::fat16(), testing::fat32(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let free = volume.free_clusters().unwrap();
            let a = volume.allocate(ClusterID::NONE).unwrap();
            let b = volume.allocate(a).unwrap();
            assert_ne!(a, b);
            assert_eq!(volume.free, Some(free - 2));
            assert_eq!(volume.count_free().unwrap(), free - 2);
        }
    }

    #[test]
    fn test_extend_contiguous_then_fragmented() {
        for io in [testing::fat16(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let mut object = Object::default();
            let first = volume.extend(&mut object, ClusterID::NONE).unwrap();
            object.sclust = first;
            object.size = volume.layout.cluster_size() as u64;
            let second = volume.extend(&mut object, first).unwrap();
            object.size *= 2;
            assert_eq!(second, first + 1u32);
            assert_eq!(object.status, ChainStatus::Contiguous);
            // Occupy the next cluster so the chain cannot stay contiguous
            let blocker = volume.allocate(second).unwrap();
            assert_eq!(blocker, second + 1u32);
            let third = volume.extend(&mut object, second).unwrap();
            object.size = 3 * volume.layout.cluster_size() as u64;
            assert_eq!(object.status, ChainStatus::FragmentedThisSession);
            assert_eq!(chain(&mut volume, &object), [first, second, third].map(u32::from));
            volume.flush_fragments(&mut object).unwrap();
            assert_eq!(object.n_frag, 0);
            // Links are on the table now
            assert_eq!(volume.read_link(first).unwrap(), Link::Next(second));
            assert_eq!(volume.read_link(second).unwrap(), Link::Next(third));
            assert_eq!(volume.read_link(third).unwrap(), Link::End);
        }
    }

    #[test]
    fn test_exfat_pending_run() {
        let mut volume = testing::volume(testing::exfat());
        let mut object = Object::default();
        let first = volume.extend(&mut object, ClusterID::NONE).unwrap();
        object.sclust = first;
        object.size = volume.layout.cluster_size() as u64;
        volume.flush_fragments(&mut object).unwrap();
        // A chain with a valid table, as opened from disk
        volume.write_end_of_chain(first).unwrap();
        object.status = ChainStatus::NotContiguous;
        let second = volume.extend(&mut object, first).unwrap();
        let third = volume.extend(&mut object, second).unwrap();
        assert_eq!(object.n_frag, 3);
        assert_eq!(volume.read_link(first).unwrap(), Link::End);
        assert_eq!(chain(&mut volume, &object), [first, second, third].map(u32::from));
        volume.flush_fragments(&mut object).unwrap();
        assert_eq!(volume.read_link(first).unwrap(), Link::Next(second));
        assert_eq!(volume.read_link(third).unwrap(), Link::End);
    }

    #[test]
    fn test_remove_chain() {
        for io in [testing::fat32(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let free = volume.free_clusters().unwrap();
            let mut object = Object::default();
            let mut last = volume.extend(&mut object, ClusterID::NONE).unwrap();
            object.sclust = last;
            for i in 2..=4u64 {
                object.size = (i - 1) * volume.layout.cluster_size() as u64;
                last = volume.extend(&mut object, last).unwrap();
            }
            object.size = 4 * volume.layout.cluster_size() as u64;
            volume.flush_fragments(&mut object).unwrap();
            assert_eq!(volume.free, Some(free - 4));
            let sclust = object.sclust;
            volume.remove_chain(&mut object, sclust + 1u32, sclust).unwrap();
            object.size = volume.layout.cluster_size() as u64;
            assert_eq!(volume.free, Some(free - 1));
            assert_eq!(volume.count_free().unwrap(), free - 1);
            volume.remove_chain(&mut object, sclust, ClusterID::NONE).unwrap();
            assert_eq!(volume.count_free().unwrap(), free);
            assert_eq!(object.status, ChainStatus::NotContiguous);
        }
    }

    #[test]
    fn test_remove_looping_chain() {
        let mut volume = testing::volume(testing::fat16());
        volume.write_link(10.into(), 11).unwrap();
        volume.write_link(11.into(), 12).unwrap();
        volume.write_link(12.into(), 10).unwrap();
        let free = volume.count_free().unwrap();
        let mut object = Object { sclust: 10.into(), ..Default::default() };
        // Freeing a link ends the walk when it comes back to the start
        volume.remove_chain(&mut object, 10.into(), ClusterID::NONE).unwrap();
        assert_eq!(volume.count_free().unwrap(), free + 3);
        assert_eq!(volume.read_link(12.into()).unwrap(), Link::Free);
    }

    #[test]
    fn test_disk_full() {
        let mut volume = testing::volume(testing::fat12());
        let free = volume.free_clusters().unwrap();
        let start = volume.find_run(ClusterID::FIRST, free).unwrap().unwrap();
        volume.claim_run(start, free).unwrap();
        assert_eq!(volume.free, Some(0));
        let result = volume.allocate(ClusterID::NONE);
        assert!(matches!(result, Err(Error::Allocation(AllocationError::NoMoreCluster))));
    }
}
