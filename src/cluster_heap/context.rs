use alloc::vec::Vec;

use crate::error::OperationError;
use crate::types::ClusterID;

/// Containing directory and entry offset of an object
pub(crate) type LockKey = (ClusterID, u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
    /// Remove or rename, requires the object not to be open at all
    Remove,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Lock {
    key: LockKey,
    readers: u16,
    writer: bool,
}

/// Sharing policy of open objects: many readers or one writer
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    capacity: Option<usize>,
    // Sorted by key
    locks: Vec<Lock>,
}

impl LockTable {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self { capacity, locks: Vec::new() }
    }

    pub(crate) fn clear(&mut self) {
        self.locks.clear()
    }

    /// Whether `access` to the object would be granted
    pub(crate) fn check(&self, key: LockKey, access: Access) -> Result<(), OperationError> {
        let capacity = match self.capacity {
            Some(capacity) => capacity,
            None => return Ok(()),
        };
        match self.locks.binary_search_by_key(&key, |lock| lock.key) {
            Ok(index) => match (access, self.locks[index].writer) {
                (Access::Read, false) => Ok(()),
                _ => Err(OperationError::Locked),
            },
            Err(_) if access != Access::Remove && self.locks.len() >= capacity => {
                Err(OperationError::TooManyOpenFiles)
            }
            Err(_) => Ok(()),
        }
    }

    /// Whether a new object could be added
    pub(crate) fn has_room(&self) -> bool {
        self.capacity.is_none_or(|capacity| self.locks.len() < capacity)
    }

    pub(crate) fn acquire(&mut self, key: LockKey, access: Access) -> Result<(), OperationError> {
        if self.capacity.is_none() {
            return Ok(());
        }
        self.check(key, access)?;
        match self.locks.binary_search_by_key(&key, |lock| lock.key) {
            Ok(index) => self.locks[index].readers += 1,
            Err(index) => {
                let writer = access != Access::Read;
                let lock = Lock { key, readers: if writer { 0 } else { 1 }, writer };
                self.locks.insert(index, lock);
            }
        }
        Ok(())
    }

    pub(crate) fn release(&mut self, key: LockKey) {
        let index = match self.locks.binary_search_by_key(&key, |lock| lock.key) {
            Ok(index) => index,
            Err(_) => return,
        };
        let lock = &mut self.locks[index];
        if lock.writer || lock.readers <= 1 {
            self.locks.remove(index);
        } else {
            lock.readers -= 1;
        }
    }
}
