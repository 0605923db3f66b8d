use crate::codepage::{ASCII, CodePage};
use crate::datetime::DateTime;

/// Mount time configuration
#[derive(Copy, Clone)]
pub struct Options {
    /// Logical drive number a path prefix such as `0:` must refer to
    pub drive: u8,
    /// OEM code page of short names
    pub codepage: &'static (dyn CodePage + Sync),
    /// Timestamp source of created and modified entries
    pub clock: fn() -> DateTime,
    /// Capacity of the open object lock table, `None` disables sharing policy
    pub locks: Option<usize>,
    /// Attempts made to acquire the volume before giving up with `Timeout`
    pub timeout: u32,
    pub read_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            drive: 0,
            codepage: &ASCII,
            clock: DateTime::now,
            locks: Some(16),
            timeout: 1000,
            read_only: false,
        }
    }
}

impl core::fmt::Debug for Options {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Options")
            .field("drive", &self.drive)
            .field("locks", &self.locks)
            .field("timeout", &self.timeout)
            .field("read_only", &self.read_only)
            .finish()
    }
}
