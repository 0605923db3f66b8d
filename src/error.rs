use core::fmt::{Debug, Display, Formatter, Result};

use displaydoc::Display;
use thiserror::Error;

/// Outcome of a public operation, numbered as the classic FatFs result codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[repr(u8)]
pub enum ResultCode {
    /// Succeeded
    Ok = 0,
    /// A hard error occurred in the low level disk I/O layer
    DiskErr,
    /// Internal consistency check failed
    IntErr,
    /// The physical drive cannot work
    NotReady,
    /// Could not find the file
    NoFile,
    /// Could not find the path
    NoPath,
    /// The path name format is invalid
    InvalidName,
    /// Access denied due to prohibited access or directory full
    Denied,
    /// Object already exists
    Exist,
    /// The file or directory object is invalid
    InvalidObject,
    /// The physical drive is write protected
    WriteProtected,
    /// The logical drive number is invalid
    InvalidDrive,
    /// The volume is not mounted
    NotEnabled,
    /// There is no valid FAT volume
    NoFilesystem,
    /// Formatting aborted
    MkfsAborted,
    /// Could not get a grant to access the volume within defined period
    Timeout,
    /// The operation is rejected according to the file sharing policy
    Locked,
    /// Working buffer could not be allocated
    NotEnoughCore,
    /// Number of open objects exceeds the lock table
    TooManyOpenFiles,
    /// Given parameter is invalid
    InvalidParameter,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum DeviceError {
    /// Device not ready
    NotReady,
    /// Device write protected
    WriteProtected,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum DataError {
    /// Boot sector signature missing
    BootSignature,
    /// Not a FAT or exFAT volume
    NotFAT,
    /// Inconsistent volume geometry
    Geometry,
    /// Boot region checksum mismatch
    BootChecksum,
    /// Allocation bitmap missing or broken
    AllocationBitmap,
    /// Upcase table checksum mismatch
    UpcaseTableChecksum,
    /// Broken cluster chain
    FATChain,
    /// Cluster chain loops back on itself
    ChainLoop,
    /// Allocation bitmap disagrees with the chain
    BitmapMismatch,
    /// Corrupted directory entry
    Metadata,
    /// Directory entry set checksum mismatch
    EntrySetChecksum,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum ImplementationError {
    /// TexFAT not supported
    TexFATNotSupported,
    /// Sector size not supported
    SectorSize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum OperationError {
    /// No such file
    NotFound,
    /// No such path
    NoPath,
    /// Already exists
    AlreadyExists,
    /// Access denied
    Denied,
    /// Directory not empty
    DirectoryNotEmpty,
    /// Directory full
    DirectoryFull,
    /// Locked by another open object
    Locked,
    /// Too many open objects
    TooManyOpenFiles,
    /// Handle is stale or closed
    InvalidObject,
    /// Volume not mounted
    NotEnabled,
    /// Timed out waiting for the volume
    Timeout,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum InputError {
    /// Invalid name
    InvalidName,
    /// Invalid drive
    InvalidDrive,
    /// Invalid parameter
    InvalidParameter,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum AllocationError {
    /// No more free cluster
    NoMoreCluster,
    /// Working buffer exhausted
    NotEnoughCore,
}

#[derive(Debug)]
pub enum Error<E> {
    IO(E),
    Device(DeviceError),
    Data(DataError),
    Implementation(ImplementationError),
    Operation(OperationError),
    Input(InputError),
    Allocation(AllocationError),
}

impl<E> Error<E> {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::IO(_) => ResultCode::DiskErr,
            Self::Device(DeviceError::NotReady) => ResultCode::NotReady,
            Self::Device(DeviceError::WriteProtected) => ResultCode::WriteProtected,
            Self::Data(error) => match error {
                DataError::BootSignature
                | DataError::NotFAT
                | DataError::Geometry
                | DataError::BootChecksum
                | DataError::AllocationBitmap
                | DataError::UpcaseTableChecksum => ResultCode::NoFilesystem,
                _ => ResultCode::IntErr,
            },
            Self::Implementation(_) => ResultCode::NoFilesystem,
            Self::Operation(error) => match error {
                OperationError::NotFound => ResultCode::NoFile,
                OperationError::NoPath => ResultCode::NoPath,
                OperationError::AlreadyExists => ResultCode::Exist,
                OperationError::Denied
                | OperationError::DirectoryNotEmpty
                | OperationError::DirectoryFull => ResultCode::Denied,
                OperationError::Locked => ResultCode::Locked,
                OperationError::TooManyOpenFiles => ResultCode::TooManyOpenFiles,
                OperationError::InvalidObject => ResultCode::InvalidObject,
                OperationError::NotEnabled => ResultCode::NotEnabled,
                OperationError::Timeout => ResultCode::Timeout,
            },
            Self::Input(InputError::InvalidName) => ResultCode::InvalidName,
            Self::Input(InputError::InvalidDrive) => ResultCode::InvalidDrive,
            Self::Input(InputError::InvalidParameter) => ResultCode::InvalidParameter,
            Self::Allocation(AllocationError::NoMoreCluster) => ResultCode::Denied,
            Self::Allocation(AllocationError::NotEnoughCore) => ResultCode::NotEnoughCore,
        }
    }

    /// Consistency failures terminate the operation and poison the handle involved
    pub fn is_consistency(&self) -> bool {
        matches!(self.code(), ResultCode::IntErr | ResultCode::InvalidObject)
    }
}

impl<E, T> From<&core::result::Result<T, Error<E>>> for ResultCode {
    fn from(result: &core::result::Result<T, Error<E>>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::IO(e) => write!(f, "IO({:?})", e),
            Self::Device(e) => write!(f, "Device({})", e),
            Self::Data(e) => write!(f, "Data({})", e),
            Self::Implementation(e) => write!(f, "Implementation({})", e),
            Self::Operation(e) => write!(f, "Operation({})", e),
            Self::Input(e) => write!(f, "Input({})", e),
            Self::Allocation(e) => write!(f, "Allocation({})", e),
        }
    }
}

impl<E: Debug> core::error::Error for Error<E> {}

macro_rules! from_error {
    ($variant:ident, $type:ty) => {
        impl<E> From<$type> for Error<E> {
            fn from(error: $type) -> Self {
                Self::$variant(error)
            }
        }
    };
}

from_error!(Device, DeviceError);
from_error!(Data, DataError);
from_error!(Implementation, ImplementationError);
from_error!(Operation, OperationError);
from_error!(Input, InputError);
from_error!(Allocation, AllocationError);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_result_code() {
        let error: Error<()> = OperationError::NotFound.into();
        assert_eq!(error.code(), ResultCode::NoFile);
        let error: Error<()> = AllocationError::NoMoreCluster.into();
        assert_eq!(error.code(), ResultCode::Denied);
        let error: Error<()> = DataError::ChainLoop.into();
        assert!(error.is_consistency());
        assert_eq!(ResultCode::InvalidParameter as u8, 19);
        assert_eq!(ResultCode::Timeout as u8, 15);
        let result: core::result::Result<(), Error<()>> = Ok(());
        assert_eq!(ResultCode::from(&result), ResultCode::Ok);
    }
}
