/// Boot region, volume configuration parameters
pub(crate) mod boot;

/// FAT region, cluster link table
pub(crate) mod fat;

/// Data region, directory entries
pub(crate) mod data;

use core::mem::size_of;

/// Copy a packed on-disk structure out of raw bytes
pub(crate) fn load<T: Copy>(bytes: &[u8]) -> T {
    assert!(bytes.len() >= size_of::<T>());
    unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}

/// Copy a packed on-disk structure into raw bytes
pub(crate) fn store<T: Copy>(bytes: &mut [u8], value: &T) {
    assert!(bytes.len() >= size_of::<T>());
    unsafe { core::ptr::write_unaligned(bytes.as_mut_ptr() as *mut T, *value) }
}

#[inline]
pub(crate) fn le16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
pub(crate) fn le32(bytes: &[u8], offset: usize) -> u32 {
    let mut array = [0u8; 4];
    array.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(array)
}
