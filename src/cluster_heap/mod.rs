pub(crate) mod allocation_bitmap;
pub(crate) mod chain;
pub(crate) mod context;
pub(crate) mod directory;
pub(crate) mod file;
mod namespace;
pub(crate) mod object;
