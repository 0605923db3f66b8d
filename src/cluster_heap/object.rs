use crate::file::{Attributes, ChainStatus};
use crate::types::ClusterID;

/// Directory an exFAT object's entry set lives in
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Container {
    /// Start cluster of the directory, NONE for the root
    pub sclust: ClusterID,
    pub size: u64,
    pub status: ChainStatus,
    /// Byte offset of the entry set inside the directory
    pub offset: u32,
}

/// Identity of a file or directory bound to one mount generation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Object {
    pub generation: u32,
    pub attributes: Attributes,
    pub status: ChainStatus,
    /// The directory got a new cluster during this session
    pub stretched: bool,
    /// NONE for an empty file or the root directory
    pub sclust: ClusterID,
    pub size: u64,
    /// Clusters in the first run minus one, meaningful once fragmented this session
    pub n_cont: u32,
    /// Clusters at the end of the chain whose links are not written yet
    pub n_frag: u32,
    /// Last cluster of the pending run
    pub tail: ClusterID,
    pub container: Container,
}

impl Object {
    pub(crate) fn root(generation: u32) -> Self {
        Self { generation, attributes: Attributes::DIRECTORY, ..Default::default() }
    }

    pub(crate) fn is_root(&self) -> bool {
        !self.sclust.valid() && self.attributes.contains(Attributes::DIRECTORY)
    }

    pub(crate) fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    /// Key of the entry in the open object lock table
    pub(crate) fn lock_key(&self) -> (ClusterID, u32) {
        (self.container.sclust, self.container.offset)
    }

    /// Where this object's own entries are, as seen by its children
    pub(crate) fn as_container(&self, offset: u32) -> Container {
        Container { sclust: self.sclust, size: self.size, status: self.status, offset }
    }
}
