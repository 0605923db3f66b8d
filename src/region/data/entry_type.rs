/// exFAT directory entry types
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EntryType {
    AllocationBitmap = 0x1,
    UpcaseTable = 0x2,
    VolumeLabel = 0x3,
    FileDirectory = 0x5,
    VolumeGUID = 0x20,
    TexFATPadding = 0x21,
    StreamExtension = 0x40,
    Filename = 0x41,
    VendorExtension = 0x60,
    VendorAllocation = 0x61,
}

impl TryFrom<u8> for EntryType {
    type Error = u8;
    fn try_from(byte: u8) -> Result<Self, u8> {
        let value = match byte {
            // critical primary
            0x1 => Self::AllocationBitmap,
            0x2 => Self::UpcaseTable,
            0x3 => Self::VolumeLabel,
            0x5 => Self::FileDirectory,
            // benign primary
            0x20 => Self::VolumeGUID,
            0x21 => Self::TexFATPadding,
            // critical secondary
            0x40 => Self::StreamExtension,
            0x41 => Self::Filename,
            // benign secondary
            0x60 => Self::VendorExtension,
            0x61 => Self::VendorAllocation,
            _ => return Err(byte),
        };
        Ok(value)
    }
}

#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub(crate) struct RawEntryType(u8);

impl RawEntryType {
    pub(crate) const END_OF_DIRECTORY: Self = Self(0);

    pub(crate) fn new(entry_type: EntryType, in_use: bool) -> Self {
        Self(entry_type as u8 | if in_use { 0x80 } else { 0 })
    }

    pub(crate) fn in_use(&self) -> bool {
        self.0 & 0x80 > 0
    }

    pub(crate) fn entry_type(&self) -> Result<EntryType, u8> {
        EntryType::try_from(self.0 & 0x7F)
    }

    pub(crate) fn is_end_of_directory(&self) -> bool {
        *self == Self::END_OF_DIRECTORY
    }

    /// Secondary entry that may be skipped when not understood
    pub(crate) fn is_benign_secondary(&self) -> bool {
        self.0 & 0x60 == 0x60
    }

    pub(crate) fn deleted(self) -> Self {
        Self(self.0 & 0x7F)
    }
}

impl From<u8> for RawEntryType {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl From<RawEntryType> for u8 {
    fn from(entry_type: RawEntryType) -> u8 {
        entry_type.0
    }
}
