pub(crate) mod primary;
pub(crate) mod secondary;

use alloc::vec::Vec;

use super::entry_type::{EntryType, RawEntryType};
use super::{ENTRY_SIZE, RawEntry};
use crate::file::{MAX_FILENAME_SIZE, Name};
use crate::region::{load, store};
use primary::{Checksum, FileDirectory};
use secondary::{Filename, NAME_UNITS_PER_ENTRY, Secondary, StreamExtension};

/// Reasons an entry set is refused
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Malformed {
    /// Secondary count, entry types or name length disagree, or a secondary
    /// entry past the name is not benign
    Structure,
    Checksum,
    /// Name longer than the name buffer
    NameTooLong,
}

/// A complete exFAT directory entry set, kept as raw entries.
///
/// Benign secondaries following the name entries are carried along untouched.
#[derive(Clone, Debug, Default)]
pub(crate) struct EntrySet {
    entries: Vec<RawEntry>,
}

impl EntrySet {
    pub(crate) fn new(
        mut file_directory: FileDirectory,
        stream: Secondary<StreamExtension>,
        name: &[u16],
    ) -> Self {
        let mut set = Self::default();
        let num_names = name.len().div_ceil(NAME_UNITS_PER_ENTRY);
        file_directory.secondary_count = (1 + num_names) as u8;
        let mut raw: RawEntry = [0; ENTRY_SIZE];
        store(&mut raw, &file_directory);
        set.entries.push(raw);
        store(&mut raw, &stream);
        set.entries.push(raw);
        for chunk in name.chunks(NAME_UNITS_PER_ENTRY) {
            store(&mut raw, &Filename::new(chunk));
            set.entries.push(raw);
        }
        set.update_checksum();
        set
    }

    /// Number of entries the set occupies given its primary entry
    pub(crate) fn expected_len(file_directory: &RawEntry) -> usize {
        file_directory[1] as usize + 1
    }

    /// Append one raw entry while assembling a set
    pub(crate) fn push(&mut self, entry: &RawEntry) {
        self.entries.push(*entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    pub(crate) fn file_directory(&self) -> FileDirectory {
        load(&self.entries[0])
    }

    pub(crate) fn set_file_directory(&mut self, file_directory: &FileDirectory) {
        store(&mut self.entries[0], file_directory)
    }

    pub(crate) fn stream(&self) -> Secondary<StreamExtension> {
        load(&self.entries[1])
    }

    pub(crate) fn set_stream(&mut self, stream: &Secondary<StreamExtension>) {
        store(&mut self.entries[1], stream)
    }

    /// Checksum over every byte of the set except the checksum field
    pub(crate) fn checksum(&self) -> u16 {
        let mut checksum = Checksum::new();
        for (index, entry) in self.entries.iter().enumerate() {
            for (i, &byte) in entry.iter().enumerate() {
                if index == 0 && (i == 2 || i == 3) {
                    continue;
                }
                checksum.write(byte);
            }
        }
        checksum.sum()
    }

    pub(crate) fn update_checksum(&mut self) {
        let sum = self.checksum();
        self.entries[0][2..4].copy_from_slice(&sum.to_le_bytes());
    }

    /// Validate structure and checksum of a freshly read set
    pub(crate) fn verify(&self) -> Result<(), Malformed> {
        if self.entries.len() < 3 || self.entries.len() != Self::expected_len(&self.entries[0]) {
            return Err(Malformed::Structure);
        }
        let stream = self.stream();
        if stream.entry_type.entry_type() != Ok(EntryType::StreamExtension) {
            return Err(Malformed::Structure);
        }
        let name_length = stream.custom_defined.name_length as usize;
        let num_names = name_length.div_ceil(NAME_UNITS_PER_ENTRY);
        if name_length == 0 || self.entries.len() < 2 + num_names {
            return Err(Malformed::Structure);
        }
        for entry in &self.entries[2..2 + num_names] {
            if entry[0] & 0x7F != EntryType::Filename as u8 {
                return Err(Malformed::Structure);
            }
        }
        if !self.entries[2 + num_names..].iter().all(|entry| RawEntryType::from(entry[0]).is_benign_secondary()) {
            return Err(Malformed::Structure);
        }
        let stored = u16::from_le_bytes([self.entries[0][2], self.entries[0][3]]);
        if stored != self.checksum() {
            return Err(Malformed::Checksum);
        }
        Ok(())
    }

    pub(crate) fn name_length(&self) -> usize {
        self.stream().custom_defined.name_length as usize
    }

    /// Concatenated name units, fails when the name buffer is too small
    pub(crate) fn name(&self) -> Result<Name, Malformed> {
        let length = self.name_length();
        if length > MAX_FILENAME_SIZE {
            return Err(Malformed::NameTooLong);
        }
        let mut name = Name::new();
        for entry in self.entries.iter().skip(2) {
            let filename: Filename = load(entry);
            let units = filename.filename;
            for unit in units.iter() {
                if name.len() == length {
                    return Ok(name);
                }
                name.push(unit.to_ne()).map_err(|_| Malformed::NameTooLong)?;
            }
        }
        match name.len() == length {
            true => Ok(name),
            false => Err(Malformed::Structure),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datetime::DateTime;
    use crate::file::Attributes;
    use crate::upcase_table::UpcaseTable;

    fn units(name: &str) -> Name {
        name.encode_utf16().collect()
    }

    fn build(name: &str) -> EntrySet {
        let name = units(name);
        let hash = primary::name_hash(&name, &UpcaseTable::default());
        let stream = StreamExtension::new(name.len() as u8, hash);
        let stream = Secondary::new(EntryType::StreamExtension, stream);
        let file_directory = FileDirectory::new(0, Attributes::ARCHIVE, DateTime::FIXED);
        EntrySet::new(file_directory, stream, &name)
    }

    #[test]
    fn test_name_round_trip() {
        let set = build("A rather long exFAT file name.txt");
        assert_eq!(set.len(), 2 + 3);
        assert_eq!(set.file_directory().secondary_count, 4);
        assert_eq!(set.verify(), Ok(()));
        assert_eq!(set.name().unwrap(), units("A rather long exFAT file name.txt"));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut set = build("notes.md");
        let mut raw = set.entries()[2];
        raw[2] ^= 0x20;
        let mut broken = EntrySet::default();
        broken.push(&set.entries()[0]);
        broken.push(&set.entries()[1]);
        broken.push(&raw);
        assert_eq!(broken.verify(), Err(Malformed::Checksum));
        set.update_checksum();
        assert_eq!(set.verify(), Ok(()));
    }

    #[test]
    fn test_vendor_secondaries() {
        let set = build("vendor.dat");
        let mut extended = EntrySet::default();
        for entry in set.entries() {
            extended.push(entry);
        }
        let mut vendor: RawEntry = [0; ENTRY_SIZE];
        vendor[0] = RawEntryType::new(EntryType::VendorExtension, true).into();
        extended.push(&vendor);
        extended.entries[0][1] += 1;
        extended.update_checksum();
        assert_eq!(extended.verify(), Ok(()));
        assert_eq!(extended.name().unwrap(), units("vendor.dat"));
        // A critical secondary past the name is not understood
        extended.entries[3][0] = RawEntryType::new(EntryType::StreamExtension, true).into();
        extended.update_checksum();
        assert_eq!(extended.verify(), Err(Malformed::Structure));
    }

    #[test]
    fn test_missing_name_entries() {
        let set = build("twenty characters!!!");
        let mut truncated = EntrySet::default();
        truncated.push(&set.entries()[0]);
        truncated.push(&set.entries()[1]);
        truncated.push(&set.entries()[2]);
        assert_eq!(truncated.verify(), Err(Malformed::Structure));
    }
}
