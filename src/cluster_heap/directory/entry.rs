use alloc::string::String;
use core::fmt::Debug;

use super::cursor::Cursor;
use crate::cluster_heap::object::{Container, Object};
use crate::codec::lfn::{self, LongNameAssembler};
use crate::codec::{self, NameStatus, ParsedName, sfn};
use crate::error::{AllocationError, DataError, Error, OperationError};
use crate::file::{Attributes, ChainStatus, FileInfo, Name};
use crate::fs::FsType;
use crate::io;
use crate::region::data::entry_type::{EntryType, RawEntryType};
use crate::region::data::entryset::primary::{FileDirectory, name_hash};
use crate::region::data::entryset::secondary::{Secondary, StreamExtension};
use crate::region::data::entryset::{EntrySet, Malformed};
use crate::region::data::lfn::LfnEntry;
use crate::region::data::short::{CaseFlags, DELETED, ShortEntry};
use crate::region::data::{ENTRY_SIZE, RawEntry};
use crate::region::{load, store};
use crate::types::SectorID;
use crate::volume::Volume;

/// The entry that carries an object's metadata
#[derive(Clone, Debug)]
pub(crate) enum Body {
    Short(ShortEntry),
    Set(EntrySet),
}

/// Metadata a new entry is created from, the name is filled in by `register`
#[derive(Copy, Clone, Debug)]
pub(crate) enum Template {
    Short(ShortEntry),
    Set(FileDirectory, Secondary<StreamExtension>),
}

impl Body {
    pub(crate) fn template(&self) -> Template {
        match self {
            Self::Short(entry) => Template::Short(*entry),
            Self::Set(set) => Template::Set(set.file_directory(), set.stream()),
        }
    }

    pub(crate) fn attributes(&self) -> Attributes {
        match self {
            Self::Short(entry) => entry.attributes(),
            Self::Set(set) => set.file_directory().file_attributes(),
        }
    }
}

/// One directory record as found on disk
#[derive(Clone, Debug)]
pub(crate) struct Record {
    pub body: Body,
    /// Long name, empty for a legacy entry without one
    pub long_name: Name,
    /// Offset of the first entry of the record
    pub block: u32,
    /// Offset of the last entry, the short entry on legacy volumes
    pub last: u32,
}

impl Record {
    /// Offset identifying the object inside its directory
    pub(crate) fn position(&self) -> u32 {
        match self.body {
            Body::Short(_) => self.last,
            Body::Set(_) => self.block,
        }
    }
}

/// What a directory scan stops at
#[derive(Copy, Clone, Debug)]
pub(crate) enum Scan<'a> {
    Any,
    Name(&'a ParsedName),
    Short(&'a [u8; 11]),
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    pub(crate) fn fold(&self, unit: u16) -> u16 {
        match self.layout.is_exfat() {
            true => self.upcase.to_upper(unit),
            false => self.options.codepage.to_upper(unit),
        }
    }

    pub(crate) fn names_equal(&self, left: &[u16], right: &[u16]) -> bool {
        if self.layout.is_exfat() {
            return self.upcase.equals(left, right);
        }
        let codepage = self.options.codepage;
        left.len() == right.len()
            && left.iter().zip(right).all(|(&l, &r)| codepage.to_upper(l) == codepage.to_upper(r))
    }

    /// Read records from the cursor on until one satisfies `scan`. The cursor is
    /// left on the last entry of the record returned.
    pub(crate) fn scan(&mut self, cursor: &mut Cursor, scan: Scan) -> Result<Option<Record>, Error<E>> {
        match self.layout.is_exfat() {
            true => self.scan_sets(cursor, scan),
            false => self.scan_entries(cursor, scan),
        }
    }

    fn scan_entries(&mut self, cursor: &mut Cursor, scan: Scan) -> Result<Option<Record>, Error<E>> {
        let mut assembler = LongNameAssembler::default();
        let mut block = cursor.offset;
        loop {
            if cursor.sector.is_none() {
                return Ok(None);
            }
            let raw = self.entry(cursor)?;
            if raw[0] == 0 {
                return Ok(None);
            }
            let attributes = raw[11] & 0x3F;
            let long_name = attributes == Attributes::LONG_NAME.bits();
            if raw[0] == DELETED || raw[0] == b'.' || (attributes & Attributes::VOLUME.bits() != 0 && !long_name) {
                assembler.reset();
            } else if long_name {
                let entry: LfnEntry = load(&raw);
                if entry.is_last() {
                    block = cursor.offset;
                }
                assembler.feed(&entry);
            } else {
                let entry: ShortEntry = load(&raw);
                let name = assembler.finish(entry.checksum());
                let matched = match scan {
                    Scan::Any => true,
                    Scan::Name(parsed) => {
                        name.is_some_and(|units| self.names_equal(units, &parsed.units))
                            || (!parsed.status.contains(NameStatus::LOSS) && entry.name == parsed.short)
                    }
                    Scan::Short(short) => entry.name == *short,
                };
                if matched {
                    let long_name = match name {
                        Some(units) => Name::from_slice(units).map_err(|_| AllocationError::NotEnoughCore)?,
                        None => Name::new(),
                    };
                    let block = if name.is_some() { block } else { cursor.offset };
                    let body = Body::Short(entry);
                    return Ok(Some(Record { body, long_name, block, last: cursor.offset }));
                }
                assembler.reset();
            }
            if !self.advance(cursor, false)? {
                return Ok(None);
            }
        }
    }

    fn scan_sets(&mut self, cursor: &mut Cursor, scan: Scan) -> Result<Option<Record>, Error<E>> {
        let hash = match scan {
            Scan::Name(parsed) => name_hash(&parsed.units, &self.upcase),
            _ => 0,
        };
        loop {
            if cursor.sector.is_none() {
                return Ok(None);
            }
            let raw = self.entry(cursor)?;
            let entry_type = RawEntryType::from(raw[0]);
            if entry_type.is_end_of_directory() {
                return Ok(None);
            }
            if entry_type == RawEntryType::new(EntryType::FileDirectory, true) {
                let block = cursor.offset;
                let set = self.read_set(cursor)?;
                let matched = match scan {
                    Scan::Name(parsed) => {
                        let stream = set.stream();
                        // A name too long for the buffer cannot be the one looked for
                        stream.custom_defined.name_hash.to_ne() == hash
                            && match set.name() {
                                Ok(name) => self.names_equal(&name, &parsed.units),
                                Err(Malformed::NameTooLong) => false,
                                Err(malformed) => return Err(Self::malformed(malformed)),
                            }
                    }
                    _ => true,
                };
                if matched {
                    let long_name = Self::set_name(&set)?;
                    let record = Record { body: Body::Set(set), long_name, block, last: cursor.offset };
                    return Ok(Some(record));
                }
            }
            if !self.advance(cursor, false)? {
                return Ok(None);
            }
        }
    }

    fn set_name(set: &EntrySet) -> Result<Name, Error<E>> {
        set.name().map_err(Self::malformed)
    }

    fn malformed(malformed: Malformed) -> Error<E> {
        match malformed {
            Malformed::Structure => DataError::Metadata.into(),
            Malformed::Checksum => DataError::EntrySetChecksum.into(),
            Malformed::NameTooLong => AllocationError::NotEnoughCore.into(),
        }
    }

    /// Load the entry set whose file entry is under the cursor, leaving the
    /// cursor on its last entry
    pub(crate) fn read_set(&mut self, cursor: &mut Cursor) -> Result<EntrySet, Error<E>> {
        let first = self.entry(cursor)?;
        if first[0] != u8::from(RawEntryType::new(EntryType::FileDirectory, true)) {
            return Err(DataError::Metadata.into());
        }
        let expected = EntrySet::expected_len(&first);
        if expected < 3 {
            return Err(DataError::Metadata.into());
        }
        let mut set = EntrySet::default();
        set.push(&first);
        for _ in 1..expected {
            if !self.advance(cursor, false)? {
                return Err(DataError::Metadata.into());
            }
            set.push(&self.entry(cursor)?);
        }
        set.verify().map_err(Self::malformed)?;
        Ok(set)
    }

    /// Write a set back from the cursor of its file entry on
    pub(crate) fn store_set(&mut self, cursor: &mut Cursor, set: &EntrySet) -> Result<(), Error<E>> {
        for (i, entry) in set.entries().iter().enumerate() {
            if i > 0 && !self.advance(cursor, false)? {
                return Err(DataError::Metadata.into());
            }
            self.put_entry(cursor, entry)?;
        }
        Ok(())
    }

    /// Fresh metadata stamped with the clock
    pub(crate) fn template(&self, attributes: Attributes) -> Template {
        let now = (self.options.clock)();
        match self.layout.is_exfat() {
            true => {
                let file_directory = FileDirectory::new(0, attributes, now);
                let stream = Secondary::new(EntryType::StreamExtension, StreamExtension::new(0, 0));
                Template::Set(file_directory, stream)
            }
            false => Template::Short(ShortEntry::new([b' '; 11], CaseFlags::empty(), attributes, now.timestamp)),
        }
    }

    /// Allocate entries for `name` in `directory` and write the record.
    /// `directory` follows the chain and size changes of a stretch.
    pub(crate) fn register(
        &mut self,
        directory: &mut Object,
        name: &ParsedName,
        template: Template,
    ) -> Result<Record, Error<E>> {
        match template {
            Template::Short(entry) => self.register_short(directory, name, entry),
            Template::Set(file_directory, stream) => self.register_set(directory, name, file_directory, stream),
        }
    }

    fn register_short(
        &mut self,
        directory: &mut Object,
        name: &ParsedName,
        mut entry: ShortEntry,
    ) -> Result<Record, Error<E>> {
        let mut short = name.short;
        if name.status.contains(NameStatus::LOSS) {
            let mut sequence = 1;
            loop {
                if sequence == 100 {
                    return Err(OperationError::Denied.into());
                }
                short = sfn::numbered(&name.short, &name.units, sequence);
                let mut cursor = self.cursor(directory)?;
                if self.scan(&mut cursor, Scan::Short(&short))?.is_none() {
                    break;
                }
                sequence += 1;
            }
            trace!("Numbered short name {:?}", core::str::from_utf8(&short).unwrap_or("?"));
        }
        let lfn = name.status.contains(NameStatus::LFN);
        let long_entries = if lfn { lfn::entries_for(&name.units) } else { 0 };
        let mut cursor = self.alloc_entries(directory, long_entries + 1)?;
        let block = cursor.offset;
        let checksum = crate::region::data::short::checksum(&short);
        for sequence in (1..=long_entries).rev() {
            let mut raw: RawEntry = [0; ENTRY_SIZE];
            store(&mut raw, &lfn::encode(&name.units, sequence as u8, checksum));
            self.put_entry(&cursor, &raw)?;
            if !self.advance(&mut cursor, false)? {
                return Err(DataError::Metadata.into());
            }
        }
        entry.name = short;
        entry.case = (name.status & (NameStatus::BODY | NameStatus::EXT)).bits();
        let mut raw: RawEntry = [0; ENTRY_SIZE];
        store(&mut raw, &entry);
        self.put_entry(&cursor, &raw)?;
        let long_name = if lfn { name.units.clone() } else { Name::new() };
        *directory = cursor.object;
        Ok(Record { body: Body::Short(entry), long_name, block, last: cursor.offset })
    }

    fn register_set(
        &mut self,
        directory: &mut Object,
        name: &ParsedName,
        file_directory: FileDirectory,
        mut stream: Secondary<StreamExtension>,
    ) -> Result<Record, Error<E>> {
        stream.custom_defined.name_length = name.units.len() as u8;
        stream.custom_defined.name_hash = name_hash(&name.units, &self.upcase).into();
        let set = EntrySet::new(file_directory, stream, &name.units);
        let mut cursor = self.alloc_entries(directory, set.len())?;
        let block = cursor.offset;
        if cursor.object.stretched && cursor.object.sclust.valid() {
            cursor.object.stretched = false;
            self.update_directory_size(&cursor.object)?;
            cursor = self.rewind_to(&cursor.object, block)?;
        }
        self.store_set(&mut cursor, &set)?;
        *directory = cursor.object;
        Ok(Record { body: Body::Set(set), long_name: name.units.clone(), block, last: cursor.offset })
    }

    /// Record the grown size of a directory in its own entry set
    fn update_directory_size(&mut self, directory: &Object) -> Result<(), Error<E>> {
        let (mut cursor, mut set) = self.load_object_set(directory)?;
        let mut stream = set.stream();
        let contiguous = directory.status == ChainStatus::Contiguous;
        stream.set_allocation(directory.sclust, directory.size, contiguous);
        set.set_stream(&stream);
        set.update_checksum();
        self.store_set(&mut cursor, &set)?;
        for frame in self.cwd.iter_mut() {
            if frame.object.sclust == directory.sclust {
                frame.object.size = directory.size;
                frame.object.status = directory.status;
            }
        }
        debug!("Directory {} grew to {} bytes", directory.sclust, directory.size);
        Ok(())
    }

    /// Mark every entry of a record as deleted
    pub(crate) fn remove_record(&mut self, directory: &Object, record: &Record) -> Result<(), Error<E>> {
        let mut cursor = self.rewind_to(directory, record.block)?;
        let exfat = self.layout.is_exfat();
        loop {
            let mut raw = self.entry(&cursor)?;
            raw[0] = match exfat {
                true => RawEntryType::from(raw[0]).deleted().into(),
                false => DELETED,
            };
            self.put_entry(&cursor, &raw)?;
            if cursor.offset >= record.last {
                return Ok(());
            }
            if !self.advance(&mut cursor, false)? {
                return Err(DataError::Metadata.into());
            }
        }
    }

    /// Write the metadata of a record back in place
    pub(crate) fn rewrite(&mut self, directory: &Object, record: &mut Record) -> Result<(), Error<E>> {
        match &mut record.body {
            Body::Short(entry) => {
                let cursor = self.rewind_to(directory, record.last)?;
                let mut raw: RawEntry = [0; ENTRY_SIZE];
                store(&mut raw, entry);
                self.put_entry(&cursor, &raw)
            }
            Body::Set(set) => {
                set.update_checksum();
                let mut cursor = self.rewind_to(directory, record.block)?;
                self.store_set(&mut cursor, set)
            }
        }
    }

    /// The object a record describes, bound to the current mount
    pub(crate) fn object_of(&self, record: &Record, directory: &Object) -> Object {
        let container = directory.as_container(record.position());
        match &record.body {
            Body::Short(entry) => Object {
                generation: self.generation,
                attributes: entry.attributes() & Attributes::MASK,
                sclust: entry.cluster(self.layout.fs_type == FsType::FAT32),
                size: entry.file_size() as u64,
                container,
                ..Default::default()
            },
            Body::Set(set) => {
                let stream = set.stream();
                let status = match stream.general_secondary_flags().no_fat_chain() {
                    true => ChainStatus::Contiguous,
                    false => ChainStatus::NotContiguous,
                };
                Object {
                    generation: self.generation,
                    attributes: set.file_directory().file_attributes() & Attributes::MASK,
                    status,
                    sclust: stream.first_cluster(),
                    size: stream.data_length(),
                    container,
                    ..Default::default()
                }
            }
        }
    }

    pub(crate) fn file_info(&self, record: &Record) -> FileInfo {
        let codepage = self.options.codepage;
        match &record.body {
            Body::Short(entry) => {
                let has_long_name = !record.long_name.is_empty();
                let mut name = match has_long_name {
                    true => codec::to_string(&record.long_name),
                    false => sfn::display(&entry.name, entry.case(), codepage),
                };
                if name.is_empty() {
                    name.push('?');
                }
                let short_name = match has_long_name || !entry.case().is_empty() {
                    true => sfn::display(&entry.name, CaseFlags::empty(), codepage),
                    false => String::new(),
                };
                FileInfo {
                    size: entry.file_size() as u64,
                    modified: entry.modified(),
                    attributes: entry.attributes() & Attributes::MASK,
                    name,
                    short_name,
                }
            }
            Body::Set(set) => {
                let file_directory = set.file_directory();
                let attributes = file_directory.file_attributes() & Attributes::MASK;
                let size = match attributes.contains(Attributes::DIRECTORY) {
                    true => 0,
                    false => set.stream().data_length(),
                };
                FileInfo {
                    size,
                    modified: file_directory.last_modified_timestamp().timestamp,
                    attributes,
                    name: codec::to_string(&record.long_name),
                    short_name: String::new(),
                }
            }
        }
    }

    /// The directory an object's entry lives in
    pub(crate) fn container_of(&self, object: &Object) -> Object {
        let Container { sclust, size, status, .. } = object.container;
        Object {
            generation: object.generation,
            attributes: Attributes::DIRECTORY,
            status,
            sclust,
            size,
            ..Default::default()
        }
    }

    /// Cursor and entry set of an exFAT object
    pub(crate) fn load_object_set(&mut self, object: &Object) -> Result<(Cursor, EntrySet), Error<E>> {
        let container = self.container_of(object);
        let mut cursor = self.rewind_to(&container, object.container.offset)?;
        let start = cursor;
        let set = self.read_set(&mut cursor)?;
        Ok((start, set))
    }

    /// Sector and byte offset of the short entry of a legacy object
    pub(crate) fn entry_location(&mut self, object: &Object) -> Result<Option<(SectorID, usize)>, Error<E>> {
        let container = self.container_of(object);
        let cursor = self.rewind_to(&container, object.container.offset)?;
        let sector_size = self.layout.sector_size;
        Ok(cursor.sector.map(|sector| (sector, (cursor.offset % sector_size) as usize)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codepage::ASCII;
    use crate::testing;

    fn parse(name: &str) -> ParsedName {
        codec::parse(name, &ASCII).unwrap()
    }

    fn create(volume: &mut Volume<crate::io::memory::MemoryIO>, name: &str) -> Record {
        let mut root = Object::root(volume.generation);
        let template = volume.template(Attributes::ARCHIVE);
        volume.register(&mut root, &parse(name), template).unwrap()
    }

    fn find(volume: &mut Volume<crate::io::memory::MemoryIO>, name: &str) -> Option<Record> {
        let root = Object::root(volume.generation);
        let mut cursor = volume.cursor(&root).unwrap();
        volume.scan(&mut cursor, Scan::Name(&parse(name))).unwrap()
    }

    #[test]
    fn test_register_and_find() {
        for io in [testing::fat12(), testing::fat32(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let created = create(&mut volume, "A.TXT");
            let found = find(&mut volume, "a.txt").unwrap();
            assert_eq!(found.position(), created.position());
            let info = volume.file_info(&found);
            assert_eq!(info.name, "A.TXT");
            assert_eq!(info.size, 0);
            let object = volume.object_of(&found, &Object::root(volume.generation));
            assert!(!object.sclust.valid());
            assert!(find(&mut volume, "B.TXT").is_none());
        }
    }

    #[test]
    fn test_numbered_short_names() {
        let mut volume = testing::volume(testing::fat16());
        let first = create(&mut volume, "long file name.txt");
        let second = create(&mut volume, "long file name 2.txt");
        let first_info = volume.file_info(&first);
        let second_info = volume.file_info(&second);
        assert_eq!(first_info.short_name, "LONGFI~1.TXT");
        assert_eq!(second_info.short_name, "LONGFI~2.TXT");
        assert_eq!(first_info.name, "long file name.txt");
        // Both names lead to the same record
        let by_long = find(&mut volume, "LONG FILE NAME.TXT").unwrap();
        let by_short = find(&mut volume, "LONGFI~1.TXT").unwrap();
        assert_eq!(by_long.position(), first.position());
        assert_eq!(by_short.position(), first.position());
        assert_eq!(first.last - first.block, 2 * ENTRY_SIZE as u32);
    }

    #[test]
    fn test_lower_case_short_name() {
        let mut volume = testing::volume(testing::fat12());
        let record = create(&mut volume, "readme.md");
        assert_eq!(record.block, record.last);
        let found = find(&mut volume, "README.MD").unwrap();
        let info = volume.file_info(&found);
        assert_eq!(info.name, "readme.md");
        assert_eq!(info.short_name, "README.MD");
    }

    #[test]
    fn test_remove_record() {
        for io in [testing::fat16(), testing::exfat()] {
            let mut volume = testing::volume(io);
            let record = create(&mut volume, "Some Document.txt");
            create(&mut volume, "other.txt");
            let root = Object::root(volume.generation);
            volume.remove_record(&root, &record).unwrap();
            assert!(find(&mut volume, "Some Document.txt").is_none());
            assert!(find(&mut volume, "other.txt").is_some());
            // The freed slots are reused
            let again = create(&mut volume, "Some Document.txt");
            assert_eq!(again.block, record.block);
        }
    }

    #[test]
    fn test_exfat_name_round_trip() {
        let mut volume = testing::volume(testing::exfat());
        let name = "Ünïcode name that spans several name entries.bin";
        create(&mut volume, name);
        let root = Object::root(volume.generation);
        let mut cursor = volume.cursor(&root).unwrap();
        let record = volume.scan(&mut cursor, Scan::Any).unwrap().unwrap();
        assert_eq!(volume.file_info(&record).name, name);
        assert!(find(&mut volume, "ünïcode NAME that spans several name entries.BIN").is_some());
        assert!(find(&mut volume, "ÜNÏCODE NAME THAT SPANS SEVERAL NAME ENTRIES.BIN").is_some());
        assert!(find(&mut volume, "Ünïcode name that spans several name entries").is_none());
    }

    #[test]
    fn test_exfat_non_ascii_folding() {
        let mut volume = testing::volume(testing::exfat());
        let created = create(&mut volume, "ÉTAT.TXT");
        let found = find(&mut volume, "état.txt").unwrap();
        assert_eq!(found.position(), created.position());
        let set = match &found.body {
            Body::Set(set) => set,
            Body::Short(_) => panic!("legacy entry on exFAT"),
        };
        let hash = set.stream().custom_defined.name_hash.to_ne();
        assert_eq!(hash, name_hash(&parse("état.txt").units, &volume.upcase));
        assert_eq!(hash, name_hash(&parse("ÉTAT.TXT").units, &volume.upcase));
        // Characters outside the table keep their case
        create(&mut volume, "ĳ.txt");
        assert!(find(&mut volume, "Ĳ.TXT").is_none());
    }

    #[test]
    fn test_exfat_vendor_secondary_skipped() {
        let mut volume = testing::volume(testing::exfat());
        let record = create(&mut volume, "a.bin");
        let mut set = match record.body {
            Body::Set(set) => set,
            Body::Short(_) => panic!("legacy entry on exFAT"),
        };
        let mut vendor: RawEntry = [0; ENTRY_SIZE];
        vendor[0] = RawEntryType::new(EntryType::VendorExtension, true).into();
        set.push(&vendor);
        let mut file_directory = set.file_directory();
        file_directory.secondary_count += 1;
        set.set_file_directory(&file_directory);
        set.update_checksum();
        let root = Object::root(volume.generation);
        let mut cursor = volume.rewind_to(&root, record.block).unwrap();
        volume.store_set(&mut cursor, &set).unwrap();

        create(&mut volume, "b.bin");
        let found = find(&mut volume, "A.BIN").unwrap();
        assert_eq!(found.last, record.last + ENTRY_SIZE as u32);
        assert!(find(&mut volume, "b.bin").is_some());
    }

    #[test]
    fn test_corrupted_set_checksum() {
        let mut volume = testing::volume(testing::exfat());
        let record = create(&mut volume, "data.bin");
        let root = Object::root(volume.generation);
        let cursor = volume.rewind_to(&root, record.last).unwrap();
        let mut raw = volume.entry(&cursor).unwrap();
        raw[2] ^= 0xFF;
        volume.put_entry(&cursor, &raw).unwrap();
        let mut cursor = volume.cursor(&root).unwrap();
        let result = volume.scan(&mut cursor, Scan::Any);
        assert!(matches!(result, Err(Error::Data(DataError::EntrySetChecksum))));
    }

    #[test]
    fn test_search_crosses_full_cluster() {
        let mut volume = testing::volume(testing::fat32());
        let per_cluster = (volume.layout.cluster_size() / ENTRY_SIZE as u32) as usize;
        for i in 0..per_cluster {
            create(&mut volume, &alloc::format!("F{}.BIN", i));
        }
        let last = create(&mut volume, "LAST.BIN");
        assert!(last.block as usize >= per_cluster * ENTRY_SIZE);
        assert_eq!(find(&mut volume, "LAST.BIN").unwrap().position(), last.position());
        // The root chain got a second cluster
        let root = volume.layout.root_cluster();
        let second = match volume.read_link(root).unwrap() {
            crate::region::fat::Link::Next(next) => next,
            link => panic!("root chain ends with {:?}", link),
        };
        assert_eq!(volume.read_link(second).unwrap(), crate::region::fat::Link::End);
    }
}
