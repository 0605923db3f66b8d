use core::fmt::Debug;

use super::context::Access;
use super::directory::entry::{Body, Record, Scan, Template};
use super::object::Object;
use crate::codec::ParsedName;
use crate::datetime::DateTime;
use crate::error::{Error, InputError, OperationError};
use crate::file::{Attributes, FileInfo};
use crate::fs::FsType;
use crate::io;
use crate::path::{Frame, Resolution, Target};
use crate::region::data::short::ShortEntry;
use crate::region::data::{ENTRY_SIZE, RawEntry};
use crate::region::store;
use crate::types::ClusterID;
use crate::volume::Volume;

const DOT: [u8; 11] = *b".          ";
const DOT_DOT: [u8; 11] = *b"..         ";

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    /// The existing record a path names, with the directory holding it
    fn existing(&mut self, path: &str) -> Result<(Resolution, Record), Error<E>> {
        let mut resolution = self.resolve(path)?;
        match core::mem::replace(&mut resolution.target, Target::Missing) {
            Target::Found(record) => Ok((resolution, record)),
            Target::Missing => Err(OperationError::NotFound.into()),
            Target::Origin => Err(InputError::InvalidName.into()),
        }
    }

    pub(crate) fn stat(&mut self, path: &str) -> Result<FileInfo, Error<E>> {
        let (_, record) = self.existing(path)?;
        Ok(self.file_info(&record))
    }

    pub(crate) fn mkdir(&mut self, path: &str) -> Result<(), Error<E>> {
        let resolution = self.resolve(path)?;
        let mut directory = resolution.directory(self.generation);
        let name = match (resolution.target, resolution.name) {
            (Target::Missing, Some(name)) => name,
            (Target::Missing, None) => return Err(InputError::InvalidName.into()),
            _ => return Err(OperationError::AlreadyExists.into()),
        };
        let mut object = Object { generation: self.generation, attributes: Attributes::DIRECTORY, ..Default::default() };
        let cluster = self.extend(&mut object, ClusterID::NONE)?;
        object.sclust = cluster;
        object.size = self.layout.cluster_size() as u64;
        if let Err(error) = self.populate(&mut directory, &name, &object) {
            if let Err(cleanup) = self.remove_chain(&mut object, cluster, ClusterID::NONE) {
                warn!("Cluster {} leaked: {}", cluster, cleanup);
            }
            return Err(error);
        }
        debug!("Directory {} created at cluster {}", path, cluster);
        Ok(())
    }

    /// Clear the first cluster of a new directory and register it in its parent
    fn populate(&mut self, parent: &mut Object, name: &ParsedName, object: &Object) -> Result<(), Error<E>> {
        self.clear_cluster(object.sclust)?;
        let mut template = self.template(Attributes::DIRECTORY);
        match &mut template {
            Template::Short(entry) => {
                let fat32 = self.layout.fs_type == FsType::FAT32;
                entry.set_cluster(object.sclust, fat32);
                let mut dot = *entry;
                dot.name = DOT;
                let mut dot_dot = *entry;
                dot_dot.name = DOT_DOT;
                // The root is cluster 0 in a dot dot entry, FAT32 included
                dot_dot.set_cluster(parent.sclust, fat32);
                for (i, entry) in [dot, dot_dot].iter().enumerate() {
                    let cursor = self.rewind_to(object, (i * ENTRY_SIZE) as u32)?;
                    let mut raw: RawEntry = [0; ENTRY_SIZE];
                    store(&mut raw, entry);
                    self.put_entry(&cursor, &raw)?;
                }
            }
            Template::Set(_, stream) => stream.set_allocation(object.sclust, object.size, true),
        }
        self.register(parent, name, template)?;
        Ok(())
    }

    pub(crate) fn remove(&mut self, path: &str) -> Result<(), Error<E>> {
        let (resolution, record) = self.existing(path)?;
        let directory = resolution.directory(self.generation);
        let mut object = self.object_of(&record, &directory);
        self.locks.check(object.lock_key(), Access::Remove)?;
        if object.attributes.contains(Attributes::READ_ONLY) {
            return Err(OperationError::Denied.into());
        }
        if object.is_directory() {
            if self.cwd.last().is_some_and(|frame| frame.object.sclust == object.sclust) {
                return Err(OperationError::Denied.into());
            }
            let mut cursor = self.cursor(&object)?;
            if self.scan(&mut cursor, Scan::Any)?.is_some() {
                return Err(OperationError::DirectoryNotEmpty.into());
            }
        }
        self.remove_record(&directory, &record)?;
        if object.sclust.valid() {
            let sclust = object.sclust;
            self.remove_chain(&mut object, sclust, ClusterID::NONE)?;
        }
        debug!("Removed {}", path);
        Ok(())
    }

    /// Rename or move an object, keeping its chain and metadata
    pub(crate) fn rename(&mut self, from: &str, to: &str) -> Result<(), Error<E>> {
        let (old, record) = self.existing(from)?;
        let old_directory = old.directory(self.generation);
        let object = self.object_of(&record, &old_directory);
        self.locks.check(object.lock_key(), Access::Remove)?;

        let target = self.resolve(to)?;
        let mut new_directory = target.directory(self.generation);
        let name = match (&target.target, &target.name) {
            (Target::Missing, Some(name)) => name,
            (Target::Found(found), Some(name)) => {
                let same = new_directory.sclust == old_directory.sclust && found.position() == record.position();
                if !same {
                    return Err(OperationError::AlreadyExists.into());
                }
                // Only the case of the name changes
                name
            }
            _ => return Err(InputError::InvalidName.into()),
        };
        let moved_directory = object.is_directory() && object.sclust.valid();
        if moved_directory && target.frames.iter().any(|frame| frame.object.sclust == object.sclust) {
            return Err(OperationError::Denied.into());
        }

        let mut template = record.body.template();
        let archive = match object.is_directory() {
            true => Attributes::empty(),
            false => Attributes::ARCHIVE,
        };
        match &mut template {
            Template::Short(entry) => entry.attributes |= archive.bits(),
            Template::Set(file_directory, _) => {
                let attributes = file_directory.file_attributes() | archive;
                file_directory.set_file_attributes(attributes);
            }
        }
        let new_record = self.register(&mut new_directory, name, template)?;
        let new_object = self.object_of(&new_record, &new_directory);

        let parent_changed = new_directory.sclust != old_directory.sclust;
        if moved_directory && parent_changed && !self.layout.is_exfat() {
            self.fix_dot_dot(&new_object, new_directory.sclust)?;
        }
        self.remove_record(&old_directory, &record)?;

        if moved_directory {
            if let Some(index) = self.cwd.iter().position(|frame| frame.object.sclust == object.sclust) {
                let name = self.file_info(&new_record).name;
                let mut cwd = target.frames.clone();
                cwd.push(Frame { object: new_object, name });
                cwd.extend_from_slice(&self.cwd[index + 1..]);
                self.cwd = cwd;
            }
        }
        debug!("Renamed {} to {}", from, to);
        Ok(())
    }

    /// Point the dot dot entry of a moved directory at its new parent
    fn fix_dot_dot(&mut self, directory: &Object, parent: ClusterID) -> Result<(), Error<E>> {
        let cursor = self.rewind_to(directory, ENTRY_SIZE as u32)?;
        let raw = self.entry(&cursor)?;
        if raw[..2] != *b".." {
            warn!("Directory {} has no dot dot entry", directory.sclust);
            return Ok(());
        }
        let mut entry: ShortEntry = crate::region::load(&raw);
        entry.set_cluster(parent, self.layout.fs_type == FsType::FAT32);
        let mut raw: RawEntry = [0; ENTRY_SIZE];
        store(&mut raw, &entry);
        self.put_entry(&cursor, &raw)
    }

    /// Change the attribute bits selected by `mask` to those of `attributes`
    pub(crate) fn chmod(&mut self, path: &str, attributes: Attributes, mask: Attributes) -> Result<(), Error<E>> {
        let (resolution, mut record) = self.existing(path)?;
        let directory = resolution.directory(self.generation);
        let mask = mask & Attributes::CHANGEABLE;
        let change = |current: Attributes| (attributes & mask) | (current - mask);
        match &mut record.body {
            Body::Short(entry) => entry.attributes = change(entry.attributes()).bits(),
            Body::Set(set) => {
                let mut file_directory = set.file_directory();
                file_directory.set_file_attributes(change(file_directory.file_attributes()));
                set.set_file_directory(&file_directory);
            }
        }
        self.rewrite(&directory, &mut record)
    }

    /// Set the modification time of an object
    pub(crate) fn utime(&mut self, path: &str, datetime: DateTime) -> Result<(), Error<E>> {
        let (resolution, mut record) = self.existing(path)?;
        let directory = resolution.directory(self.generation);
        match &mut record.body {
            Body::Short(entry) => entry.set_modified(datetime.timestamp),
            Body::Set(set) => {
                let mut file_directory = set.file_directory();
                file_directory.set_last_modified_timestamp(datetime);
                set.set_file_directory(&file_directory);
            }
        }
        self.rewrite(&directory, &mut record)
    }

    pub(crate) fn chdir(&mut self, path: &str) -> Result<(), Error<E>> {
        let resolution = self.resolve(path)?;
        let directory = resolution.directory(self.generation);
        let mut frames = resolution.frames;
        match resolution.target {
            Target::Origin => {}
            Target::Found(record) => {
                let object = self.object_of(&record, &directory);
                if !object.is_directory() {
                    return Err(OperationError::NoPath.into());
                }
                frames.push(Frame { object, name: self.file_info(&record).name });
            }
            Target::Missing => return Err(OperationError::NoPath.into()),
        }
        self.cwd = frames;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::datetime::{DateTime, Timestamp};
    use crate::error::{Error, InputError, OperationError};
    use crate::file::{Attributes, OpenMode};
    use crate::testing;

    const CREATE: OpenMode = OpenMode::WRITE.union(OpenMode::CREATE_NEW);

    #[test]
    fn test_mkdir() {
        for io in [testing::fat12(), testing::fat32(), testing::exfat()] {
            let fs = testing::filesystem(io);
            let free = fs.free_clusters().unwrap();
            fs.mkdir("/music").unwrap();
            assert_eq!(fs.free_clusters().unwrap(), free - 1);
            let info = fs.stat("/MUSIC").unwrap();
            assert!(info.is_directory());
            assert_eq!(info.size, 0);
            let result = fs.mkdir("/music");
            assert!(matches!(result, Err(Error::Operation(OperationError::AlreadyExists))));
            let result = fs.mkdir("/missing/child");
            assert!(matches!(result, Err(Error::Operation(OperationError::NoPath))));
            // Only dot entries inside, which are not listed
            let mut directory = fs.open_dir("/music").unwrap();
            assert_eq!(directory.read().unwrap(), None);
        }
    }

    #[test]
    fn test_dot_entries() {
        let fs = testing::filesystem(testing::fat16());
        fs.mkdir("a").unwrap();
        fs.mkdir("a/b").unwrap();
        fs.open("a/b/../b/./file", CREATE).unwrap().close().unwrap();
        assert!(fs.stat("a/b/file").is_ok());
        fs.chdir("a/b").unwrap();
        assert!(fs.stat("../b/file").is_ok());
        assert!(fs.stat("../../a").unwrap().is_directory());
    }

    #[test]
    fn test_remove() {
        for io in [testing::fat16(), testing::exfat()] {
            let fs = testing::filesystem(io);
            let free = fs.free_clusters().unwrap();
            fs.mkdir("dir").unwrap();
            let mut file = fs.open("dir/file", CREATE).unwrap();
            file.seek(crate::file::SeekFrom::Start(3000)).unwrap();
            file.close().unwrap();
            let result = fs.remove("dir");
            assert!(matches!(result, Err(Error::Operation(OperationError::DirectoryNotEmpty))));
            fs.chmod("dir/file", Attributes::READ_ONLY, Attributes::READ_ONLY).unwrap();
            let result = fs.remove("dir/file");
            assert!(matches!(result, Err(Error::Operation(OperationError::Denied))));
            fs.chmod("dir/file", Attributes::empty(), Attributes::READ_ONLY).unwrap();
            fs.remove("dir/file").unwrap();
            fs.chdir("dir").unwrap();
            let result = fs.remove("/dir");
            assert!(matches!(result, Err(Error::Operation(OperationError::Denied))));
            fs.chdir("/").unwrap();
            fs.remove("dir").unwrap();
            assert_eq!(fs.free_clusters().unwrap(), free);
            let result = fs.remove("dir");
            assert!(matches!(result, Err(Error::Operation(OperationError::NotFound))));
            let result = fs.remove("/");
            assert!(matches!(result, Err(Error::Input(InputError::InvalidName))));
        }
    }

    #[test]
    fn test_rename() {
        for io in [testing::fat12(), testing::fat32(), testing::exfat()] {
            let fs = testing::filesystem(io);
            fs.mkdir("src").unwrap();
            fs.mkdir("dst").unwrap();
            let mut file = fs.open("src/notes.txt", CREATE).unwrap();
            file.seek(crate::file::SeekFrom::Start(100)).unwrap();
            file.close().unwrap();
            fs.rename("src/notes.txt", "dst/Meeting Notes.txt").unwrap();
            assert!(matches!(fs.stat("src/notes.txt"), Err(Error::Operation(OperationError::NotFound))));
            let info = fs.stat("dst/meeting notes.txt").unwrap();
            assert_eq!(info.name, "Meeting Notes.txt");
            assert_eq!(info.size, 100);
            assert!(info.attributes.contains(Attributes::ARCHIVE));
            // Case only change in place
            fs.rename("dst/meeting notes.txt", "dst/MEETING NOTES.TXT").unwrap();
            assert_eq!(fs.stat("dst/meeting notes.txt").unwrap().name, "MEETING NOTES.TXT");

            fs.open("dst/other", CREATE).unwrap().close().unwrap();
            let result = fs.rename("dst/other", "dst/MEETING NOTES.TXT");
            assert!(matches!(result, Err(Error::Operation(OperationError::AlreadyExists))));
            let result = fs.rename("dst", "dst/inner");
            assert!(matches!(result, Err(Error::Operation(OperationError::Denied))));

            // A moved directory keeps its content and its parent link
            fs.rename("dst", "src/dst").unwrap();
            assert_eq!(fs.stat("src/dst/MEETING NOTES.TXT").unwrap().size, 100);
            assert!(fs.stat("src/dst/../dst/other").is_ok());
            fs.chdir("src/dst").unwrap();
            fs.rename("/src", "/renamed").unwrap();
            assert_eq!(fs.getcwd().unwrap(), "/renamed/dst");
            assert!(fs.stat("other").is_ok());
        }
    }

    #[test]
    fn test_chmod_and_utime() {
        for io in [testing::fat16(), testing::exfat()] {
            let fs = testing::filesystem(io);
            fs.open("f", CREATE).unwrap().close().unwrap();
            fs.chmod("f", Attributes::HIDDEN | Attributes::DIRECTORY, Attributes::HIDDEN | Attributes::DIRECTORY)
                .unwrap();
            let info = fs.stat("f").unwrap();
            assert_eq!(info.attributes, Attributes::ARCHIVE | Attributes::HIDDEN);
            fs.chmod("f", Attributes::empty(), Attributes::ARCHIVE).unwrap();
            assert_eq!(fs.stat("f").unwrap().attributes, Attributes::HIDDEN);

            let mut datetime = DateTime::default();
            datetime.timestamp = Timestamp::new(2030, 6, 15, 12, 30, 10);
            fs.utime("f", datetime).unwrap();
            assert_eq!(fs.stat("f").unwrap().modified, datetime.timestamp);
        }
    }

    #[test]
    fn test_chdir() {
        let fs = testing::filesystem(testing::exfat());
        fs.mkdir("a").unwrap();
        fs.open("a/file", CREATE).unwrap().close().unwrap();
        let result = fs.chdir("a/file");
        assert!(matches!(result, Err(Error::Operation(OperationError::NoPath))));
        let result = fs.chdir("b");
        assert!(matches!(result, Err(Error::Operation(OperationError::NoPath))));
        fs.chdir("0:a").unwrap();
        assert_eq!(fs.getcwd().unwrap(), "/a");
        assert!(fs.stat("file").is_ok());
        fs.chdir("..").unwrap();
        assert_eq!(fs.getcwd().unwrap(), "/");
    }
}
