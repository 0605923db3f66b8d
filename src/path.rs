//! Path resolution from the root or the current directory

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::cluster_heap::directory::entry::{Record, Scan};
use crate::cluster_heap::object::Object;
use crate::codec::{self, ParsedName};
use crate::error::{Error, InputError, OperationError};
use crate::io;
use crate::volume::Volume;

/// One directory walked through, kept for the current directory and getcwd
#[derive(Clone, Debug)]
pub(crate) struct Frame {
    pub object: Object,
    pub name: String,
}

#[derive(Debug)]
pub(crate) enum Target {
    /// The path names the directory the walk ended in, such as `/` or `a/..`
    Origin,
    Found(Record),
    /// The last component does not exist, its parent does
    Missing,
}

#[derive(Debug)]
pub(crate) struct Resolution {
    /// Directories from the root down to the parent of the target
    pub frames: Vec<Frame>,
    pub target: Target,
    /// Parsed last component, None for `Origin`
    pub name: Option<ParsedName>,
}

impl Resolution {
    /// Directory holding the target, or the target itself for `Origin`
    pub(crate) fn directory(&self, generation: u32) -> Object {
        self.frames.last().map(|frame| frame.object).unwrap_or_else(|| Object::root(generation))
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

impl<E: Debug, IO: io::IO<Error = E>> Volume<IO> {
    /// Strip a `N:` drive prefix, which must name this volume
    fn strip_drive<'a>(&self, path: &'a str) -> Result<&'a str, InputError> {
        let index = match path.find(|c: char| c == ':' || is_separator(c)) {
            Some(index) if path.as_bytes()[index] == b':' => index,
            _ => return Ok(path),
        };
        let drive = path.as_bytes();
        if index != 1 || !drive[0].is_ascii_digit() || drive[0] - b'0' != self.options.drive {
            return Err(InputError::InvalidDrive);
        }
        Ok(&path[index + 1..])
    }

    pub(crate) fn resolve(&mut self, path: &str) -> Result<Resolution, Error<E>> {
        let path = self.strip_drive(path)?;
        let mut frames = match path.starts_with(is_separator) {
            true => Vec::new(),
            false => self.cwd.clone(),
        };
        let components: Vec<&str> = path.split(is_separator).filter(|c| !c.is_empty()).collect();
        for (i, &component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            match component {
                "." => continue,
                ".." => {
                    frames.pop();
                    continue;
                }
                _ => {}
            }
            let name = codec::parse(component, self.options.codepage)?;
            let directory = frames.last().map(|frame| frame.object).unwrap_or_else(|| Object::root(self.generation));
            let mut cursor = self.cursor(&directory)?;
            let record = self.scan(&mut cursor, Scan::Name(&name))?;
            if last {
                let target = match record {
                    Some(record) => Target::Found(record),
                    None => Target::Missing,
                };
                return Ok(Resolution { frames, target, name: Some(name) });
            }
            let record = record.ok_or(Error::Operation(OperationError::NoPath))?;
            let object = self.object_of(&record, &directory);
            if !object.is_directory() {
                return Err(OperationError::NoPath.into());
            }
            frames.push(Frame { object, name: self.file_info(&record).name });
        }
        Ok(Resolution { frames, target: Target::Origin, name: None })
    }

    /// Absolute path of the current directory
    pub(crate) fn getcwd(&self) -> String {
        if self.cwd.is_empty() {
            return String::from("/");
        }
        let mut path = String::new();
        for frame in self.cwd.iter() {
            path.push('/');
            path.push_str(&frame.name);
        }
        path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::file::Attributes;
    use crate::options::Options;
    use crate::testing;

    fn mkdir(volume: &mut Volume<crate::io::memory::MemoryIO>, path: &str) {
        volume.mkdir(path).unwrap();
    }

    #[test]
    fn test_drive_prefix() {
        let mut volume = testing::volume(testing::fat12());
        assert!(matches!(volume.resolve("0:/").unwrap().target, Target::Origin));
        let result = volume.resolve("1:/");
        assert!(matches!(result, Err(Error::Input(InputError::InvalidDrive))));
        let result = volume.resolve("10:/");
        assert!(matches!(result, Err(Error::Input(InputError::InvalidDrive))));
        // A colon after a separator is part of a name
        let result = volume.resolve("/a:b");
        assert!(matches!(result, Err(Error::Input(InputError::InvalidName))));

        let options = Options { drive: 3, ..testing::options() };
        let mut volume = Volume::mount(testing::fat12(), options).unwrap();
        assert!(matches!(volume.resolve("3:").unwrap().target, Target::Origin));
    }

    #[test]
    fn test_walk() {
        for io in [testing::fat16(), testing::exfat()] {
            let mut volume = testing::volume(io);
            mkdir(&mut volume, "/docs");
            mkdir(&mut volume, "/docs/drafts");
            let resolution = volume.resolve("/docs/drafts").unwrap();
            assert_eq!(resolution.frames.len(), 1);
            let record = match resolution.target {
                Target::Found(record) => record,
                target => panic!("unexpected {:?}", target),
            };
            assert!(record.body.attributes().contains(Attributes::DIRECTORY));

            let resolution = volume.resolve("docs//drafts/../drafts/./").unwrap();
            assert!(matches!(resolution.target, Target::Origin));
            assert_eq!(resolution.frames.len(), 2);
            let resolution = volume.resolve("/docs/drafts/..").unwrap();
            assert!(matches!(resolution.target, Target::Origin));
            assert_eq!(resolution.frames.len(), 1);
            assert!(matches!(volume.resolve("/docs/missing").unwrap().target, Target::Missing));
            let result = volume.resolve("/missing/file");
            assert!(matches!(result, Err(Error::Operation(OperationError::NoPath))));
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut volume = testing::volume(testing::fat32());
        mkdir(&mut volume, "/a");
        mkdir(&mut volume, "/a/b");
        let first = volume.resolve("/a/b").unwrap();
        let second = volume.resolve("/a/b").unwrap();
        let (x_directory, y_directory) = (first.directory(1), second.directory(1));
        assert_eq!(x_directory, y_directory);
        match (first.target, second.target) {
            (Target::Found(x), Target::Found(y)) => {
                assert_eq!(x.position(), y.position());
                assert_eq!(volume.object_of(&x, &x_directory), volume.object_of(&y, &y_directory));
            }
            _ => panic!("not found"),
        }
    }

    #[test]
    fn test_getcwd() {
        let mut volume = testing::volume(testing::fat16());
        assert_eq!(volume.getcwd(), "/");
        mkdir(&mut volume, "/Projects");
        mkdir(&mut volume, "/Projects/rust");
        volume.chdir("projects/RUST").unwrap();
        assert_eq!(volume.getcwd(), "/Projects/rust");
        volume.chdir("..").unwrap();
        assert_eq!(volume.getcwd(), "/Projects");
        volume.chdir("/").unwrap();
        assert_eq!(volume.getcwd(), "/");
    }
}
