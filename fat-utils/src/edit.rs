use chrono::NaiveDateTime;
use fat::error::{Error, OperationError};
use fat::{Attributes, DateTime, OpenMode, SeekFrom};

use crate::{CliError, Result, FS};

pub fn touch(fs: &FS, path: &str, date: Option<&str>) -> Result<()> {
    let mut datetime = DateTime::now();
    if let Some(date) = date {
        let naive = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| CliError::Argument(format!("{}: {}", date, e)))?;
        datetime = DateTime { timestamp: naive.into(), ..Default::default() };
    }
    match fs.open(path, OpenMode::WRITE | OpenMode::CREATE_NEW) {
        Ok(file) => file.close()?,
        Err(Error::Operation(OperationError::AlreadyExists)) => {}
        Err(error) => return Err(error.into()),
    }
    fs.utime(path, datetime)?;
    Ok(())
}

fn parse_attributes(changes: &[String]) -> Result<(Attributes, Attributes)> {
    let mut attributes = Attributes::empty();
    let mut mask = Attributes::empty();
    for change in changes {
        let mut chars = change.chars();
        let set = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(CliError::Argument(change.clone())),
        };
        for c in chars {
            let flag = match c.to_ascii_lowercase() {
                'r' => Attributes::READ_ONLY,
                'h' => Attributes::HIDDEN,
                's' => Attributes::SYSTEM,
                'a' => Attributes::ARCHIVE,
                _ => return Err(CliError::Argument(change.clone())),
            };
            mask |= flag;
            attributes.set(flag, set);
        }
    }
    Ok((attributes, mask))
}

pub fn attrib(fs: &FS, path: &str, changes: &[String]) -> Result<()> {
    let (attributes, mask) = parse_attributes(changes)?;
    fs.chmod(path, attributes, mask)?;
    println!("{:?}", fs.stat(path)?.attributes);
    Ok(())
}

pub fn truncate(fs: &FS, path: &str, size: u64) -> Result<()> {
    let mut file = fs.open(path, OpenMode::WRITE)?;
    if size > file.size() {
        return Err(CliError::Argument(format!("{} is larger than the file", size)));
    }
    file.seek(SeekFrom::Start(size))?;
    file.truncate()?;
    file.close()?;
    Ok(())
}

pub fn expand(fs: &FS, path: &str, size: u64, allocate: bool) -> Result<()> {
    let mut file = fs.open(path, OpenMode::WRITE | OpenMode::OPEN_ALWAYS)?;
    file.expand(size, allocate)?;
    if allocate {
        for fragment in file.build_link_map(1)? {
            println!("Reserved {} clusters from {}", fragment.length, fragment.start);
        }
    }
    file.close()?;
    Ok(())
}
