use fat::{Attributes, FileInfo};

use crate::{Result, FS};

fn print(info: &FileInfo) {
    let attributes = info.attributes;
    print!("{}", if attributes.contains(Attributes::DIRECTORY) { "d" } else { "-" });
    print!("{}", if attributes.contains(Attributes::READ_ONLY) { "r" } else { "-" });
    print!("{}", if attributes.contains(Attributes::SYSTEM) { "s" } else { "-" });
    print!("{}", if attributes.contains(Attributes::HIDDEN) { "h" } else { "-" });
    print!("{}", if attributes.contains(Attributes::ARCHIVE) { "a" } else { "-" });
    print!(" {:10}", info.size);
    print!(" {}", info.modified);
    let suffix = if info.is_directory() { "/" } else { "" };
    match info.short_name.is_empty() {
        true => println!(" {}{}", info.name, suffix),
        false => println!(" {}{} ({})", info.name, suffix, info.short_name),
    }
}

pub fn list(fs: &FS, path: &str) -> Result<()> {
    let mut directory = fs.open_dir(path)?;
    while let Some(info) = directory.read()? {
        print(&info);
    }
    directory.close()?;
    Ok(())
}

pub fn find(fs: &FS, path: &str, pattern: &str) -> Result<()> {
    let (mut directory, mut next) = fs.find_first(path, pattern)?;
    let mut count = 0;
    while let Some(info) = next {
        print(&info);
        count += 1;
        next = directory.find_next()?;
    }
    log::debug!("{} entries match {}", count, pattern);
    directory.close()?;
    Ok(())
}
