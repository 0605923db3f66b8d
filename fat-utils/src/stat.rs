use fat::OpenMode;

use crate::{Result, FS};

pub fn stat(fs: &FS, path: &str) -> Result<()> {
    let info = fs.stat(path)?;
    println!("Name: {}", info.name);
    if !info.short_name.is_empty() {
        println!("Short name: {}", info.short_name);
    }
    println!("Type: {}", if info.is_directory() { "directory" } else { "file" });
    println!("Size: {}", info.size);
    println!("Attributes: {:?}", info.attributes);
    let modified: chrono::NaiveDateTime = info.modified.into();
    println!("Modified: {}", modified.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

/// Print the runs of consecutive clusters a file occupies
pub fn map(fs: &FS, path: &str) -> Result<()> {
    let cluster_size = fs.info()?.cluster_size as u64;
    let mut file = fs.open(path, OpenMode::READ)?;
    let clusters = file.size().div_ceil(cluster_size) as usize;
    let fragments = file.build_link_map(clusters.max(1))?;
    let mut offset = 0u64;
    for fragment in fragments.iter() {
        println!("{:>12} cluster {:>10} x {}", offset, fragment.start, fragment.length);
        offset += fragment.length as u64 * cluster_size;
    }
    println!("{} fragments", fragments.len());
    file.close()?;
    Ok(())
}
