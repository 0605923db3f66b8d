use fat::io::std::FileIO;
use fat::io::IO;
use pretty_hex::PrettyHex;

use crate::{Result, FS};

pub fn df(fs: &FS) -> Result<()> {
    let info = fs.info()?;
    let free = fs.free_clusters()? as u64;
    let cluster_size = info.cluster_size as u64;
    let total = info.clusters as u64 * cluster_size;
    println!("Type: {}", info.fs_type);
    println!("Serial number: {:08X}", info.serial_number);
    println!("Cluster size: {}", cluster_size);
    println!("Total: {} bytes, {} clusters", total, info.clusters);
    println!("Free: {} bytes, {} clusters", free * cluster_size, free);
    Ok(())
}

pub fn label(fs: &FS, label: Option<&str>) -> Result<()> {
    match label {
        Some(label) => fs.set_label(label)?,
        None => println!("{}", fs.label()?),
    }
    Ok(())
}

pub fn dump(device: &str, sector: u64) -> Result<()> {
    let mut io = FileIO::open_read_only(device)?;
    let mut buf = vec![0u8; io.sector_size() as usize];
    io.read(sector.into(), &mut buf)?;
    println!("{:?}", buf.hex_dump());
    Ok(())
}
