mod edit;
mod list;
mod stat;
mod volume;

use std::io;

use clap::Parser;
use fat::io::std::FileIO;
use fat::{DateTime, FileSystem, Options};

pub(crate) type FS = FileSystem<FileIO>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    FS(#[from] fat::error::Error<io::Error>),
    #[error("{0}")]
    IO(#[from] io::Error),
    #[error("invalid argument: {0}")]
    Argument(String),
}

pub(crate) type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, clap::Args)]
struct Path {
    /// Path inside the volume
    path: String,
}

#[derive(Debug, clap::Args)]
struct List {
    /// Specify path to list, default to root directory
    #[clap(default_value = "/")]
    path: String,
}

#[derive(Debug, clap::Args)]
struct Find {
    /// Directory to search
    path: String,
    /// Wildcard pattern, `?` and `*` allowed
    pattern: String,
}

#[derive(Debug, clap::Args)]
struct Move {
    from: String,
    to: String,
}

#[derive(Debug, clap::Args)]
struct Touch {
    path: String,
    /// Modification time as `YYYY-MM-DD HH:MM:SS`, default to now
    #[clap(short, long)]
    date: Option<String>,
}

#[derive(Debug, clap::Args)]
struct Attrib {
    path: String,
    /// Attribute changes such as `+r`, `-h`, `+a`
    #[clap(allow_hyphen_values = true)]
    changes: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct Truncate {
    path: String,
    /// Size to cut the file at
    size: u64,
}

#[derive(Debug, clap::Args)]
struct Expand {
    path: String,
    /// Size to reserve
    size: u64,
    /// Only look for the contiguous run, do not allocate it
    #[clap(long)]
    dry_run: bool,
}

#[derive(Debug, clap::Args)]
struct Label {
    /// New volume label, print the current one when omitted
    label: Option<String>,
}

#[derive(Debug, clap::Args)]
struct Dump {
    /// Absolute sector number on the device
    sector: u64,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// List file and directory in specified path
    #[clap(name = "ls")]
    List(List),
    /// Find directory entries matching a pattern
    Find(Find),
    /// Show information of a file or directory
    Stat(Path),
    /// Show the cluster runs of a file
    Map(Path),
    /// Create a directory
    Mkdir(Path),
    /// Remove a file or an empty directory
    #[clap(name = "rm")]
    Remove(Path),
    /// Rename or move a file or directory
    #[clap(name = "mv")]
    Move(Move),
    /// Create a file or change its timestamp
    Touch(Touch),
    /// Change attributes
    Attrib(Attrib),
    /// Truncate file
    Truncate(Truncate),
    /// Reserve a contiguous area for an empty file
    Expand(Expand),
    /// Show free space
    Df,
    /// Show or change the volume label
    Label(Label),
    /// Hex dump one sector of the device
    Dump(Dump),
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long)]
    quiet: bool,
    #[clap(short, action = clap::ArgAction::Count)]
    verbosity: u8,
    /// Block device or image file formatted with FAT or exFAT
    #[clap(short, long)]
    device: String,
    /// Open the device read only
    #[clap(short, long)]
    read_only: bool,
    #[clap(subcommand)]
    action: Action,
}

#[no_mangle]
fn fat_datetime_now() -> DateTime {
    chrono::Local::now().into()
}

fn mount(args: &Args) -> Result<FS> {
    let io = match args.read_only {
        true => FileIO::open_read_only(&args.device)?,
        false => FileIO::open(&args.device)?,
    };
    let options = Options { read_only: args.read_only, ..Default::default() };
    Ok(FileSystem::mount(io, options)?)
}

fn run(args: Args) -> Result<()> {
    if let Action::Dump(dump) = &args.action {
        return volume::dump(&args.device, dump.sector);
    }
    let fs = mount(&args)?;
    match args.action {
        Action::List(args) => list::list(&fs, &args.path),
        Action::Find(args) => list::find(&fs, &args.path, &args.pattern),
        Action::Stat(args) => stat::stat(&fs, &args.path),
        Action::Map(args) => stat::map(&fs, &args.path),
        Action::Mkdir(args) => Ok(fs.mkdir(&args.path)?),
        Action::Remove(args) => Ok(fs.remove(&args.path)?),
        Action::Move(args) => Ok(fs.rename(&args.from, &args.to)?),
        Action::Touch(args) => edit::touch(&fs, &args.path, args.date.as_deref()),
        Action::Attrib(args) => edit::attrib(&fs, &args.path, &args.changes),
        Action::Truncate(args) => edit::truncate(&fs, &args.path, args.size),
        Action::Expand(args) => edit::expand(&fs, &args.path, args.size, !args.dry_run),
        Action::Df => volume::df(&fs),
        Action::Label(args) => volume::label(&fs, args.label.as_deref()),
        Action::Dump(_) => Ok(()),
    }?;
    fs.unmount()?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    let level = match (args.quiet, args.verbosity) {
        (true, _) => log::LevelFilter::Off,
        (_, 0) => log::LevelFilter::Info,
        (_, 1) => log::LevelFilter::Debug,
        (_, _) => log::LevelFilter::Trace,
    };
    log::set_max_level(level);
    env_logger::builder().filter(None, level).target(env_logger::Target::Stdout).init();

    if let Err(error) = run(args) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}
