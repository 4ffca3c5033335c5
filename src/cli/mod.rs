use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::common::{OrderBy, OrderDir};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// List the contents of an archive without extracting it.
    #[command(alias = "l")]
    List {
        /// The archive file to list.
        #[arg(required = true)]
        archive: PathBuf,

        /// Restrict the listing to a directory inside the archive.
        #[arg(long, default_value = "")]
        path: String,

        /// Recurse into subdirectories of the listed path.
        #[arg(short, long)]
        recursive: bool,

        /// Sort key for the listing.
        #[arg(long, value_enum, default_value_t = OrderByArg::FullPath)]
        order_by: OrderByArg,

        /// Sort direction. `none` keeps the archive's own order.
        #[arg(long, value_enum, default_value_t = OrderDirArg::Asc)]
        order_dir: OrderDirArg,

        /// Password candidates, tried in order where the format supports it.
        #[arg(short, long)]
        password: Vec<String>,

        /// Gitignore-style patterns excluded from the listing.
        #[arg(long = "ignore")]
        ignore_patterns: Vec<String>,

        /// Print the listing as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Pack files and directories into a new archive.
    #[command(alias = "p")]
    Pack {
        /// One or more input files or directories.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The path for the output archive (the extension picks the format).
        #[arg(short, long)]
        output: PathBuf,

        /// Password to encrypt with (zip only). Falls back to UNIPACK_PASSWORD.
        #[arg(long)]
        password: Option<String>,

        /// Zip encryption scheme used when a password is set.
        #[arg(long, value_enum, default_value_t = ZipEncryptionArg::Aes256)]
        zip_encryption: ZipEncryptionArg,

        /// Gitignore-style patterns excluded from the archive.
        #[arg(long = "ignore")]
        ignore_patterns: Vec<String>,

        /// Render a progress line on stderr.
        #[arg(long)]
        progress: bool,
    },

    /// Unpack an archive into a destination directory.
    #[command(alias = "x")]
    Unpack {
        /// The archive file to unpack.
        #[arg(required = true)]
        archive: PathBuf,

        /// Specific archive paths to unpack. If empty, everything is unpacked.
        entries: Vec<String>,

        /// The directory files are written into.
        #[arg(short, long)]
        output: PathBuf,

        /// Password candidates, tried in order where the format supports it.
        #[arg(short, long)]
        password: Vec<String>,

        /// Gitignore-style patterns excluded from unpacking.
        #[arg(long = "ignore")]
        ignore_patterns: Vec<String>,

        /// Render a progress line on stderr.
        #[arg(long)]
        progress: bool,
    },

    /// Report whether an archive is encrypted and whether a password unlocks it.
    Probe {
        /// The archive file to probe.
        #[arg(required = true)]
        archive: PathBuf,

        /// Password to validate against the archive.
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderByArg {
    Name,
    Size,
    ModTime,
    FullPath,
    Kind,
}

impl From<OrderByArg> for OrderBy {
    fn from(value: OrderByArg) -> Self {
        match value {
            OrderByArg::Name => OrderBy::Name,
            OrderByArg::Size => OrderBy::Size,
            OrderByArg::ModTime => OrderBy::ModTime,
            OrderByArg::FullPath => OrderBy::FullPath,
            OrderByArg::Kind => OrderBy::Kind,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderDirArg {
    Asc,
    Desc,
    None,
}

impl From<OrderDirArg> for OrderDir {
    fn from(value: OrderDirArg) -> Self {
        match value {
            OrderDirArg::Asc => OrderDir::Asc,
            OrderDirArg::Desc => OrderDir::Desc,
            OrderDirArg::None => OrderDir::None,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZipEncryptionArg {
    Aes256,
    ZipCrypto,
}

impl From<ZipEncryptionArg> for crate::common::EncryptionMethod {
    fn from(value: ZipEncryptionArg) -> Self {
        match value {
            ZipEncryptionArg::Aes256 => crate::common::EncryptionMethod::Aes256,
            ZipEncryptionArg::ZipCrypto => crate::common::EncryptionMethod::ZipCrypto,
        }
    }
}

/// Gets the password from the command-line option or the `UNIPACK_PASSWORD`
/// environment variable.
///
/// Priority:
/// 1. `--password` command-line argument(s).
/// 2. `UNIPACK_PASSWORD` environment variable.
/// 3. `None`, letting the caller prompt interactively where that makes sense.
pub fn passwords_from_opt_or_env(passwords: Vec<String>) -> Vec<String> {
    if !passwords.is_empty() {
        return passwords;
    }
    if let Ok(password) = std::env::var("UNIPACK_PASSWORD") {
        if !password.is_empty() {
            return vec![password];
        }
    }
    Vec::new()
}

/// Parses command-line arguments and returns the command to execute.
pub fn run() -> Result<Commands, Box<dyn std::error::Error>> {
    let args = Args::parse();
    Ok(args.command)
}
