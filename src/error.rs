use thiserror::Error;

/// The primary error type for all operations in the `unipack` crate.
///
/// Every public entry point returns this type. The variants form a closed
/// taxonomy: callers can match on the kind of failure without parsing
/// message strings. Underlying filesystem and codec errors pass through
/// unwrapped via the transparent variants.
#[derive(Error, Debug)]
pub enum ArchiverError {
    /// A password was required and the supplied one was wrong, empty or missing.
    #[error("invalid password")]
    InvalidPassword,

    /// The archive is password protected and no password was supplied.
    #[error("password is required")]
    PasswordRequired,

    /// The filename extension does not map to any supported format.
    #[error("unsupported archive format: {0}")]
    FormatUnsupported(String),

    /// The filename extension does not map to any format that can be unpacked.
    #[error("unsupported archive format for unpacking: {0}")]
    FormatUnsupportedUnpack(String),

    /// The requested listing scope was never observed while walking the archive.
    #[error("path not found in the archive: {0}")]
    NoPathToFilter(String),

    /// More than one source file was supplied for a single-entry codec.
    #[error("a compressed file can hold exactly one file")]
    CompressedFileInvalidSize,

    /// No usable source file was found for a single-entry codec.
    #[error("no file found to compress")]
    CompressedFileNoFileFound,

    /// A directory was supplied where a single-entry codec requires a file.
    #[error("only a file can be written to a compressed file")]
    CompressedFileOnlyFileAllowed,

    /// A walker for the archive could not be obtained.
    #[error("unable to walk the archive: {0}")]
    ArchiverList(String),

    /// The session was cancelled while a file operation was in flight.
    #[error("file operation was cancelled")]
    CancelledFileOperation,

    /// An ignore pattern failed to compile.
    #[error("invalid ignore pattern: {0}")]
    IgnorePattern(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// An error reported by the rar reader. Mapped at the call site because
    /// the underlying library reports errors per cursor state.
    #[error("rar error: {0}")]
    Rar(String),
}

impl ArchiverError {
    /// True when the error means the operation was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ArchiverError::CancelledFileOperation)
    }
}
