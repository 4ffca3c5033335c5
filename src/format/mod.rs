//! Archive-format registry: maps a filename extension to exactly one format
//! handle carrying the capability set and normalized configuration the
//! engines need. The enums are closed; adding a format without updating
//! every match is a compile error.

use crate::common::{ArchiveMeta, EncryptionMethod};
use crate::error::ArchiverError;
use crate::pathutil;

/// Standalone compression codecs: single logical entry, no path tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gz,
    Br,
    Bz2,
    Lz4,
    Sz,
    Xz,
    Zst,
}

impl Codec {
    pub fn from_extension(ext: &str) -> Option<Codec> {
        match ext {
            "gz" => Some(Codec::Gz),
            "br" => Some(Codec::Br),
            "bz2" => Some(Codec::Bz2),
            "lz4" => Some(Codec::Lz4),
            "sz" => Some(Codec::Sz),
            "xz" => Some(Codec::Xz),
            "zst" => Some(Codec::Zst),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Gz => "gz",
            Codec::Br => "br",
            Codec::Bz2 => "bz2",
            Codec::Lz4 => "lz4",
            Codec::Sz => "sz",
            Codec::Xz => "xz",
            Codec::Zst => "zst",
        }
    }
}

/// Sequential-entry container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Tar, optionally wrapped in a standalone codec (`tar.gz`, `tar.zst`, ...).
    Tar(Option<Codec>),
    /// Rar. Read-only: listing and unpacking only.
    Rar,
}

/// Normalized handler configuration. Every handle forces the same policy:
/// overwrite existing output, create missing directories, abort on the
/// first error.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub overwrite_existing: bool,
    pub create_missing_directories: bool,
    pub continue_on_error: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            overwrite_existing: true,
            create_missing_directories: true,
            continue_on_error: false,
        }
    }
}

/// Random-access entry reader/writer with per-entry passwords.
#[derive(Debug, Clone)]
pub struct ZipHandle {
    pub config: HandlerConfig,
    pub encryption_method: EncryptionMethod,
}

/// Whole-stream compressor/decompressor around exactly one logical entry.
#[derive(Debug, Clone)]
pub struct CompressedHandle {
    pub config: HandlerConfig,
    pub codec: Codec,
}

/// Sequential walker/writer over a stream of entries.
#[derive(Debug, Clone)]
pub struct CommonArchiveHandle {
    pub config: HandlerConfig,
    pub container: Container,
}

/// The closed dispatch union. Every call site matches exhaustively.
#[derive(Debug, Clone)]
pub enum FormatHandle {
    Zip(ZipHandle),
    Compressed(CompressedHandle),
    Common(CommonArchiveHandle),
}

impl FormatHandle {
    pub fn config(&self) -> &HandlerConfig {
        match self {
            FormatHandle::Zip(handle) => &handle.config,
            FormatHandle::Compressed(handle) => &handle.config,
            FormatHandle::Common(handle) => &handle.config,
        }
    }
}

/// Classify an archive by its filename extension.
///
/// `7z` is recognized but unsupported (stub). Every other unknown extension
/// fails with `FormatUnsupported`.
pub fn resolve(meta: &ArchiveMeta) -> Result<FormatHandle, ArchiverError> {
    let filename = meta
        .filename
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = pathutil::extension(&filename).to_ascii_lowercase();
    tracing::debug!(filename = %filename, extension = %ext, "resolving archive format");

    if ext == "zip" {
        return Ok(FormatHandle::Zip(ZipHandle {
            config: HandlerConfig::default(),
            encryption_method: meta.encryption_method,
        }));
    }
    if ext == "tar" {
        return Ok(common_handle(Container::Tar(None)));
    }
    if ext == "rar" {
        return Ok(common_handle(Container::Rar));
    }
    if let Some(codec_ext) = ext.strip_prefix("tar.") {
        if let Some(codec) = Codec::from_extension(codec_ext) {
            return Ok(common_handle(Container::Tar(Some(codec))));
        }
        return Err(ArchiverError::FormatUnsupported(ext));
    }
    if let Some(codec) = Codec::from_extension(&ext) {
        return Ok(FormatHandle::Compressed(CompressedHandle {
            config: HandlerConfig::default(),
            codec,
        }));
    }
    Err(ArchiverError::FormatUnsupported(if ext.is_empty() {
        filename
    } else {
        ext
    }))
}

fn common_handle(container: Container) -> FormatHandle {
    FormatHandle::Common(CommonArchiveHandle {
        config: HandlerConfig::default(),
        container,
    })
}
