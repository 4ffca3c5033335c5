//! Unpacking engine: stream entries out of the format reader, filter them,
//! write them to disk and report progress.
//!
//! Zip and tar walks materialize entry content eagerly into a destination
//! map before the write phase; the compressed-file path streams the single
//! logical entry straight to its destination. The destination directory
//! always exists afterwards, even when no entry matched the filters.

mod compressed;
mod rar;
mod tar;
mod zip;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::common::{effective_passwords, ArchiveMeta, ArchiveUnpack};
use crate::error::ArchiverError;
use crate::filter::IgnoreMatcher;
use crate::format::{self, Container, FormatHandle};
use crate::pack::finalize_session;
use crate::progress::{copy_with_session, Session};
use crate::{fsx, password, pathutil};

/// Unpack the archive named by `meta` into the destination directory.
pub fn start_unpacking(
    meta: &ArchiveMeta,
    unpack: &ArchiveUnpack,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    // Copied so the caller can reuse its originals concurrently.
    let meta = meta.clone();
    let unpack = unpack.clone();

    session.set_debounce(unpack.progress_debounce);
    let passwords = effective_passwords(&unpack.passwords, &meta);
    let prepared = password::prepare_archive(&meta, &passwords)?;
    if prepared.is_password_required {
        if passwords.is_empty() {
            return Err(ArchiverError::PasswordRequired);
        }
        if !prepared.is_valid_password {
            return Err(ArchiverError::InvalidPassword);
        }
    }

    let handle = format::resolve(&meta).map_err(|err| match err {
        ArchiverError::FormatUnsupported(name) => ArchiverError::FormatUnsupportedUnpack(name),
        other => other,
    })?;
    let ignore = IgnoreMatcher::new(&meta.gitignore_patterns)?;
    let filter = EntryFilter::new(&unpack.file_list, ignore);

    let result = match &handle {
        FormatHandle::Zip(_) => zip::unpack_zip(&meta, &unpack, &passwords, &filter, session),
        FormatHandle::Common(common) => match common.container {
            Container::Tar(wrapping) => {
                if !passwords.is_empty() {
                    // Tar-family formats have no password validation; supplied
                    // passwords are a cross-format don't-care.
                    tracing::debug!("passwords supplied for a tar-family archive are ignored");
                }
                tar::unpack_tar(&meta, &unpack, wrapping, &filter, session)
            }
            Container::Rar => rar::unpack_rar(&meta, &unpack, &passwords, &filter, session),
        },
        FormatHandle::Compressed(handle) => {
            compressed::unpack_compressed(&meta, &unpack, handle.codec, &filter, session)
        }
    };
    let result = finalize_session(session, result);
    if result.is_ok() {
        // Zero matching entries must still produce an empty destination.
        fs::create_dir_all(&unpack.destination)?;
    }
    result
}

/// The unpack entry filter: the allow-filter narrows first, then the ignore
/// patterns remove a subset of what remains.
pub(crate) struct EntryFilter {
    allow: Vec<String>,
    ignore: IgnoreMatcher,
}

impl EntryFilter {
    fn new(file_list: &[String], ignore: IgnoreMatcher) -> Self {
        let allow = file_list.iter().map(|f| pathutil::to_slash(f)).collect();
        Self { allow, ignore }
    }

    /// `archive_path` is the slash-normalized entry path, dir-suffixed for
    /// directories. An entry passes when some allow path is a prefix of (or
    /// equal to) it, and no ignore pattern matches it.
    pub(crate) fn includes(&self, archive_path: &str) -> bool {
        if !self.allow.is_empty() {
            let trimmed = archive_path.strip_suffix('/').unwrap_or(archive_path);
            let allowed = self
                .allow
                .iter()
                .any(|f| trimmed.starts_with(f.as_str()) || archive_path.starts_with(f.as_str()));
            if !allowed {
                return false;
            }
        }
        !self.ignore.is_match(archive_path)
    }
}

/// What one destination path receives.
pub(crate) enum EntryPayload {
    Directory,
    File(Vec<u8>),
    Symlink(String),
}

/// One materialized entry bound to its absolute destination path.
pub(crate) struct UnpackEntry {
    pub archive_path: String,
    pub mode: u32,
    pub size: u64,
    pub payload: EntryPayload,
}

pub(crate) type DestinationMap = BTreeMap<PathBuf, UnpackEntry>;

/// Join an archive path onto the destination, refusing traversal and
/// absolute components. Unsafe entries are dropped, not fatal.
pub(crate) fn sanitize_destination(destination: &Path, archive_path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(archive_path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(destination.join(clean))
}

/// The shared write phase: directories first (the map iterates parents
/// before children), then file bytes and symlink targets, with one progress
/// emission per entry and a cancellation check before each.
pub(crate) fn write_entries(
    entries: &DestinationMap,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let total_files = entries
        .values()
        .filter(|e| !matches!(e.payload, EntryPayload::Directory))
        .count() as u64;
    let total_size: u64 = entries.values().map(|e| e.size).sum();
    session.initialize_progress(total_files, total_size);
    session.enable_ctx_cancel();

    for (dest, entry) in entries {
        session.check_cancel()?;
        let dest_str = dest.to_string_lossy().to_string();
        tracing::debug!(entry = %entry.archive_path, dest = %dest_str, "writing entry");
        match &entry.payload {
            EntryPayload::Directory => {
                session.begin_file(&dest_str, 0);
                fs::create_dir_all(dest)?;
                if entry.mode & 0o7777 != 0 {
                    fsx::set_unix_permissions(dest, entry.mode)?;
                }
            }
            EntryPayload::File(content) => {
                session.begin_file(&dest_str, entry.size);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = fs::File::create(dest)?;
                copy_with_session(&mut content.as_slice(), &mut out, session)?;
                if entry.mode & 0o7777 != 0 {
                    fsx::set_unix_permissions(dest, entry.mode)?;
                }
                session.end_file();
            }
            EntryPayload::Symlink(target) => {
                session.begin_file(&dest_str, 0);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                // Overwrite-existing applies to links too; the target is
                // written verbatim and may dangle.
                if fs::symlink_metadata(dest).is_ok() {
                    fs::remove_file(dest)?;
                }
                fsx::symlink(Path::new(target), dest)?;
                session.end_file();
            }
        }
    }
    Ok(())
}
