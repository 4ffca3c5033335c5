//! Packing engine: flatten an arbitrary file-list selection into a relative
//! path map, then stream every entry into the format's writer with progress
//! and cooperative cancellation.

mod compressed;
mod tar;
mod zip;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::common::{ArchiveMeta, ArchivePack};
use crate::error::ArchiverError;
use crate::filter::IgnoreMatcher;
use crate::format::{self, Container, FormatHandle};
use crate::progress::{ProgressStatus, Session};
use crate::{fsx, pathutil};

/// Pack the file list into the archive named by `meta`.
///
/// The destination is deleted first when it exists (no partial-overwrite
/// merging) and missing parent directories are created. The first error
/// aborts; a failed pack leaves the destination in an undefined partial
/// state.
pub fn start_packing(
    meta: &ArchiveMeta,
    pack: &ArchivePack,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    // Copied so the caller can reuse its originals concurrently.
    let meta = meta.clone();
    let pack = pack.clone();

    session.set_debounce(pack.progress_debounce);
    let handle = format::resolve(&meta)?;
    if let FormatHandle::Common(common) = &handle {
        if common.container == Container::Rar {
            return Err(ArchiverError::FormatUnsupported("rar".to_string()));
        }
    }
    prepare_destination(&meta.filename, &handle)?;
    let ignore = IgnoreMatcher::new(&meta.gitignore_patterns)?;

    let result = match &handle {
        FormatHandle::Zip(_) => zip::pack_zip(&meta, &pack, &ignore, session),
        FormatHandle::Common(common) => match common.container {
            Container::Tar(wrapping) => tar::pack_tar(&meta, &pack, wrapping, &ignore, session),
            Container::Rar => unreachable!("rar packing rejected above"),
        },
        FormatHandle::Compressed(handle) => {
            compressed::pack_compressed(&meta, &pack, handle.codec, &ignore, session)
        }
    };
    finalize_session(session, result)
}

/// Uniform finalization: success completes the session, cancellation
/// finalizes it as cancelled and propagates, any other error propagates
/// without finalizing.
pub(crate) fn finalize_session(
    session: &mut Session,
    result: Result<(), ArchiverError>,
) -> Result<(), ArchiverError> {
    match result {
        Ok(()) => {
            session.end_progress(ProgressStatus::Completed);
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            session.end_progress(ProgressStatus::Cancelled);
            Err(err)
        }
        Err(err) => Err(err),
    }
}

fn prepare_destination(destination: &Path, handle: &FormatHandle) -> Result<(), ArchiverError> {
    let config = handle.config();
    if config.overwrite_existing && destination.exists() {
        if destination.is_dir() {
            fs::remove_dir_all(destination)?;
        } else {
            fs::remove_file(destination)?;
        }
    }
    if config.create_missing_directories {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

/// One entry of the flatten map: an absolute source path bound to its
/// in-archive relative path and the metadata needed to write it. Built once
/// by the walk phase, consumed once by the write phase.
pub(crate) struct PackEntry {
    pub absolute: PathBuf,
    /// Slash-normalized relative path without a trailing separator; the
    /// writers append one for directories where the format wants it.
    pub relative: String,
    pub is_dir: bool,
    pub size: u64,
    pub mode: u32,
    pub mtime_secs: u64,
    pub link_target: Option<PathBuf>,
}

pub(crate) struct FlattenedList {
    /// Keyed by absolute path: insertion is idempotent, iteration is
    /// deterministic with parents strictly before their children.
    pub entries: BTreeMap<PathBuf, PackEntry>,
    pub total_files: u64,
    pub total_size: u64,
}

/// Flatten the selection into the relative-path map.
///
/// The common parent of all inputs becomes the archive root. Selecting a
/// single path re-roots at its parent so the selection's own basename is
/// preserved as the top-level entry. Ancestor directories between the common
/// parent and a nested input are synthesized so the archive always contains
/// a coherent directory chain.
pub(crate) fn flatten_file_list(
    file_list: &[PathBuf],
    ignore: &IgnoreMatcher,
) -> Result<FlattenedList, ArchiverError> {
    let mut flattened = FlattenedList {
        entries: BTreeMap::new(),
        total_files: 0,
        total_size: 0,
    };
    if file_list.is_empty() {
        return Ok(flattened);
    }

    let cleaned: Vec<String> = file_list
        .iter()
        .map(|p| pathutil::clean(&p.to_string_lossy()))
        .collect();
    let mut common_parent = pathutil::common_parent_path(&cleaned);
    if cleaned.len() == 1 && common_parent == cleaned[0] {
        common_parent = pathutil::parent_directory(&common_parent);
    }
    tracing::debug!(common_parent = %common_parent, inputs = cleaned.len(), "flattening pack selection");

    for path_str in &cleaned {
        let path = PathBuf::from(path_str);
        let stat = fs::symlink_metadata(&path)?;
        if stat.is_dir() {
            for entry in WalkDir::new(&path).follow_links(false).sort_by_file_name() {
                let entry = entry?;
                let meta = entry.metadata()?;
                insert_entry(&mut flattened, entry.path(), &meta, &common_parent, ignore)?;
            }
        } else {
            insert_entry(&mut flattened, &path, &stat, &common_parent, ignore)?;
        }
        synthesize_ancestors(&mut flattened, &path, &common_parent, ignore)?;
    }
    tracing::debug!(
        entries = flattened.entries.len(),
        total_files = flattened.total_files,
        total_size = flattened.total_size,
        "pack selection flattened"
    );
    Ok(flattened)
}

fn insert_entry(
    flattened: &mut FlattenedList,
    absolute: &Path,
    meta: &fs::Metadata,
    common_parent: &str,
    ignore: &IgnoreMatcher,
) -> Result<(), ArchiverError> {
    let absolute_str = pathutil::clean(&absolute.to_string_lossy());
    let Some(relative) = absolute_str.strip_prefix(common_parent) else {
        return Ok(());
    };
    if relative.is_empty() {
        // The common parent itself carries no entry.
        return Ok(());
    }
    if ignore.is_match(relative) {
        tracing::debug!(path = relative, "pack entry dropped by ignore pattern");
        return Ok(());
    }
    let key = PathBuf::from(&absolute_str);
    if flattened.entries.contains_key(&key) {
        // Selecting the same path twice, directly or transitively, yields
        // exactly one entry.
        return Ok(());
    }

    let is_dir = meta.is_dir();
    let link_target = if meta.file_type().is_symlink() {
        Some(fs::read_link(absolute)?)
    } else {
        None
    };
    let size = if is_dir || link_target.is_some() {
        0
    } else {
        meta.len()
    };
    let mtime_secs = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    if !is_dir {
        flattened.total_files += 1;
        flattened.total_size += size;
    }
    flattened.entries.insert(
        key,
        PackEntry {
            absolute: PathBuf::from(&absolute_str),
            relative: relative.to_string(),
            is_dir,
            size,
            mode: fsx::unix_mode(meta),
            mtime_secs,
            link_target,
        },
    );
    Ok(())
}

/// Walk up from an explicit input toward the common parent, inserting any
/// directory that no other input's walk produced.
fn synthesize_ancestors(
    flattened: &mut FlattenedList,
    input: &Path,
    common_parent: &str,
    ignore: &IgnoreMatcher,
) -> Result<(), ArchiverError> {
    let mut current = input.parent();
    while let Some(dir) = current {
        let dir_str = pathutil::clean(&dir.to_string_lossy());
        let Some(relative) = dir_str.strip_prefix(common_parent) else {
            break;
        };
        if relative.is_empty() {
            break;
        }
        if !flattened.entries.contains_key(Path::new(&dir_str)) {
            let stat = fs::symlink_metadata(dir)?;
            insert_entry(flattened, dir, &stat, common_parent, ignore)?;
        }
        current = dir.parent();
    }
    Ok(())
}

/// The password a pack writer encrypts with: the per-call password wins over
/// the meta password material.
pub(crate) fn pack_password(meta: &ArchiveMeta, pack: &ArchivePack) -> Option<String> {
    pack.password
        .clone()
        .or_else(|| meta.password_candidates().into_iter().next())
}
