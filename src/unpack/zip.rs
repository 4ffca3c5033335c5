//! Zip unpacking: eager per-entry materialization with multi-candidate
//! password retry.

use std::fs::File;
use std::io::Read;

use zip::ZipArchive;

use crate::common::{ArchiveMeta, ArchiveUnpack};
use crate::error::ArchiverError;
use crate::password::zip_working_password;
use crate::pathutil;
use crate::progress::Session;
use crate::{fsx, unpack};

use super::{DestinationMap, EntryFilter, EntryPayload, UnpackEntry};

pub(crate) fn unpack_zip(
    meta: &ArchiveMeta,
    options: &ArchiveUnpack,
    passwords: &[String],
    filter: &EntryFilter,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let file = File::open(&meta.filename)?;
    let mut archive = ZipArchive::new(file)?;

    // Password validation happens eagerly, before anything is extracted:
    // every candidate is tried against the first encrypted entry.
    let working = zip_working_password(&mut archive, passwords)?;

    let mut entries = DestinationMap::new();
    for index in 0..archive.len() {
        let mut entry = match &working {
            Some(password) => archive.by_index_decrypt(index, password.as_bytes())?,
            None => archive.by_index(index)?,
        };
        let raw_name = pathutil::to_slash(entry.name());
        let is_dir = entry.is_dir();
        let archive_path = pathutil::fix_dir_slash(is_dir, &raw_name);
        if !filter.includes(&archive_path) {
            continue;
        }
        let Some(dest) = unpack::sanitize_destination(&options.destination, &raw_name) else {
            tracing::warn!(entry = %raw_name, "skipping zip entry with unsafe path");
            continue;
        };

        let mode = entry
            .unix_mode()
            .unwrap_or(if is_dir { 0o755 } else { 0o644 });
        let payload = if is_dir {
            EntryPayload::Directory
        } else if fsx::is_symlink_mode(mode) {
            // The payload of a symlink entry is its target string.
            let mut target = String::new();
            entry.read_to_string(&mut target)?;
            EntryPayload::Symlink(target)
        } else {
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            EntryPayload::File(content)
        };
        let size = match &payload {
            EntryPayload::File(content) => content.len() as u64,
            _ => 0,
        };
        entries.insert(
            dest,
            UnpackEntry {
                archive_path,
                mode,
                size,
                payload,
            },
        );
    }

    unpack::write_entries(&entries, session)
}
