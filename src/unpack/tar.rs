//! Tar unpacking: sequential walk with eager materialization, optionally
//! through a codec decoder.

use std::fs::File;
use std::io::Read;

use crate::codec;
use crate::common::{ArchiveMeta, ArchiveUnpack};
use crate::error::ArchiverError;
use crate::format::Codec;
use crate::pathutil;
use crate::progress::Session;
use crate::unpack;

use super::{DestinationMap, EntryFilter, EntryPayload, UnpackEntry};

pub(crate) fn unpack_tar(
    meta: &ArchiveMeta,
    options: &ArchiveUnpack,
    wrapping: Option<Codec>,
    filter: &EntryFilter,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let file = File::open(&meta.filename)?;
    let reader: Box<dyn Read> = match wrapping {
        Some(codec) => codec::decoder(codec, file)?,
        None => Box::new(file),
    };
    let mut archive = tar::Archive::new(reader);

    let mut entries = DestinationMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let header = entry.header();
        let entry_type = header.entry_type();
        let raw_name = pathutil::to_slash(&entry.path()?.to_string_lossy());
        let is_dir = entry_type.is_dir();
        let archive_path = pathutil::fix_dir_slash(is_dir, &raw_name);
        if !filter.includes(&archive_path) {
            continue;
        }
        let mode = header.mode().unwrap_or(if is_dir { 0o755 } else { 0o644 });

        let payload = if is_dir {
            EntryPayload::Directory
        } else if entry_type.is_symlink() {
            let target = entry
                .link_name()?
                .map(|t| pathutil::to_slash(&t.to_string_lossy()))
                .unwrap_or_default();
            EntryPayload::Symlink(target)
        } else if entry_type.is_file() {
            let mut content = Vec::with_capacity(header.size().unwrap_or(0) as usize);
            entry.read_to_end(&mut content)?;
            EntryPayload::File(content)
        } else {
            tracing::warn!(entry = %raw_name, kind = ?entry_type, "skipping unsupported tar entry type");
            continue;
        };

        let Some(dest) = unpack::sanitize_destination(&options.destination, &raw_name) else {
            tracing::warn!(entry = %raw_name, "skipping tar entry with unsafe path");
            continue;
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
