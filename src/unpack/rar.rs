//! Rar unpacking (read-only format): a listing pass for the progress totals,
//! then a processing pass that extracts matched entries in place.

use std::fs;

use unrar::Archive as RarArchive;

use crate::common::{ArchiveMeta, ArchiveUnpack};
use crate::error::ArchiverError;
use crate::pathutil;
use crate::progress::Session;
use crate::unpack;

use super::EntryFilter;

pub(crate) fn unpack_rar(
    meta: &ArchiveMeta,
    options: &ArchiveUnpack,
    passwords: &[String],
    filter: &EntryFilter,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    // The password was already validated by the prepare gate; rar only ever
    // probes the first candidate.
    let password = passwords.first().map(String::as_str);

    let (total_files, total_size) = enumerate(meta, password, filter)?;
    session.initialize_progress(total_files, total_size);
    session.enable_ctx_cancel();

    let opened = match password {
        Some(password) => RarArchive::with_password(meta.filename.as_path(), password.as_bytes()),
        None => RarArchive::new(meta.filename.as_path()),
    };
    let archive = opened
        .open_for_processing()
        .map_err(|err| ArchiverError::ArchiverList(err.to_string()))?;
    let mut cursor = Some(archive);
    while let Some(archive) = cursor.take() {
        match archive.read_header() {
            Ok(Some(header)) => {
                let entry = header.entry();
                let raw_name = pathutil::to_slash(&entry.filename.to_string_lossy());
                let is_dir = entry.is_directory();
                let archive_path = pathutil::fix_dir_slash(is_dir, &raw_name);
                let size = entry.unpacked_size;

                if !filter.includes(&archive_path)
                    || unpack::sanitize_destination(&options.destination, &raw_name).is_none()
                {
                    cursor = Some(header.skip().map_err(|e| ArchiverError::Rar(e.to_string()))?);
                    continue;
                }
                session.check_cancel()?;

                let dest = options.destination.join(&raw_name);
                if is_dir {
                    session.begin_file(&dest.to_string_lossy(), 0);
                    fs::create_dir_all(&dest)?;
                    cursor = Some(header.skip().map_err(|e| ArchiverError::Rar(e.to_string()))?);
                } else {
                    session.begin_file(&dest.to_string_lossy(), size);
                    cursor = Some(
                        header
                            .extract_with_base(&options.destination)
                            .map_err(|e| ArchiverError::Rar(e.to_string()))?,
                    );
                    session.advance_bytes(size);
                    session.end_file();
                }
            }
            Ok(None) => break,
            Err(err) => return Err(ArchiverError::Rar(err.to_string())),
        }
    }
    Ok(())
}

fn enumerate(
    meta: &ArchiveMeta,
    password: Option<&str>,
    filter: &EntryFilter,
) -> Result<(u64, u64), ArchiverError> {
    let opened = match password {
        Some(password) => RarArchive::with_password(meta.filename.as_path(), password.as_bytes()),
        None => RarArchive::new(meta.filename.as_path()),
    };
    let open = opened
        .open_for_listing()
        .map_err(|err| ArchiverError::ArchiverList(err.to_string()))?;
    let mut total_files = 0u64;
    let mut total_size = 0u64;
    for header in open {
        let header = header.map_err(|err| ArchiverError::Rar(err.to_string()))?;
        let raw_name = pathutil::to_slash(&header.filename.to_string_lossy());
        let is_dir = header.is_directory();
        let archive_path = pathutil::fix_dir_slash(is_dir, &raw_name);
        if !filter.includes(&archive_path) || is_dir {
            continue;
        }
        total_files += 1;
        total_size += header.unpacked_size;
    }
    Ok((total_files, total_size))
}
