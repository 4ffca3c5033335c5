//! Zip packing: random-access writer with per-entry encryption.

use std::fs::File;

use zip::unstable::write::FileOptionsExt;
use zip::write::{FileOptions, SimpleFileOptions};
use zip::{AesMode, CompressionMethod, ZipWriter};

use crate::common::{ArchiveMeta, ArchivePack, EncryptionMethod};
use crate::error::ArchiverError;
use crate::filter::IgnoreMatcher;
use crate::progress::{copy_with_session, Session};

use super::{flatten_file_list, pack_password, PackEntry};

const DEFLATE_LEVEL: i64 = 9;
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

pub(crate) fn pack_zip(
    meta: &ArchiveMeta,
    pack: &ArchivePack,
    ignore: &IgnoreMatcher,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let flattened = flatten_file_list(&pack.file_list, ignore)?;
    let password = pack_password(meta, pack);
    let method = pack.zip_encryption_method;

    let file = File::create(&meta.filename)?;
    let mut writer = ZipWriter::new(file);

    session.initialize_progress(flattened.total_files, flattened.total_size);
    session.enable_ctx_cancel();

    for entry in flattened.entries.values() {
        session.check_cancel()?;
        let options = entry_options(entry, password.as_deref(), method);
        let source = entry.absolute.to_string_lossy().to_string();

        if entry.is_dir {
            session.begin_file(&source, 0);
            writer.add_directory(entry.relative.as_str(), options)?;
        } else if let Some(target) = &entry.link_target {
            // Symlinks carry their target string as the payload, never the
            // pointed-to bytes; detection is by mode bits on the reader side.
            session.begin_file(&source, 0);
            writer.add_symlink(
                entry.relative.as_str(),
                target.to_string_lossy().as_ref(),
                options,
            )?;
            session.end_file();
        } else {
            session.begin_file(&source, entry.size);
            writer.start_file(entry.relative.as_str(), options)?;
            let mut reader = File::open(&entry.absolute)?;
            copy_with_session(&mut reader, &mut writer, session)?;
            session.end_file();
        }
    }

    writer.finish()?;
    Ok(())
}

fn entry_options<'a>(
    entry: &PackEntry,
    password: Option<&'a str>,
    method: EncryptionMethod,
) -> FileOptions<'a, ()> {
    // Symlink entries keep their file-type bits so readers can tell the
    // target payload apart from regular file bytes.
    let permissions = if entry.link_target.is_some() {
        crate::fsx::SYMLINK_MODE
    } else {
        entry.mode & 0o777
    };
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(DEFLATE_LEVEL))
        .unix_permissions(permissions);
    if entry.size > ZIP64_THRESHOLD {
        options = options.large_file(true);
    }
    if let Some(password) = password {
        options = match method {
            EncryptionMethod::Aes256 => options.with_aes_encryption(AesMode::Aes256, password),
            EncryptionMethod::ZipCrypto => options.with_deprecated_encryption(password.as_bytes()),
        };
    }
    options
}
