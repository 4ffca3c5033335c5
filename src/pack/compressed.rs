//! Single-entry codec packing: exactly one source file, streamed through the
//! codec encoder.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use crate::codec::Encoder;
use crate::common::{ArchiveMeta, ArchivePack};
use crate::error::ArchiverError;
use crate::filter::IgnoreMatcher;
use crate::format::Codec;
use crate::progress::{copy_with_session, Session};

pub(crate) fn pack_compressed(
    meta: &ArchiveMeta,
    pack: &ArchivePack,
    codec: Codec,
    ignore: &IgnoreMatcher,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    if pack.file_list.len() > 1 {
        return Err(ArchiverError::CompressedFileInvalidSize);
    }
    let Some(source) = pack.file_list.first() else {
        return Err(ArchiverError::CompressedFileNoFileFound);
    };
    let stat = fs::symlink_metadata(source)?;
    if stat.is_dir() {
        return Err(ArchiverError::CompressedFileOnlyFileAllowed);
    }
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if ignore.is_match(&name) {
        // An all-ignored selection reports the same as an empty one.
        return Err(ArchiverError::CompressedFileNoFileFound);
    }

    session.initialize_progress(1, stat.len());
    session.enable_ctx_cancel();
    session.begin_file(&source.to_string_lossy(), stat.len());

    let mut encoder = Encoder::new(codec, BufWriter::new(File::create(&meta.filename)?))?;
    let mut reader = File::open(source)?;
    copy_with_session(&mut reader, &mut encoder, session)?;
    encoder.finish()?.flush()?;
    session.end_file();
    Ok(())
}
