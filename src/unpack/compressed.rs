//! Single-entry codec unpacking: decoder streamed straight to the
//! destination file, no intermediate buffer.

use std::fs::{self, File};

use crate::common::{ArchiveMeta, ArchiveUnpack};
use crate::error::ArchiverError;
use crate::format::Codec;
use crate::list::strip_codec_extension;
use crate::progress::{copy_with_session, Session};
use crate::{codec, unpack};

use super::EntryFilter;

pub(crate) fn unpack_compressed(
    meta: &ArchiveMeta,
    options: &ArchiveUnpack,
    wrapping: Codec,
    filter: &EntryFilter,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let filename = meta
        .filename
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let logical_name = strip_codec_extension(&filename, wrapping);

    if !filter.includes(&logical_name) {
        session.initialize_progress(0, 0);
        return Ok(());
    }
    let Some(dest) = unpack::sanitize_destination(&options.destination, &logical_name) else {
        session.initialize_progress(0, 0);
        return Ok(());
    };

    // The decompressed size is unknown up front; the compressed on-disk size
    // is the total, and completion forces the percentages to 100.
    let stat = fs::metadata(&meta.filename)?;
    session.initialize_progress(1, stat.len());
    session.enable_ctx_cancel();
    session.begin_file(&dest.to_string_lossy(), stat.len());

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::open(&meta.filename)?;
    let mut decoder = codec::decoder(wrapping, file)?;
    let mut out = File::create(&dest)?;
    copy_with_session(&mut *decoder, &mut out, session)?;
    session.end_file();
    Ok(())
}
