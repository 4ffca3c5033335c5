//! Tar packing: sequential writer, optionally wrapped in a codec stream.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use tar::{Builder, EntryType, Header};

use crate::codec::Encoder;
use crate::common::{ArchiveMeta, ArchivePack};
use crate::error::ArchiverError;
use crate::filter::IgnoreMatcher;
use crate::format::Codec;
use crate::progress::{CancelableReader, Session};

use super::{flatten_file_list, FlattenedList};

pub(crate) fn pack_tar(
    meta: &ArchiveMeta,
    pack: &ArchivePack,
    wrapping: Option<Codec>,
    ignore: &IgnoreMatcher,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    let flattened = flatten_file_list(&pack.file_list, ignore)?;
    session.initialize_progress(flattened.total_files, flattened.total_size);
    session.enable_ctx_cancel();

    let file = BufWriter::new(File::create(&meta.filename)?);
    match wrapping {
        None => {
            let mut builder = Builder::new(file);
            write_entries(&mut builder, &flattened, session)?;
            let mut inner = builder.into_inner()?;
            inner.flush()?;
        }
        Some(codec) => {
            let encoder = Encoder::new(codec, file)?;
            let mut builder = Builder::new(encoder);
            write_entries(&mut builder, &flattened, session)?;
            let encoder = builder.into_inner()?;
            let mut inner = encoder.finish()?;
            inner.flush()?;
        }
    }
    Ok(())
}

fn write_entries<W: Write>(
    builder: &mut Builder<W>,
    flattened: &FlattenedList,
    session: &mut Session,
) -> Result<(), ArchiverError> {
    for entry in flattened.entries.values() {
        session.check_cancel()?;
        let source = entry.absolute.to_string_lossy().to_string();

        let mut header = Header::new_gnu();
        header.set_mode(entry.mode & 0o7777);
        header.set_mtime(entry.mtime_secs);

        if entry.is_dir {
            session.begin_file(&source, 0);
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, format!("{}/", entry.relative), io::empty())?;
        } else if let Some(target) = &entry.link_target {
            session.begin_file(&source, 0);
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, &entry.relative, target)?;
            session.end_file();
        } else {
            session.begin_file(&source, entry.size);
            header.set_entry_type(EntryType::Regular);
            header.set_size(entry.size);
            // The builder drives the copy, so the reader wrapper carries the
            // cancellation check into the byte stream.
            let reader = CancelableReader::new(File::open(&entry.absolute)?, session.cancel_token());
            match builder.append_data(&mut header, &entry.relative, reader) {
                Ok(()) => {}
                Err(err) => {
                    // A failed copy under a pending cancel request reports as
                    // cancellation, not as an I/O failure.
                    session.check_cancel()?;
                    return Err(err.into());
                }
            }
            session.advance_bytes(entry.size);
            session.end_file();
        }
    }
    Ok(())
}
