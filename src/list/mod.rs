//! Listing engine: one uniform entry stream over every format.
//!
//! Each format walker emits raw entries into a shared collector that applies
//! the scope filter, the ignore matcher and, at the end, the requested
//! ordering. The collector also tracks whether the scope was ever observed,
//! so a listing of a path that does not exist in the archive fails with
//! `NoPathToFilter` instead of silently returning nothing.

use std::fs::File;

use chrono::{DateTime, Utc};
use unrar::Archive as RarArchive;

use crate::common::{effective_passwords, ArchiveFileInfo, ArchiveMeta, ArchiveRead};
use crate::error::ArchiverError;
use crate::filter::{IgnoreMatcher, ScopeFilter};
use crate::format::{self, Codec, Container, FormatHandle};
use crate::pathutil::{self, sort};
use crate::{codec, fsx, password};

/// List the archive per the read options: password gating, scope filtering,
/// ignore filtering and ordering, identical across formats.
pub fn get_archive_file_list(
    meta: &ArchiveMeta,
    read: &ArchiveRead,
) -> Result<Vec<ArchiveFileInfo>, ArchiverError> {
    // Copied so the caller can reuse its originals concurrently.
    let meta = meta.clone();
    let read = read.clone();

    let passwords = effective_passwords(&read.passwords, &meta);
    let prepared = password::prepare_archive(&meta, &passwords)?;
    if prepared.is_password_required {
        if passwords.is_empty() {
            return Err(ArchiverError::PasswordRequired);
        }
        if !prepared.is_valid_password {
            return Err(ArchiverError::InvalidPassword);
        }
    }

    let handle = format::resolve(&meta)?;
    let ignore = IgnoreMatcher::new(&meta.gitignore_patterns)?;
    let mut collector = Collector::new(&read, ignore);

    match &handle {
        FormatHandle::Zip(_) => list_zip(&meta, &mut collector)?,
        FormatHandle::Common(handle) => match handle.container {
            Container::Tar(codec) => list_tar(&meta, codec, &mut collector)?,
            Container::Rar => list_rar(&meta, &passwords, &mut collector)?,
        },
        FormatHandle::Compressed(handle) => list_compressed(&meta, handle.codec, &mut collector)?,
    }

    collector.scope.ensure_observed()?;
    Ok(sort::sort_entries(
        collector.entries,
        read.order_by,
        read.order_dir,
    ))
}

struct Collector {
    scope: ScopeFilter,
    ignore: IgnoreMatcher,
    entries: Vec<ArchiveFileInfo>,
}

impl Collector {
    fn new(read: &ArchiveRead, ignore: IgnoreMatcher) -> Self {
        Self {
            scope: ScopeFilter::new(&read.list_directory_path, read.recursive),
            ignore,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, info: ArchiveFileInfo) {
        self.scope.observe(&info.full_path);
        if !self.scope.includes(&info.full_path) {
            return;
        }
        if self.ignore.is_match(&info.full_path) {
            tracing::debug!(path = %info.full_path, "entry dropped by ignore pattern");
            return;
        }
        self.entries.push(info);
    }
}

/// Zip listing uses raw (non-decrypting) entry access: metadata of encrypted
/// entries is readable without a password.
fn list_zip(meta: &ArchiveMeta, collector: &mut Collector) -> Result<(), ArchiverError> {
    let file = File::open(&meta.filename)?;
    let mut archive = zip::ZipArchive::new(file)?;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let is_dir = entry.is_dir();
        let mode = entry
            .unix_mode()
            .unwrap_or(if is_dir { 0o755 } else { 0o644 });
        let mod_time = entry
            .last_modified()
            .and_then(zip_datetime_to_chrono)
            .unwrap_or_else(Utc::now);
        let name = entry.name().to_string();
        collector.push(ArchiveFileInfo::new(
            &name,
            is_dir,
            entry.size(),
            mode,
            mod_time,
        ));
    }
    Ok(())
}

fn list_tar(
    meta: &ArchiveMeta,
    wrapping: Option<Codec>,
    collector: &mut Collector,
) -> Result<(), ArchiverError> {
    let file = File::open(&meta.filename)?;
    let reader: Box<dyn std::io::Read> = match wrapping {
        Some(codec) => codec::decoder(codec, file)?,
        None => Box::new(file),
    };
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let path = entry.path()?.to_string_lossy().to_string();
        let is_dir = header.entry_type().is_dir();
        let mode = header.mode().unwrap_or(if is_dir { 0o755 } else { 0o644 });
        let mod_time = header
            .mtime()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
            .unwrap_or_else(Utc::now);
        collector.push(ArchiveFileInfo::new(
            &path,
            is_dir,
            header.size().unwrap_or(0),
            mode,
            mod_time,
        ));
    }
    Ok(())
}

fn list_rar(
    meta: &ArchiveMeta,
    passwords: &[String],
    collector: &mut Collector,
) -> Result<(), ArchiverError> {
    let archive = match passwords.first() {
        Some(password) => RarArchive::with_password(meta.filename.as_path(), password.as_bytes()),
        None => RarArchive::new(meta.filename.as_path()),
    };
    let open = archive
        .open_for_listing()
        .map_err(|err| ArchiverError::ArchiverList(err.to_string()))?;
    for header in open {
        let header = header.map_err(|err| ArchiverError::Rar(err.to_string()))?;
        let path = pathutil::to_slash(&header.filename.to_string_lossy());
        let is_dir = header.is_directory();
        collector.push(ArchiveFileInfo::new(
            &path,
            is_dir,
            header.unpacked_size,
            if is_dir { 0o755 } else { 0o644 },
            Utc::now(),
        ));
    }
    Ok(())
}

/// A compressed file holds exactly one logical entry and no header worth
/// trusting across codecs, so the entry is synthesized from the archive file
/// itself: its name minus the codec extension, its on-disk size and mtime.
fn list_compressed(
    meta: &ArchiveMeta,
    codec: Codec,
    collector: &mut Collector,
) -> Result<(), ArchiverError> {
    let stat = std::fs::metadata(&meta.filename)?;
    let filename = meta
        .filename
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = strip_codec_extension(&filename, codec);
    let mod_time = stat
        .modified()
        .ok()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(Utc::now);
    collector.push(ArchiveFileInfo::new(
        &name,
        false,
        stat.len(),
        fsx::unix_mode(&stat),
        mod_time,
    ));
    Ok(())
}

fn zip_datetime_to_chrono(value: zip::DateTime) -> Option<DateTime<Utc>> {
    let date = chrono::NaiveDate::from_ymd_opt(
        value.year().into(),
        value.month().into(),
        value.day().into(),
    )?;
    let time = chrono::NaiveTime::from_hms_opt(
        value.hour().into(),
        value.minute().into(),
        value.second().into(),
    )?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(
        chrono::NaiveDateTime::new(date, time),
        Utc,
    ))
}

/// `notes.txt.gz` becomes `notes.txt`; a bare `.gz` keeps the full filename.
pub(crate) fn strip_codec_extension(filename: &str, codec: Codec) -> String {
    let suffix = format!(".{}", codec.extension());
    match filename.strip_suffix(&suffix) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => filename.to_string(),
    }
}
