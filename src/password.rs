//! Password and encryption probing.
//!
//! Probing dispatches strictly by extension: only `.zip` and `.rar` carry an
//! encryption state; every other format reports "not encrypted" without an
//! error. The zip/rar asymmetry is deliberate and preserved: rar is probed
//! once with the first candidate password (re-opening a rar stream per
//! candidate is expensive), while zip retries every candidate during actual
//! extraction.

use std::fs::File;
use std::io;
use std::path::Path;

use serde::Serialize;
use unrar::Archive as RarArchive;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::common::ArchiveMeta;
use crate::error::ArchiverError;
use crate::pathutil;

/// Result of an encryption probe.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedArchiveInfo {
    pub is_encrypted: bool,
    pub is_valid_password: bool,
}

/// Result of the pre-listing/pre-unpacking password gate.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareArchiveInfo {
    pub is_password_required: bool,
    pub is_single_password_mode: bool,
    pub is_valid_password: bool,
}

/// Determine whether the archive is encrypted and whether the first password
/// candidate unlocks it.
pub fn is_archive_encrypted(meta: &ArchiveMeta) -> Result<EncryptedArchiveInfo, ArchiverError> {
    let candidates = meta.password_candidates();
    let first = candidates.first().map(String::as_str);
    match extension_of(meta).as_str() {
        "zip" => probe_zip(&meta.filename, first),
        "rar" => probe_rar(&meta.filename, first),
        _ => Ok(EncryptedArchiveInfo::default()),
    }
}

/// The rar-only gate run before listing and unpacking: whether any password
/// is required at all, and whether the first candidate is valid. Non-rar
/// formats always report "no password required".
pub fn prepare_archive(
    meta: &ArchiveMeta,
    passwords: &[String],
) -> Result<PrepareArchiveInfo, ArchiverError> {
    let is_single_password_mode = passwords.len() == 1;
    if extension_of(meta) != "rar" {
        return Ok(PrepareArchiveInfo {
            is_password_required: false,
            is_single_password_mode,
            is_valid_password: false,
        });
    }
    let probe = probe_rar(&meta.filename, passwords.first().map(String::as_str))?;
    Ok(PrepareArchiveInfo {
        is_password_required: probe.is_encrypted,
        is_single_password_mode,
        is_valid_password: probe.is_valid_password,
    })
}

fn extension_of(meta: &ArchiveMeta) -> String {
    let filename = meta
        .filename
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    pathutil::extension(&filename).to_ascii_lowercase()
}

/// Zip probe: the first encrypted entry decides. A successful full read with
/// the supplied password proves validity; AES rejects bad passwords at open,
/// ZipCrypto may only fail during the read.
fn probe_zip(path: &Path, password: Option<&str>) -> Result<EncryptedArchiveInfo, ArchiverError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let Some(index) = first_encrypted_index(&mut archive)? else {
        return Ok(EncryptedArchiveInfo::default());
    };
    let Some(password) = password else {
        return Ok(EncryptedArchiveInfo {
            is_encrypted: true,
            is_valid_password: false,
        });
    };
    let is_valid_password = decrypts_fully(&mut archive, index, password)?;
    Ok(EncryptedArchiveInfo {
        is_encrypted: true,
        is_valid_password,
    })
}

/// Index of the first entry that demands a password, if any.
pub(crate) fn first_encrypted_index(
    archive: &mut ZipArchive<File>,
) -> Result<Option<usize>, ArchiverError> {
    for index in 0..archive.len() {
        let encrypted = match archive.by_index(index) {
            Ok(_) => false,
            Err(ZipError::UnsupportedArchive(detail)) if detail == ZipError::PASSWORD_REQUIRED => {
                true
            }
            Err(err) => return Err(err.into()),
        };
        if encrypted {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn decrypts_fully(
    archive: &mut ZipArchive<File>,
    index: usize,
    password: &str,
) -> Result<bool, ArchiverError> {
    match archive.by_index_decrypt(index, password.as_bytes()) {
        Ok(mut entry) => Ok(io::copy(&mut entry, &mut io::sink()).is_ok()),
        Err(ZipError::InvalidPassword) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Resolve the password zip extraction will use: `None` when the archive has
/// no encrypted entry, the first candidate that fully decrypts otherwise.
/// Zero candidates or all-wrong candidates against an encrypted archive fail
/// with `InvalidPassword` before anything is extracted.
pub(crate) fn zip_working_password(
    archive: &mut ZipArchive<File>,
    candidates: &[String],
) -> Result<Option<String>, ArchiverError> {
    let Some(index) = first_encrypted_index(archive)? else {
        return Ok(None);
    };
    for candidate in candidates {
        if decrypts_fully(archive, index, candidate)? {
            return Ok(Some(candidate.clone()));
        }
    }
    Err(ArchiverError::InvalidPassword)
}

/// Rar probe, two-phase: open without a password to learn whether anything
/// is encrypted (header-encrypted archives refuse to open at all,
/// content-encrypted ones flag their entries), then re-open with the
/// supplied password and test the first entry to learn validity.
fn probe_rar(path: &Path, password: Option<&str>) -> Result<EncryptedArchiveInfo, ArchiverError> {
    let mut is_encrypted = false;
    match RarArchive::new(path).open_for_listing() {
        Ok(open) => {
            if open.has_encrypted_headers() {
                is_encrypted = true;
            } else {
                for header in open {
                    match header {
                        Ok(entry) => {
                            if entry.is_encrypted() {
                                is_encrypted = true;
                                break;
                            }
                        }
                        // A read failure on the no-password pass is the
                        // "incorrect password"-class signal.
                        Err(_) => {
                            is_encrypted = true;
                            break;
                        }
                    }
                }
            }
        }
        Err(err) if is_rar_password_error(&err) => is_encrypted = true,
        Err(err) => return Err(ArchiverError::Rar(err.to_string())),
    }

    if !is_encrypted {
        return Ok(EncryptedArchiveInfo::default());
    }
    let Some(password) = password else {
        return Ok(EncryptedArchiveInfo {
            is_encrypted: true,
            is_valid_password: false,
        });
    };
    Ok(EncryptedArchiveInfo {
        is_encrypted: true,
        is_valid_password: test_rar_password(path, password),
    })
}

/// CRC-verify the first entry with the given password.
pub(crate) fn test_rar_password(path: &Path, password: &str) -> bool {
    match RarArchive::with_password(path, password.as_bytes()).open_for_processing() {
        Ok(archive) => match archive.read_header() {
            Ok(Some(header)) => header.test().is_ok(),
            Ok(None) => true,
            Err(_) => false,
        },
        Err(_) => false,
    }
}

fn is_rar_password_error(err: &unrar::error::UnrarError) -> bool {
    let debug = format!("{err:?}");
    debug.contains("MissingPassword") || debug.to_ascii_lowercase().contains("password")
}
