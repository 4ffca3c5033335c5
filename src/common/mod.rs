//! Shared data model: archive identity, per-operation options and the
//! uniform file-entry record every engine produces or consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::pathutil;

/// How zip entries are encrypted when a password is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionMethod {
    /// AES-256, the modern scheme.
    #[default]
    Aes256,
    /// The legacy ZipCrypto scheme, for readers that cannot open AES archives.
    ZipCrypto,
}

/// Identity of one archive: filename, password material and ignore patterns.
///
/// Cloned, never shared, into each operation so concurrent operations on the
/// same filename cannot alias each other's state.
#[derive(Debug, Clone, Default)]
pub struct ArchiveMeta {
    pub filename: PathBuf,
    /// Legacy single password. Superseded by `passwords` when that is non-empty.
    pub password: Option<String>,
    pub passwords: Vec<String>,
    /// Gitignore-style patterns excluded from listing, packing and unpacking,
    /// on top of the built-in global denylist.
    pub gitignore_patterns: Vec<String>,
    pub encryption_method: EncryptionMethod,
}

impl ArchiveMeta {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// The effective password candidate list: the list when non-empty,
    /// otherwise the legacy single password, otherwise nothing.
    pub fn password_candidates(&self) -> Vec<String> {
        if !self.passwords.is_empty() {
            self.passwords.clone()
        } else if let Some(password) = &self.password {
            vec![password.clone()]
        } else {
            Vec::new()
        }
    }
}

/// One logical archive entry in the uniform shape shared by every format.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveFileInfo {
    /// Unix mode bits, file type included where the source format carries it.
    pub mode: u32,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    /// Base name of the entry.
    pub name: String,
    /// Slash-normalized full path; directories always end in `/`, files never.
    pub full_path: String,
    /// Separator-suffixed prefix of `full_path`, empty at the archive root.
    pub parent_path: String,
    /// Extension of `name`, compound-aware (`tar.gz`).
    pub extension: String,
}

impl ArchiveFileInfo {
    pub fn new(raw_path: &str, is_dir: bool, size: u64, mode: u32, mod_time: DateTime<Utc>) -> Self {
        let full_path = pathutil::fix_dir_slash(is_dir, &pathutil::to_slash(raw_path));
        let parent_path = pathutil::parent_directory(&full_path);
        let name = pathutil::base_name(&full_path).to_string();
        let extension = if is_dir {
            String::new()
        } else {
            pathutil::extension(&name)
        };
        Self {
            mode,
            size,
            is_dir,
            mod_time,
            name,
            full_path,
            parent_path,
            extension,
        }
    }

    /// Coarse kind used by `OrderBy::Kind`: directories sort as folders,
    /// files by extension.
    pub fn kind(&self) -> &str {
        if self.is_dir {
            "folder"
        } else if self.extension.is_empty() {
            "file"
        } else {
            &self.extension
        }
    }
}

/// Listing order key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    Name,
    Size,
    ModTime,
    #[default]
    FullPath,
    Kind,
}

/// Listing order direction. `None` keeps the walk order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
    None,
}

/// Per-call listing options. Created fresh per call; never shared.
#[derive(Debug, Clone, Default)]
pub struct ArchiveRead {
    /// Scope path restricting the listing to a subtree; empty lists the root.
    pub list_directory_path: String,
    pub recursive: bool,
    pub order_by: OrderBy,
    pub order_dir: OrderDir,
    /// Overrides the meta password candidates when non-empty.
    pub passwords: Vec<String>,
}

/// Per-call packing options.
#[derive(Debug, Clone)]
pub struct ArchivePack {
    /// Absolute source paths; files and directories may be mixed, nested and
    /// duplicated.
    pub file_list: Vec<PathBuf>,
    /// Overrides the meta password when set.
    pub password: Option<String>,
    pub zip_encryption_method: EncryptionMethod,
    /// Minimum interval between intermediate progress emissions.
    pub progress_debounce: Duration,
}

impl Default for ArchivePack {
    fn default() -> Self {
        Self {
            file_list: Vec::new(),
            password: None,
            zip_encryption_method: EncryptionMethod::default(),
            progress_debounce: DEFAULT_PROGRESS_DEBOUNCE,
        }
    }
}

/// Per-call unpacking options.
#[derive(Debug, Clone)]
pub struct ArchiveUnpack {
    /// Archive-relative allow filter; empty unpacks everything.
    pub file_list: Vec<String>,
    pub destination: PathBuf,
    /// Overrides the meta password candidates when non-empty.
    pub passwords: Vec<String>,
    pub progress_debounce: Duration,
}

impl Default for ArchiveUnpack {
    fn default() -> Self {
        Self {
            file_list: Vec::new(),
            destination: PathBuf::new(),
            passwords: Vec::new(),
            progress_debounce: DEFAULT_PROGRESS_DEBOUNCE,
        }
    }
}

/// Default progress emission debounce.
pub const DEFAULT_PROGRESS_DEBOUNCE: Duration = Duration::from_millis(100);

/// Per-call password overrides win over the meta candidates.
pub(crate) fn effective_passwords(overrides: &[String], meta: &ArchiveMeta) -> Vec<String> {
    if !overrides.is_empty() {
        overrides.to_vec()
    } else {
        meta.password_candidates()
    }
}
