//! Hierarchical full-path ordering for archive listings.
//!
//! A naive string sort interleaves a directory's files with its
//! subdirectories (`"A/B/" < "A/file1.txt"`), which is not how a file tree
//! reads. The sort here groups entries by parent and keeps every directory
//! ahead of its own subtree, in both directions.

use std::cmp::Ordering;

use crate::common::{ArchiveFileInfo, OrderBy, OrderDir};

/// Sort-only projection of one entry: the pre-split `[group key, basename]`
/// pair, computed once so comparisons never re-split paths.
struct SortEntry {
    group: String,
    base: String,
    info: ArchiveFileInfo,
}

impl SortEntry {
    fn new(info: ArchiveFileInfo) -> Self {
        // A directory groups under its own full path with an empty basename,
        // so it becomes the boundary marker of its subtree. Files group under
        // their parent.
        let (group, base) = if info.is_dir {
            (info.full_path.clone(), String::new())
        } else {
            (info.parent_path.clone(), info.name.clone())
        };
        Self { group, base, info }
    }
}

/// Directional group-key comparison. A key that is a directory prefix of the
/// other always sorts first, in both directions, so parents precede their
/// descendants no matter the direction; sibling order follows the requested
/// direction.
fn compare_groups(a: &str, b: &str, descending: bool) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if b.starts_with(a) {
        Ordering::Less
    } else if a.starts_with(b) {
        Ordering::Greater
    } else if descending {
        b.cmp(a)
    } else {
        a.cmp(b)
    }
}

fn compare_direction(a: &str, b: &str, descending: bool) -> Ordering {
    if descending {
        b.cmp(a)
    } else {
        a.cmp(b)
    }
}

/// Stable two-phase hierarchical sort by full path.
///
/// Phase 1 orders by group key; phase 2 re-sorts every contiguous run that
/// shares a group key by basename. Entries with identical group and basename
/// keep their relative input order, which matters when duplicate logical
/// paths exist before deduplication.
pub fn sort_full_path(list: Vec<ArchiveFileInfo>, order_dir: OrderDir) -> Vec<ArchiveFileInfo> {
    let descending = order_dir == OrderDir::Desc;
    let mut entries: Vec<SortEntry> = list.into_iter().map(SortEntry::new).collect();

    entries.sort_by(|a, b| compare_groups(&a.group, &b.group, descending));

    let mut start = 0;
    while start < entries.len() {
        let mut end = start + 1;
        while end < entries.len() && entries[end].group == entries[start].group {
            end += 1;
        }
        entries[start..end].sort_by(|a, b| compare_direction(&a.base, &b.base, descending));
        start = end;
    }

    entries.into_iter().map(|e| e.info).collect()
}

/// Order a listing per the requested key and direction. `OrderDir::None`
/// returns the walk order untouched.
pub fn sort_entries(
    list: Vec<ArchiveFileInfo>,
    order_by: OrderBy,
    order_dir: OrderDir,
) -> Vec<ArchiveFileInfo> {
    if order_dir == OrderDir::None {
        return list;
    }
    match order_by {
        OrderBy::FullPath => sort_full_path(list, order_dir),
        OrderBy::Name => sort_by_key(list, order_dir, |a, b| a.name.cmp(&b.name)),
        OrderBy::Size => sort_by_key(list, order_dir, |a, b| a.size.cmp(&b.size)),
        OrderBy::ModTime => sort_by_key(list, order_dir, |a, b| a.mod_time.cmp(&b.mod_time)),
        OrderBy::Kind => sort_by_key(list, order_dir, |a, b| a.kind().cmp(b.kind())),
    }
}

fn sort_by_key<F>(mut list: Vec<ArchiveFileInfo>, order_dir: OrderDir, cmp: F) -> Vec<ArchiveFileInfo>
where
    F: Fn(&ArchiveFileInfo, &ArchiveFileInfo) -> Ordering,
{
    list.sort_by(|a, b| {
        if order_dir == OrderDir::Desc {
            cmp(b, a)
        } else {
            cmp(a, b)
        }
    });
    list
}
