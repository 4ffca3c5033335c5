//! Entry filtering: the compiled ignore matcher and the listing scope filter.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ArchiverError;
use crate::pathutil;

/// Always-applied denylist, on top of caller-supplied patterns.
pub const GLOBAL_IGNORES: &[&str] = &["pax_global_header", "__MACOSX/*", "*.DS_Store"];

/// Compiled ignore predicate over the global denylist plus caller patterns.
pub struct IgnoreMatcher {
    set: GlobSet,
}

impl IgnoreMatcher {
    pub fn new(patterns: &[String]) -> Result<Self, ArchiverError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in GLOBAL_IGNORES {
            builder.add(
                Glob::new(pattern)
                    .map_err(|e| ArchiverError::IgnorePattern(e.to_string()))?,
            );
        }
        for pattern in patterns {
            builder.add(
                Glob::new(pattern)
                    .map_err(|e| ArchiverError::IgnorePattern(e.to_string()))?,
            );
        }
        let set = builder
            .build()
            .map_err(|e| ArchiverError::IgnorePattern(e.to_string()))?;
        Ok(Self { set })
    }

    /// True when the path is excluded. Trailing directory separators do not
    /// affect matching.
    pub fn is_match(&self, path: &str) -> bool {
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        self.set.is_match(trimmed)
    }
}

/// Scope/recursion filter for listings, tracking whether the scope was ever
/// observed so a missing path can be told apart from an empty directory.
pub struct ScopeFilter {
    scope: String,
    recursive: bool,
    observed: bool,
}

impl ScopeFilter {
    pub fn new(list_directory_path: &str, recursive: bool) -> Self {
        // The scope is separator-terminated unless it addresses the root.
        let scope = if list_directory_path.is_empty() {
            String::new()
        } else {
            pathutil::fix_dir_slash(true, &pathutil::to_slash(list_directory_path))
        };
        Self {
            scope,
            recursive,
            observed: false,
        }
    }

    /// Record that a walked entry carries the scope as a prefix. Called for
    /// every raw entry, before any filtering.
    pub fn observe(&mut self, full_path: &str) {
        if full_path.starts_with(&self.scope) {
            self.observed = true;
        }
    }

    /// Whether the entry belongs to the requested listing.
    ///
    /// The scope directory itself is never listed. Non-recursive listings
    /// keep only direct children: files exactly at scope depth and
    /// directories one segment deeper.
    pub fn includes(&self, full_path: &str) -> bool {
        if !full_path.starts_with(&self.scope) || full_path == self.scope {
            return false;
        }
        if self.recursive {
            return true;
        }
        let rest = &full_path[self.scope.len()..];
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        !rest.contains('/')
    }

    /// Fail with `NoPathToFilter` when a non-empty scope was never observed
    /// during the walk.
    pub fn ensure_observed(&self) -> Result<(), ArchiverError> {
        if !self.scope.is_empty() && !self.observed {
            return Err(ArchiverError::NoPathToFilter(self.scope.clone()));
        }
        Ok(())
    }
}
