//! Path and naming utilities shared by every engine.
//!
//! All functions operate on `/`-normalized strings, the canonical in-archive
//! path form. Nothing in here touches the filesystem.

pub mod sort;

/// Second-level extensions that combine with a trailing codec extension,
/// so that `x.tar.gz` reports `tar.gz` while `x.abc.gz` reports `gz`.
/// Immutable after startup.
static ALLOWED_SECOND_EXTENSIONS: &[&str] = &["tar"];

/// The in-archive path separator.
pub const PATH_SEPARATOR: char = '/';

/// Normalize backslashes to the archive separator.
pub fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Return the extension of `filename`, recognizing compound second-level
/// extensions: `abc.tar.gz` yields `tar.gz`, `abc.xyz.gz` yields `gz`.
/// A filename without a dot yields the empty string; a leading-dot filename
/// (`.gz`) yields the part after the dot.
pub fn extension(filename: &str) -> String {
    if !filename.contains('.') {
        return String::new();
    }
    let segments: Vec<&str> = filename.split('.').collect();
    if segments.len() >= 3 {
        let second = segments[segments.len() - 2];
        if ALLOWED_SECOND_EXTENSIONS.contains(&second) {
            return format!("{}.{}", second, segments[segments.len() - 1]);
        }
    }
    segments[segments.len() - 1].to_string()
}

/// Return the parent directory of `full_path`, separator-suffixed.
///
/// Edge cases: `""` and `"."` yield `""`; `"/"` yields `"/"`;
/// `/1234` yields `/`; `/1234/abc` yields `/1234/`; a bare name yields `""`.
pub fn parent_directory(full_path: &str) -> String {
    if full_path.is_empty() || full_path == "." {
        return String::new();
    }
    if full_path == "/" {
        return "/".to_string();
    }
    let trimmed = full_path.strip_suffix('/').unwrap_or(full_path);
    match trimmed.rfind('/') {
        Some(idx) => trimmed[..=idx].to_string(),
        None => String::new(),
    }
}

/// Append the separator if `is_dir` and not already present. Idempotent.
pub fn fix_dir_slash(is_dir: bool, path: &str) -> String {
    if is_dir && !path.ends_with('/') {
        format!("{path}/")
    } else {
        path.to_string()
    }
}

/// The last path segment, ignoring a trailing separator.
pub fn base_name(full_path: &str) -> &str {
    let trimmed = full_path.strip_suffix('/').unwrap_or(full_path);
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Lexically clean a path: collapse repeated separators, drop `.` segments
/// and any trailing separator. Does not resolve `..` against the filesystem.
pub fn clean(path: &str) -> String {
    let slashed = to_slash(path);
    let absolute = slashed.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&last) if last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// The longest common directory ancestor of a path set, byte-wise over the
/// cleaned, separator-terminated paths. Empty input yields `""`; a single
/// path yields that path cleaned.
pub fn common_parent_path(paths: &[String]) -> String {
    if paths.is_empty() {
        return String::new();
    }
    let cleaned: Vec<String> = paths.iter().map(|p| clean(p)).collect();
    if cleaned.len() == 1 {
        return cleaned[0].clone();
    }

    let terminated: Vec<String> = cleaned
        .iter()
        .map(|p| {
            if p.ends_with('/') {
                p.clone()
            } else {
                format!("{p}/")
            }
        })
        .collect();

    let mut prefix = terminated[0].clone();
    for path in &terminated[1..] {
        let common = prefix
            .bytes()
            .zip(path.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(common);
    }

    match prefix.rfind('/') {
        Some(idx) => prefix[..=idx].to_string(),
        None => String::new(),
    }
}
