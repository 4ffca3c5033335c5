use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::{thread_rng, Rng};
use tempfile::tempdir;
use unipack::{
    get_archive_file_list, start_packing, start_unpacking, ArchiveMeta, ArchivePack, ArchiveRead,
    ArchiveUnpack, ArchiverError, Session,
};

fn session() -> Session {
    Session::new(Duration::ZERO)
}

fn create_source_tree(base: &Path) -> PathBuf {
    let root = base.join("source");
    fs::create_dir_all(root.join("nested/deep")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();

    let mut rng = thread_rng();
    let mut blob = vec![0u8; 64 * 1024];
    rng.fill(&mut blob[..]);

    File::create(root.join("readme.md"))
        .unwrap()
        .write_all(b"hello unipack")
        .unwrap();
    File::create(root.join("nested/data.bin"))
        .unwrap()
        .write_all(&blob)
        .unwrap();
    File::create(root.join("nested/deep/leaf.txt"))
        .unwrap()
        .write_all(b"leaf")
        .unwrap();
    root
}

/// Relative path -> file content for every regular file under `root`.
fn snapshot_files(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in walk(root) {
        let meta = fs::symlink_metadata(&entry).unwrap();
        if meta.is_file() {
            let rel = entry
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(rel, fs::read(&entry).unwrap());
        }
    }
    files
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if fs::symlink_metadata(&path).unwrap().is_dir() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    out
}

fn roundtrip(archive_name: &str) {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());
    let original = snapshot_files(&root);

    let meta = ArchiveMeta::new(dir.path().join(archive_name));
    let pack = ArchivePack {
        file_list: vec![root.clone()],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("out");
    let unpack = ArchiveUnpack {
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&meta, &unpack, &mut session()).unwrap();

    // The selection was a single directory, so its basename roots the archive.
    let restored = snapshot_files(&out.join("source"));
    assert_eq!(restored, original, "{archive_name}");
}

#[test]
fn roundtrip_zip() {
    roundtrip("archive.zip");
}

#[test]
fn roundtrip_tar() {
    roundtrip("archive.tar");
}

#[test]
fn roundtrip_tar_gz() {
    roundtrip("archive.tar.gz");
}

#[test]
fn roundtrip_tar_bz2() {
    roundtrip("archive.tar.bz2");
}

#[test]
fn roundtrip_tar_br() {
    roundtrip("archive.tar.br");
}

#[test]
fn roundtrip_tar_lz4() {
    roundtrip("archive.tar.lz4");
}

#[test]
fn roundtrip_tar_sz() {
    roundtrip("archive.tar.sz");
}

#[test]
fn roundtrip_tar_xz() {
    roundtrip("archive.tar.xz");
}

#[test]
fn roundtrip_tar_zst() {
    roundtrip("archive.tar.zst");
}

#[test]
fn duplicate_and_overlapping_selections_produce_unique_entries() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());

    let meta = ArchiveMeta::new(dir.path().join("dedup.tar"));
    let pack = ArchivePack {
        file_list: vec![
            root.clone(),
            root.clone(),
            root.clone(),
            root.join("nested"),
            root.join("nested/data.bin"),
        ],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let read = ArchiveRead {
        recursive: true,
        ..ArchiveRead::default()
    };
    let listed = get_archive_file_list(&meta, &read).unwrap();
    let mut paths: Vec<String> = listed.into_iter().map(|e| e.full_path).collect();
    let before = paths.len();
    paths.dedup();
    assert_eq!(paths.len(), before, "no duplicate archive entries");
    assert!(paths.contains(&"nested/data.bin".to_string()));
}

#[test]
fn nested_selection_keeps_a_coherent_directory_chain() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());

    let meta = ArchiveMeta::new(dir.path().join("chain.zip"));
    let pack = ArchivePack {
        file_list: vec![
            root.join("readme.md"),
            root.join("nested/deep/leaf.txt"),
        ],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let read = ArchiveRead {
        recursive: true,
        ..ArchiveRead::default()
    };
    let paths: Vec<String> = get_archive_file_list(&meta, &read)
        .unwrap()
        .into_iter()
        .map(|e| e.full_path)
        .collect();
    assert_eq!(
        paths,
        vec![
            "readme.md",
            "nested/",
            "nested/deep/",
            "nested/deep/leaf.txt"
        ]
    );
}

#[test]
fn packing_overwrites_an_existing_destination() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());
    let archive = dir.path().join("overwrite.tar");
    fs::write(&archive, b"stale bytes that are not a tar").unwrap();

    let meta = ArchiveMeta::new(&archive);
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let read = ArchiveRead {
        recursive: true,
        ..ArchiveRead::default()
    };
    assert!(!get_archive_file_list(&meta, &read).unwrap().is_empty());
}

#[test]
fn unpacking_a_file_list_narrows_the_output() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());

    let meta = ArchiveMeta::new(dir.path().join("narrow.tar.gz"));
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("narrow_out");
    let unpack = ArchiveUnpack {
        file_list: vec!["source/nested".to_string()],
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&meta, &unpack, &mut session()).unwrap();

    assert!(out.join("source/nested/data.bin").exists());
    assert!(out.join("source/nested/deep/leaf.txt").exists());
    assert!(!out.join("source/readme.md").exists());
}

#[test]
fn unpacking_zero_matches_still_creates_the_destination() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());

    let meta = ArchiveMeta::new(dir.path().join("empty.zip"));
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("no_match_out");
    let unpack = ArchiveUnpack {
        file_list: vec!["does/not/exist".to_string()],
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&meta, &unpack, &mut session()).unwrap();

    assert!(out.is_dir());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn unpack_ignore_patterns_drop_entries() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());

    let meta = ArchiveMeta::new(dir.path().join("filtered.tar"));
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("filtered_out");
    let mut unpack_meta = ArchiveMeta::new(meta.filename.clone());
    unpack_meta.gitignore_patterns = vec!["*.bin".to_string()];
    let unpack = ArchiveUnpack {
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&unpack_meta, &unpack, &mut session()).unwrap();

    assert!(out.join("source/readme.md").exists());
    assert!(!out.join("source/nested/data.bin").exists());
}

#[test]
fn packing_to_rar_is_unsupported() {
    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());
    let meta = ArchiveMeta::new(dir.path().join("readonly.rar"));
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    let err = start_packing(&meta, &pack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::FormatUnsupported(_)));
}

#[cfg(unix)]
#[test]
fn symlinks_round_trip_as_links() {
    for archive_name in ["links.tar", "links.zip"] {
        let dir = tempdir().unwrap();
        let root = create_source_tree(dir.path());
        std::os::unix::fs::symlink("readme.md", root.join("readme.link")).unwrap();
        // A dangling target is permitted and preserved verbatim.
        std::os::unix::fs::symlink("missing-target", root.join("dangling.link")).unwrap();

        let meta = ArchiveMeta::new(dir.path().join(archive_name));
        let pack = ArchivePack {
            file_list: vec![root],
            ..ArchivePack::default()
        };
        start_packing(&meta, &pack, &mut session()).unwrap();

        let out = dir.path().join("out");
        let unpack = ArchiveUnpack {
            destination: out.clone(),
            ..ArchiveUnpack::default()
        };
        start_unpacking(&meta, &unpack, &mut session()).unwrap();

        let link = out.join("source/readme.link");
        let link_meta = fs::symlink_metadata(&link).unwrap();
        assert!(link_meta.file_type().is_symlink(), "{archive_name}");
        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from("readme.md"),
            "{archive_name}"
        );
        assert_eq!(
            fs::read_link(out.join("source/dangling.link")).unwrap(),
            PathBuf::from("missing-target"),
            "{archive_name}"
        );
    }
}

#[cfg(unix)]
#[test]
fn unpacking_preserves_file_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = create_source_tree(dir.path());
    let script = root.join("run.sh");
    fs::write(&script, b"#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let meta = ArchiveMeta::new(dir.path().join("modes.tar"));
    let pack = ArchivePack {
        file_list: vec![root],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("out");
    let unpack = ArchiveUnpack {
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&meta, &unpack, &mut session()).unwrap();

    let restored = fs::metadata(out.join("source/run.sh")).unwrap();
    assert_eq!(restored.permissions().mode() & 0o777, 0o755);
}
