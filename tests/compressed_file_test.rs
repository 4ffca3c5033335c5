use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::{thread_rng, Rng};
use tempfile::tempdir;
use unipack::{
    start_packing, start_unpacking, ArchiveMeta, ArchivePack, ArchiveUnpack, ArchiverError,
    Session,
};

fn session() -> Session {
    Session::new(Duration::ZERO)
}

fn pack_single(source: &Path, archive: &Path) -> Result<(), ArchiverError> {
    let meta = ArchiveMeta::new(archive);
    let pack = ArchivePack {
        file_list: vec![source.to_path_buf()],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session())
}

#[test]
fn every_codec_round_trips_a_single_file() {
    for ext in ["gz", "br", "bz2", "lz4", "sz", "xz", "zst"] {
        let dir = tempdir().unwrap();
        let source = dir.path().join("payload.dat");
        let mut content = vec![0u8; 32 * 1024];
        thread_rng().fill(&mut content[..]);
        fs::write(&source, &content).unwrap();

        let archive = dir.path().join(format!("payload.dat.{ext}"));
        pack_single(&source, &archive).unwrap();
        assert!(archive.exists(), "{ext}");

        let out = dir.path().join("out");
        let meta = ArchiveMeta::new(&archive);
        let unpack = ArchiveUnpack {
            destination: out.clone(),
            ..ArchiveUnpack::default()
        };
        start_unpacking(&meta, &unpack, &mut session()).unwrap();

        let restored = fs::read(out.join("payload.dat")).unwrap();
        assert_eq!(restored, content, "{ext}");
    }
}

#[test]
fn zero_sources_fail_with_no_file_found() {
    let dir = tempdir().unwrap();
    let meta = ArchiveMeta::new(dir.path().join("empty.gz"));
    let pack = ArchivePack::default();
    let err = start_packing(&meta, &pack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::CompressedFileNoFileFound));
}

#[test]
fn two_sources_fail_with_invalid_size() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"a").unwrap();
    fs::write(&b, b"b").unwrap();

    let meta = ArchiveMeta::new(dir.path().join("two.xz"));
    let pack = ArchivePack {
        file_list: vec![a, b],
        ..ArchivePack::default()
    };
    let err = start_packing(&meta, &pack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::CompressedFileInvalidSize));
}

#[test]
fn a_directory_source_fails_with_only_file_allowed() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir_all(&sub).unwrap();

    let meta = ArchiveMeta::new(dir.path().join("dir.zst"));
    let pack = ArchivePack {
        file_list: vec![sub],
        ..ArchivePack::default()
    };
    let err = start_packing(&meta, &pack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::CompressedFileOnlyFileAllowed));
}

#[test]
fn an_all_ignored_source_reports_no_file_found() {
    let dir = tempdir().unwrap();
    let secret = dir.path().join("token.secret");
    fs::write(&secret, b"shh").unwrap();

    let mut meta = ArchiveMeta::new(dir.path().join("ignored.gz"));
    meta.gitignore_patterns = vec!["*.secret".to_string()];
    let pack = ArchivePack {
        file_list: vec![secret],
        ..ArchivePack::default()
    };
    let err = start_packing(&meta, &pack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::CompressedFileNoFileFound));
}

#[test]
fn unpacking_ignores_passwords_for_compressed_files() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("notes.txt");
    fs::write(&source, b"no secrets here").unwrap();
    let archive = dir.path().join("notes.txt.zst");
    pack_single(&source, &archive).unwrap();

    let out = dir.path().join("out");
    let meta = ArchiveMeta::new(&archive);
    let unpack = ArchiveUnpack {
        destination: out.clone(),
        passwords: vec!["wrong".to_string(), "also-wrong".to_string()],
        ..ArchiveUnpack::default()
    };
    start_unpacking(&meta, &unpack, &mut session()).unwrap();
    assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"no secrets here");
}
