use std::fs;
use std::path::Path;
use std::time::Duration;

use tempfile::tempdir;
use unipack::{
    get_archive_file_list, is_archive_encrypted, prepare_archive, start_packing, start_unpacking,
    ArchiveMeta, ArchivePack, ArchiveRead, ArchiveUnpack, ArchiverError, EncryptionMethod,
    Session,
};

const CORRECT: &str = "1234567";

fn session() -> Session {
    Session::new(Duration::ZERO)
}

fn create_encrypted_zip(base: &Path, method: EncryptionMethod) -> ArchiveMeta {
    let source = base.join("secret.txt");
    fs::write(&source, b"top secret payload").unwrap();
    let nested = base.join("plain");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("note.txt"), b"less secret").unwrap();

    let meta = ArchiveMeta::new(base.join(match method {
        EncryptionMethod::Aes256 => "secret-aes.zip",
        EncryptionMethod::ZipCrypto => "secret-crypto.zip",
    }));
    let pack = ArchivePack {
        file_list: vec![source, nested],
        password: Some(CORRECT.to_string()),
        zip_encryption_method: method,
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();
    meta
}

#[test]
fn probing_reports_encryption_and_password_validity() {
    for method in [EncryptionMethod::Aes256, EncryptionMethod::ZipCrypto] {
        let dir = tempdir().unwrap();
        let packed = create_encrypted_zip(dir.path(), method);

        let no_password = ArchiveMeta::new(&packed.filename);
        let info = is_archive_encrypted(&no_password).unwrap();
        assert!(info.is_encrypted, "{method:?}");
        assert!(!info.is_valid_password, "{method:?}");

        let mut wrong = ArchiveMeta::new(&packed.filename);
        wrong.passwords = vec!["nope".to_string()];
        let info = is_archive_encrypted(&wrong).unwrap();
        assert!(info.is_encrypted, "{method:?}");
        assert!(!info.is_valid_password, "{method:?}");

        let mut right = ArchiveMeta::new(&packed.filename);
        right.password = Some(CORRECT.to_string());
        let info = is_archive_encrypted(&right).unwrap();
        assert!(info.is_encrypted, "{method:?}");
        assert!(info.is_valid_password, "{method:?}");
    }
}

#[test]
fn probing_an_unencrypted_zip_reports_nothing() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("open.txt");
    fs::write(&source, b"open data").unwrap();
    let meta = ArchiveMeta::new(dir.path().join("open.zip"));
    let pack = ArchivePack {
        file_list: vec![source],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let info = is_archive_encrypted(&meta).unwrap();
    assert!(!info.is_encrypted);
    assert!(!info.is_valid_password);
}

#[test]
fn all_wrong_passwords_fail_before_any_extraction() {
    for method in [EncryptionMethod::Aes256, EncryptionMethod::ZipCrypto] {
        let dir = tempdir().unwrap();
        let packed = create_encrypted_zip(dir.path(), method);

        let out = dir.path().join("out");
        let meta = ArchiveMeta::new(&packed.filename);
        let unpack = ArchiveUnpack {
            destination: out.clone(),
            passwords: vec!["".to_string(), "demo".to_string()],
            ..ArchiveUnpack::default()
        };
        let err = start_unpacking(&meta, &unpack, &mut session()).unwrap_err();
        assert!(
            matches!(err, ArchiverError::InvalidPassword),
            "{method:?}: {err:?}"
        );
        assert!(!out.exists(), "{method:?}: nothing may be written");
    }
}

#[test]
fn zero_passwords_against_an_encrypted_zip_fail_with_invalid_password() {
    let dir = tempdir().unwrap();
    let packed = create_encrypted_zip(dir.path(), EncryptionMethod::Aes256);

    let out = dir.path().join("out");
    let meta = ArchiveMeta::new(&packed.filename);
    let unpack = ArchiveUnpack {
        destination: out,
        ..ArchiveUnpack::default()
    };
    let err = start_unpacking(&meta, &unpack, &mut session()).unwrap_err();
    assert!(matches!(err, ArchiverError::InvalidPassword));
}

#[test]
fn one_correct_candidate_among_several_unlocks_the_zip() {
    for method in [EncryptionMethod::Aes256, EncryptionMethod::ZipCrypto] {
        let dir = tempdir().unwrap();
        let packed = create_encrypted_zip(dir.path(), method);

        let out = dir.path().join("out");
        let meta = ArchiveMeta::new(&packed.filename);
        let unpack = ArchiveUnpack {
            destination: out.clone(),
            passwords: vec!["wrong".to_string(), CORRECT.to_string()],
            ..ArchiveUnpack::default()
        };
        start_unpacking(&meta, &unpack, &mut session()).unwrap();
        assert_eq!(
            fs::read(out.join("secret.txt")).unwrap(),
            b"top secret payload",
            "{method:?}"
        );
        assert_eq!(
            fs::read(out.join("plain/note.txt")).unwrap(),
            b"less secret",
            "{method:?}"
        );
    }
}

#[test]
fn listing_an_encrypted_zip_needs_no_password_for_metadata() {
    let dir = tempdir().unwrap();
    let packed = create_encrypted_zip(dir.path(), EncryptionMethod::Aes256);

    let meta = ArchiveMeta::new(&packed.filename);
    let read = ArchiveRead {
        recursive: true,
        ..ArchiveRead::default()
    };
    let entries = get_archive_file_list(&meta, &read).unwrap();
    assert!(entries.iter().any(|e| e.full_path == "secret.txt"));
}

#[test]
fn tar_family_silently_ignores_wrong_passwords() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data.txt");
    fs::write(&source, b"tar does not do passwords").unwrap();

    let meta = ArchiveMeta::new(dir.path().join("plain.tar.gz"));
    let pack = ArchivePack {
        file_list: vec![source],
        ..ArchivePack::default()
    };
    start_packing(&meta, &pack, &mut session()).unwrap();

    let out = dir.path().join("out");
    let mut unpack_meta = ArchiveMeta::new(&meta.filename);
    unpack_meta.passwords = vec!["wrong".to_string(), "still wrong".to_string()];
    let unpack = ArchiveUnpack {
        destination: out.clone(),
        ..ArchiveUnpack::default()
    };
    start_unpacking(&unpack_meta, &unpack, &mut session()).unwrap();
    assert!(out.join("data.txt").exists());
}

#[test]
fn prepare_archive_reports_single_password_mode() {
    let dir = tempdir().unwrap();
    let packed = create_encrypted_zip(dir.path(), EncryptionMethod::Aes256);
    let meta = ArchiveMeta::new(&packed.filename);

    // Zip never requires the prepare gate; it validates during extraction.
    let single = prepare_archive(&meta, &["a".to_string()]).unwrap();
    assert!(!single.is_password_required);
    assert!(single.is_single_password_mode);

    let multi = prepare_archive(&meta, &["a".to_string(), "b".to_string()]).unwrap();
    assert!(!multi.is_single_password_mode);
}
