use shorthand_sync::{Error, Extractor, Limits, SymlinkBehavior};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

// ============================================================================
// Helper Functions
// ============================================================================

fn create_bundle(files: &[(&str, &[u8])]) -> std::fs::File {
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap()
}

fn story_dir(root: &Path) -> std::path::PathBuf {
    root.join("shorthand").join("42").join("abc")
}

/// Stored entry whose headers claim `declared_size` bytes.
fn create_lying_bundle(name: &str, content: &[u8], declared_size: u32) -> std::fs::File {
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    zip.start_file(name, options).unwrap();
    zip.write_all(content).unwrap();
    let mut finished = zip.finish().unwrap();

    finished.seek(SeekFrom::Start(0)).unwrap();
    let mut buffer = Vec::new();
    finished.read_to_end(&mut buffer).unwrap();

    // Local header: compressed size at 18, uncompressed at 22.
    let size = declared_size.to_le_bytes();
    buffer[18..22].copy_from_slice(&size);
    buffer[22..26].copy_from_slice(&size);

    // Central directory: compressed size at 20, uncompressed at 24.
    let central = buffer
        .windows(4)
        .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
        .unwrap();
    buffer[central + 20..central + 24].copy_from_slice(&size);
    buffer[central + 24..central + 28].copy_from_slice(&size);

    let mut hacked = tempfile::tempfile().unwrap();
    hacked.write_all(&buffer).unwrap();
    hacked.seek(SeekFrom::Start(0)).unwrap();
    hacked
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_blocks_zip_slip() {
    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let bundle = create_bundle(&[
        ("index.html", b"safe"),
        ("../../evil.html", b"evil"),
    ]);

    let result = Extractor::new(&dest).extract(bundle);

    match result {
        Err(Error::PathEscape { entry, .. }) => assert_eq!(entry, "../../evil.html"),
        other => panic!("traversal was not blocked: {:?}", other),
    }
    assert!(!dest.exists(), "nothing may be published on failure");
    assert!(!root.path().join("shorthand/evil.html").exists());
}

#[test]
fn test_absolute_path_contained() {
    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let bundle = create_bundle(&[("/tmp/shorthand-evil.html", b"evil")]);

    match Extractor::new(&dest).extract(bundle) {
        Err(Error::PathEscape { .. }) | Err(Error::InvalidFilename { .. }) => {}
        Ok(_) => {
            assert!(!Path::new("/tmp/shorthand-evil.html").exists());
            assert!(dest.join("tmp/shorthand-evil.html").exists());
        }
        Err(e) => panic!("unexpected error: {:?}", e),
    }
}

#[test]
fn test_mixed_slash_traversal() {
    let root = tempdir().unwrap();
    let bundle = create_bundle(&[("media\\..\\..\\evil.html", b"x")]);

    let result = Extractor::new(story_dir(root.path())).extract(bundle);

    assert!(
        matches!(result, Err(Error::InvalidFilename { .. })),
        "backslashes must be rejected: {:?}",
        result
    );
}

// ============================================================================
// Limits
// ============================================================================

#[test]
fn test_total_size_limit() {
    let root = tempdir().unwrap();
    let bundle = create_bundle(&[("a.mp4", &[0u8; 80]), ("b.mp4", &[0u8; 80])]);

    let result = Extractor::new(story_dir(root.path()))
        .limits(Limits {
            max_total_bytes: 100,
            ..Default::default()
        })
        .extract(bundle);

    match result {
        Err(Error::TotalSizeExceeded { limit, would_be }) => {
            assert_eq!(limit, 100);
            assert_eq!(would_be, 160);
        }
        other => panic!("quota not enforced: {:?}", other),
    }
}

#[test]
fn test_single_file_size_limit() {
    let root = tempdir().unwrap();
    let bundle = create_bundle(&[("hero.mp4", &[1u8; 500])]);

    let result = Extractor::new(story_dir(root.path()))
        .limits(Limits {
            max_single_file: 100,
            ..Default::default()
        })
        .extract(bundle);

    assert!(matches!(
        result,
        Err(Error::FileTooLarge {
            limit: 100,
            size: 500,
            ..
        })
    ));
}

#[test]
fn test_file_count_limit() {
    let root = tempdir().unwrap();
    let bundle = create_bundle(&[("1.html", b"1"), ("2.html", b"2"), ("3.html", b"3")]);

    let result = Extractor::new(story_dir(root.path()))
        .limits(Limits {
            max_file_count: 2,
            ..Default::default()
        })
        .extract(bundle);

    assert!(matches!(
        result,
        Err(Error::FileCountExceeded {
            limit: 2,
            attempted: 3
        })
    ));
}

#[test]
fn test_path_depth_limit() {
    let root = tempdir().unwrap();
    let bundle = create_bundle(&[("a/b/c/d/e.html", b"deep")]);

    let result = Extractor::new(story_dir(root.path()))
        .limits(Limits {
            max_path_depth: 3,
            ..Default::default()
        })
        .extract(bundle);

    assert!(matches!(
        result,
        Err(Error::PathTooDeep {
            depth: 5,
            limit: 3,
            ..
        })
    ));
}

#[test]
fn test_declared_size_is_enforced() {
    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let bundle = create_lying_bundle("lie.html", b"0123456789", 5);

    let result = Extractor::new(&dest).extract(bundle);

    // Either our size probe or the CRC check inside zip catches it.
    match result {
        Err(Error::SizeMismatch { declared: 5, .. }) | Err(Error::Io(_)) | Err(Error::Zip(_)) => {}
        other => panic!("lying entry accepted: {:?}", other),
    }
    assert!(!dest.exists());
}

// ============================================================================
// Entry types
// ============================================================================

#[test]
fn test_symlinks_skipped_by_default() {
    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.add_symlink("passwd", "/etc/passwd", SimpleFileOptions::default())
        .unwrap();
    zip.start_file("index.html", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"<html></html>").unwrap();
    let bundle = zip.finish().unwrap();

    let report = Extractor::new(&dest).extract(bundle).unwrap();

    assert_eq!(report.files_extracted, 1);
    assert_eq!(report.entries_skipped, 1);
    assert!(std::fs::symlink_metadata(dest.join("passwd")).is_err());
}

#[test]
fn test_symlinks_can_be_refused() {
    let root = tempdir().unwrap();
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.add_symlink("latest", "index.html", SimpleFileOptions::default())
        .unwrap();
    let bundle = zip.finish().unwrap();

    let result = Extractor::new(story_dir(root.path()))
        .symlinks(SymlinkBehavior::Error)
        .extract(bundle);

    assert!(matches!(result, Err(Error::SymlinkNotAllowed { .. })));
}

#[test]
fn test_creates_directories() {
    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.add_directory("media/", SimpleFileOptions::default())
        .unwrap();
    zip.start_file("media/images/cover.jpg", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"jpeg").unwrap();
    let bundle = zip.finish().unwrap();

    let report = Extractor::new(&dest).extract(bundle).unwrap();

    assert_eq!(report.dirs_created, 1);
    assert_eq!(report.files_extracted, 1);
    assert!(dest.join("media/images/cover.jpg").is_file());
}

#[cfg(unix)]
#[test]
fn test_permissions_stay_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempdir().unwrap();
    let dest = story_dir(root.path());
    let file = tempfile::tempfile().unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, mode) in [("script.js", 0o640), ("private.css", 0o600), ("drop.html", 0o200)] {
        zip.start_file(name, SimpleFileOptions::default().unix_permissions(mode))
            .unwrap();
        zip.write_all(b"x").unwrap();
    }
    let bundle = zip.finish().unwrap();

    Extractor::new(&dest).extract(bundle).unwrap();

    let mode_of = |name: &str| {
        std::fs::metadata(dest.join(name))
            .unwrap()
            .permissions()
            .mode()
            & 0o7777
    };
    assert_eq!(mode_of("script.js"), 0o644);
    assert_eq!(mode_of("private.css"), 0o644);
    assert_eq!(mode_of("drop.html"), 0o644);
}

#[test]
fn test_extract_file_convenience() {
    let work = tempdir().unwrap();
    let zip_path = work.path().join("story.zip");
    {
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("index.html", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"Hello, Reef!").unwrap();
        zip.finish().unwrap();
    }

    let dest = story_dir(work.path());
    let report = shorthand_sync::extract_file(&dest, &zip_path).unwrap();

    assert_eq!(report.files_extracted, 1);
    assert_eq!(report.bytes_written, 12);
    assert_eq!(
        std::fs::read_to_string(dest.join("index.html")).unwrap(),
        "Hello, Reef!"
    );
}
