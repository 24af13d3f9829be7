use std::fs;

use redline_engine::{ensure_work_dir, upload_filename, ArtifactGuard, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_work_dir() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");
    assert!(!work.exists());
    ensure_work_dir(&work).unwrap();
    assert!(work.is_dir());
}

#[test]
fn file_in_place_of_work_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("not_a_dir");
    fs::write(&path, "x").unwrap();

    assert!(matches!(ensure_work_dir(&path), Err(PersistError::WorkDir(_))));
    let writer = AtomicFileWriter::new(path.clone());
    assert!(writer.write("out.html", b"data").is_err());
    assert!(!path.with_file_name("out.html").exists());
}

#[test]
fn upload_is_written_and_replaced_whole() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    let name = upload_filename(7, "../contract.txt");

    let first = writer.write(&name, b"first draft").unwrap();
    assert_eq!(first.file_name().unwrap(), "7_contract.txt");
    let second = writer.write(&name, b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn guard_removes_tracked_artifacts_on_drop() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    let upload = writer.write("1_nda.txt", b"upload").unwrap();
    let output = writer.write("nda_out.html", b"<p>out</p>").unwrap();
    let keep = writer.write("unrelated.txt", b"keep").unwrap();

    {
        let mut guard = ArtifactGuard::new();
        guard.track(upload.clone());
        guard.track(output.clone());
        guard.track(temp.path().join("never_written.html"));
    }

    assert!(!upload.exists());
    assert!(!output.exists());
    assert!(keep.exists());
}
