//! Failure scenarios that must leave targets untouched

use crate::common::{create_container, prioritized_container, temp_dir};
use spiral_archive::{
    ContainerBuilder, ContainerKind, Error, FirstCandidate, PRIORITY_MANIFEST_NAME, PatchJob,
    PatchRequest, PatchSession, apply_all,
};
use std::fs;

#[test]
fn test_corrupt_manifest_refuses_to_open() {
    let dir = temp_dir();
    let path = dir.path().join("broken.spc");
    ContainerBuilder::new(ContainerKind::Spc)
        .add_entry("a.bin", vec![1; 8])
        .add_raw_entry(PRIORITY_MANIFEST_NAME, vec![0xFF, 0xFF, 0xFF, 0x7F])
        .build(&path)
        .unwrap();
    let before = fs::read(&path).unwrap();

    let err = PatchSession::open(&path).unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_truncated_container_rejected() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = prioritized_container(dir.path(), kind);
        let mut data = fs::read(&path).unwrap();
        data.truncate(data.len() / 3);
        fs::write(&path, &data).unwrap();

        let err = PatchSession::open(&path).unwrap_err();
        assert!(err.is_corruption(), "{kind}: {err}");
    }
}

#[test]
fn test_unknown_magic_rejected() {
    let dir = temp_dir();
    let path = dir.path().join("notes.wad");
    fs::write(&path, b"just some text, not a container").unwrap();
    assert!(matches!(
        PatchSession::open(&path),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_reserved_manifest_name_rejected() {
    let result = PatchRequest::new().with(PRIORITY_MANIFEST_NAME, vec![0; 4]);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));

    let result = PatchRequest::new()
        .with("a.bin", vec![0])
        .unwrap()
        .with("a.bin", vec![1]);
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[test]
fn test_missing_companion_resource() {
    let dir = temp_dir();
    let path = create_container(
        dir.path(),
        "plain.wad",
        ContainerKind::Wad,
        &[("readme.txt", 4, 0)],
    );
    let before = fs::read(&path).unwrap();
    let mut session = PatchSession::open(&path).unwrap();

    let err = session
        .merge("face.tex", b"data", &mut FirstCandidate)
        .unwrap_err();
    assert!(matches!(err, Error::NoCandidateResource { kind: "srd" }));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_duplicate_batch_targets_rejected_up_front() {
    let dir = temp_dir();
    let path = prioritized_container(dir.path(), ContainerKind::Wad);
    let before = fs::read(&path).unwrap();

    let request = PatchRequest::new().with("new.bin", vec![1; 4]).unwrap();
    let aliased = dir.path().join(".").join("prioritized.wad");
    let err = apply_all(vec![
        PatchJob::new(&path, request.clone()),
        PatchJob::new(aliased, request),
    ])
    .unwrap_err();

    assert!(matches!(err, Error::ConcurrentTarget(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_batch_reports_failures_per_job() {
    let dir = temp_dir();
    let good = prioritized_container(dir.path(), ContainerKind::Spc);
    let bad = dir.path().join("garbage.spc");
    fs::write(&bad, b"garbage").unwrap();

    let request = PatchRequest::new().with("bg/bg_005.tga", vec![3; 32]).unwrap();
    let results = apply_all(vec![
        PatchJob::new(&good, request.clone()),
        PatchJob::new(&bad, request),
    ])
    .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::InvalidFormat(_))));
    assert_eq!(fs::read(&bad).unwrap(), b"garbage");
}
