//! Staged commits and partial-write failures

use crate::common::{FailAfter, prioritized_container, temp_dir};
use spiral_archive::{
    ArchiveContainer, ContainerKind, Error, PatchRequest, RebuildMode, RebuildOptions,
    Transaction, apply_in_place_to, rebuild_into,
};
use std::fs;
use std::io::Cursor;

fn staging_files(dir: &std::path::Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".spiral-"))
        .count()
}

#[test]
fn test_failure_after_n_bytes_leaves_target_untouched() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = prioritized_container(dir.path(), kind);
        let before = fs::read(&path).unwrap();
        let container = ArchiveContainer::open(&path).unwrap();
        let request = PatchRequest::new().with("bg/bg_005.tga", vec![9; 500]).unwrap();
        let options = RebuildOptions::new()
            .mode(RebuildMode::Full)
            .prioritize_new(true);

        for limit in [0usize, 1, 16, 100, 300] {
            let mut tx = Transaction::begin(&path).unwrap();
            let result = tx.stage_write(|file| {
                let mut failing = FailAfter::new(file, limit);
                rebuild_into(&container, &request, &options, &mut failing)
            });

            assert!(result.is_err(), "{kind} limit {limit}");
            assert!(tx.staging_path().is_none());
            drop(tx);

            assert_eq!(fs::read(&path).unwrap(), before, "{kind} limit {limit}");
            assert_eq!(staging_files(dir.path()), 0);
        }
    }
}

#[test]
fn test_successful_commit_leaves_no_staging() {
    let dir = temp_dir();
    let path = prioritized_container(dir.path(), ContainerKind::Spc);
    let container = ArchiveContainer::open(&path).unwrap();
    let request = PatchRequest::new().with("new.bin", vec![1; 4]).unwrap();

    let mut tx = Transaction::begin(&path).unwrap();
    let summary = tx
        .stage_write(|file| rebuild_into(&container, &request, &RebuildOptions::new(), file))
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(staging_files(dir.path()), 1);

    tx.commit().unwrap();
    assert_eq!(staging_files(dir.path()), 0);
    assert_eq!(
        ArchiveContainer::open(&path).unwrap().read_entry("new.bin").unwrap(),
        vec![1; 4]
    );
}

#[test]
fn test_in_place_partial_write_is_reported() {
    let dir = temp_dir();
    let path = prioritized_container(dir.path(), ContainerKind::Wad);
    let container = ArchiveContainer::open(&path).unwrap();
    let request = PatchRequest::new()
        .with("script/e00_001.lin", vec![0; 64])
        .unwrap()
        .with("bg/bg_006.tga", vec![0; 32])
        .unwrap();

    let mut failing = FailAfter::new(Cursor::new(fs::read(&path).unwrap()), 70);
    let err = apply_in_place_to(&mut failing, &container, &request).unwrap_err();
    assert!(matches!(err, Error::InPlaceWrite { .. }));
    assert!(!err.target_untouched());
}

#[cfg(unix)]
#[test]
fn test_rebuild_keeps_file_mode() {
    use spiral_archive::{PatchSession, PatchStrategy};
    use std::os::unix::fs::PermissionsExt;

    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = prioritized_container(dir.path(), kind);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let mut session = PatchSession::open(&path).unwrap();
        let outcome = session
            .apply(PatchRequest::new().with("mods/new.dat", vec![1; 12]).unwrap())
            .unwrap();
        assert_eq!(outcome.plan.strategy, PatchStrategy::Rebuild);

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644, "{kind}");
        assert_eq!(staging_files(dir.path()), 0);
    }
}
