//! Applying requests through sessions, in place and by rebuild

use crate::common::{generate_test_data, prioritized_container, temp_dir};
use pretty_assertions::assert_eq;
use spiral_archive::container::FormatHeader;
use spiral_archive::spc::{SpcEntryFlags, entry_header_offset, raw_flags};
use spiral_archive::{
    ArchiveContainer, ContainerKind, PRIORITY_MANIFEST_NAME, PatchRequest, PatchSession,
    PatchStrategy, RebuildMode, RebuildOptions, rebuild,
};
use std::fs;

fn shape(container: &ArchiveContainer) -> Vec<(String, u64, i32)> {
    container
        .entries()
        .iter()
        .map(|e| (e.name.clone(), e.size, e.priority))
        .collect()
}

#[test]
fn test_in_place_roundtrip_preserves_everything_else() {
    let dir = temp_dir();
    for kind in [ContainerKind::Wad, ContainerKind::Spc] {
        let path = prioritized_container(dir.path(), kind);
        let before = std::fs::read(&path).unwrap();
        let original = ArchiveContainer::open(&path).unwrap();

        let payload = vec![0x5A; 32];
        let mut session = PatchSession::open(&path).unwrap();
        let outcome = session
            .apply(PatchRequest::new().with("bg/bg_006.tga", payload.clone()).unwrap())
            .unwrap();
        assert_eq!(outcome.plan.strategy, PatchStrategy::InPlace);
        assert_eq!(outcome.bytes_written, 32);

        let after = std::fs::read(&path).unwrap();
        assert_eq!(after.len(), before.len());

        // Only the patched range differs
        let entry = original.entry("bg/bg_006.tga").unwrap();
        let start = (original.data_offset() + entry.offset) as usize;
        let end = start + entry.size as usize;
        assert_eq!(&after[..start], &before[..start]);
        assert_eq!(&after[end..], &before[end..]);
        assert_eq!(&after[start..end], &payload[..]);

        let reopened = ArchiveContainer::open(&path).unwrap();
        assert_eq!(shape(&reopened), shape(&original));
        assert_eq!(reopened.read_entry("bg/bg_006.tga").unwrap(), payload);
    }
}

fn spc_flags(container: &ArchiveContainer) -> Vec<SpcEntryFlags> {
    match container.header() {
        FormatHeader::Spc(header) => header.flags.clone(),
        _ => Vec::new(),
    }
}

/// Rewrite an SPC entry header on disk to claim a compressed payload
fn mark_compressed(path: &std::path::Path, name: &str) {
    let container = ArchiveContainer::open(path).unwrap();
    let start = entry_header_offset(container.entry(name).unwrap()).unwrap() as usize;
    let mut data = fs::read(path).unwrap();
    data[start..start + 2].copy_from_slice(&2u16.to_le_bytes());
    data[start + 8..start + 12].copy_from_slice(&100u32.to_le_bytes());
    fs::write(path, data).unwrap();
}

#[test]
fn test_in_place_and_rebuild_store_entries_alike() {
    let dir = temp_dir();
    for kind in [ContainerKind::Wad, ContainerKind::Spc] {
        let patched = prioritized_container(dir.path(), kind);
        let reference = dir.path().join(format!("reference.{}", kind.capabilities().extension));
        if kind == ContainerKind::Spc {
            mark_compressed(&patched, "bg/bg_006.tga");
            let container = ArchiveContainer::open(&patched).unwrap();
            let index = container.position("bg/bg_006.tga").unwrap();
            assert_eq!(spc_flags(&container)[index].cmp_flag, 2);
        }
        fs::copy(&patched, &reference).unwrap();

        let request = PatchRequest::new()
            .with("bg/bg_006.tga", vec![0x42; 32])
            .unwrap();

        let mut session = PatchSession::open(&patched).unwrap();
        let outcome = session.apply(request.clone()).unwrap();
        assert_eq!(outcome.plan.strategy, PatchStrategy::InPlace);
        let in_place = ArchiveContainer::open(&patched).unwrap();

        let options = RebuildOptions::new().mode(RebuildMode::Reorganize);
        let rebuilt = rebuild(&ArchiveContainer::open(&reference).unwrap(), &request, &options)
            .unwrap()
            .into_bytes()
            .unwrap();
        let rebuilt = ArchiveContainer::from_bytes(rebuilt).unwrap();

        assert_eq!(shape(&in_place), shape(&rebuilt), "{kind}");
        assert_eq!(spc_flags(&in_place), spc_flags(&rebuilt), "{kind}");
        for entry in in_place.entries() {
            assert_eq!(
                in_place.read_entry(&entry.name).unwrap(),
                rebuilt.read_entry(&entry.name).unwrap()
            );
        }
        if kind == ContainerKind::Spc {
            let index = in_place.position("bg/bg_006.tga").unwrap();
            assert_eq!(spc_flags(&in_place)[index], raw_flags(32));
        }
    }
}

#[test]
fn test_empty_request_rebuild_is_idempotent() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let container = ArchiveContainer::open(prioritized_container(dir.path(), kind)).unwrap();
        for mode in [RebuildMode::Reorganize, RebuildMode::Full] {
            let options = RebuildOptions::new().mode(mode).prioritize_new(true);
            let first = rebuild(&container, &PatchRequest::new(), &options)
                .unwrap()
                .into_bytes()
                .unwrap();
            let first = ArchiveContainer::from_bytes(first).unwrap();
            assert_eq!(shape(&first), shape(&container), "{kind} {mode:?}");

            let second = rebuild(&first, &PatchRequest::new(), &options)
                .unwrap()
                .into_bytes()
                .unwrap();
            let second = ArchiveContainer::from_bytes(second).unwrap();
            assert_eq!(shape(&second), shape(&first));
        }
    }
}

#[test]
fn test_reorganize_keeps_priorities() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = prioritized_container(dir.path(), kind);
        let mut session = PatchSession::open(&path).unwrap();
        let grown = generate_test_data(100);

        let outcome = session
            .apply(PatchRequest::new().with("bg/bg_006.tga", grown.clone()).unwrap())
            .unwrap();
        assert_eq!(outcome.plan.strategy, PatchStrategy::Reorganize);
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.mode, RebuildMode::Reorganize);
        assert_eq!(summary.replaced, 1);
        assert_eq!(summary.inserted, 0);

        let container = session.container();
        assert_eq!(container.read_entry("bg/bg_006.tga").unwrap(), grown);
        assert_eq!(container.entry("bg/bg_006.tga").unwrap().priority, 6);
        assert_eq!(container.highest_priority(), 10);
    }
}

#[test]
fn test_rebuild_promotes_and_appends() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = prioritized_container(dir.path(), kind);
        let mut session = PatchSession::open(&path).unwrap();

        let outcome = session
            .apply(
                PatchRequest::new()
                    .with("bg/bg_005.tga", vec![1; 3])
                    .unwrap()
                    .with("bg/bg_200.tga", vec![2; 7])
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(outcome.plan.strategy, PatchStrategy::Rebuild);
        assert_eq!(outcome.summary.as_ref().unwrap().inserted, 1);

        let container = session.container();
        let names: Vec<&str> = container.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "script/e00_001.lin",
                "bg/bg_006.tga",
                "bg/bg_005.tga",
                "font/font.spc",
                PRIORITY_MANIFEST_NAME,
                "bg/bg_200.tga",
            ]
        );
        assert_eq!(container.entry("bg/bg_005.tga").unwrap().priority, 11);
        assert_eq!(container.entry("bg/bg_200.tga").unwrap().priority, 11);
        assert_eq!(container.entry("script/e00_001.lin").unwrap().priority, 10);
        assert_eq!(container.read_entry("bg/bg_200.tga").unwrap(), vec![2; 7]);
        assert_eq!(
            container.read_entry("script/e00_001.lin").unwrap(),
            generate_test_data(64)
        );

        // A follow-up patch of a promoted entry now stays within bounds
        let plan = session.plan(&PatchRequest::new().with("bg/bg_005.tga", vec![0; 9]).unwrap());
        assert_eq!(plan.strategy, PatchStrategy::Reorganize);
    }
}

#[test]
fn test_sequential_sessions_accumulate() {
    let dir = temp_dir();
    let path = prioritized_container(dir.path(), ContainerKind::Wad);

    for round in 0..3u8 {
        let mut session = PatchSession::open(&path).unwrap();
        let name = format!("mods/extra_{round}.bin");
        session
            .apply(PatchRequest::new().with(name.as_str(), vec![round; 10]).unwrap())
            .unwrap();
    }

    let container = ArchiveContainer::open(&path).unwrap();
    for round in 0..3u8 {
        let entry = container.entry(&format!("mods/extra_{round}.bin")).unwrap();
        assert_eq!(entry.priority, 11 + i32::from(round));
    }
}
