//! Container parsing across kinds, from disk and from memory

use crate::common::{create_container, generate_test_data, temp_dir};
use pretty_assertions::assert_eq;
use spiral_archive::wad::WadHeader;
use spiral_archive::container::FormatHeader;
use spiral_archive::{ArchiveContainer, Backing, ContainerBuilder, ContainerKind, Error, ParseLimits};

#[test]
fn test_open_every_kind_from_disk() {
    let dir = temp_dir();
    for kind in ContainerKind::ALL {
        let path = create_container(
            dir.path(),
            &format!("sample.{}", kind.capabilities().extension),
            kind,
            &[("a/first.bin", 100, 0), ("a/b/second.bin", 3, 0), ("third.bin", 0, 0)],
        );

        let container = ArchiveContainer::open(&path).unwrap();
        assert_eq!(container.kind(), kind);
        assert!(matches!(container.backing(), Backing::File(p) if p == &path));
        assert_eq!(container.size(), std::fs::metadata(&path).unwrap().len());

        let names: Vec<&str> = container.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a/first.bin", "a/b/second.bin", "third.bin"]);
        assert_eq!(container.read_entry("a/first.bin").unwrap(), generate_test_data(100));
        assert_eq!(container.read_entry("third.bin").unwrap(), Vec::<u8>::new());
    }
}

#[test]
fn test_stored_ranges_match_payloads() {
    let dir = temp_dir();
    for kind in [ContainerKind::Wad, ContainerKind::Spc] {
        let path = create_container(
            dir.path(),
            &format!("ranges.{}", kind.capabilities().extension),
            kind,
            &[("x", 17, 0), ("y", 31, 0)],
        );
        let bytes = std::fs::read(&path).unwrap();
        let container = ArchiveContainer::open(&path).unwrap();
        for entry in container.entries() {
            let start = (container.data_offset() + entry.offset) as usize;
            assert_eq!(
                &bytes[start..start + entry.size as usize],
                &generate_test_data(entry.size as usize)[..]
            );
        }
    }
}

#[test]
fn test_wad_header_carried() {
    let data = ContainerBuilder::new(ContainerKind::Wad)
        .header(FormatHeader::Wad(WadHeader {
            major: 2,
            minor: 0,
            header: b"custom".to_vec(),
        }))
        .add_entry("a", vec![1])
        .build_to_vec()
        .unwrap();
    let container = ArchiveContainer::from_bytes(data).unwrap();
    let FormatHeader::Wad(header) = container.header() else {
        panic!("expected a WAD header");
    };
    assert_eq!(header.major, 2);
    assert_eq!(header.header, b"custom");
}

#[test]
fn test_duplicate_entry_is_corruption() {
    let data = ContainerBuilder::new(ContainerKind::Spc)
        .add_raw_entry("dup.bin", vec![1])
        .add_raw_entry("other.bin", vec![2])
        .build_to_vec()
        .unwrap();

    // Rename the second entry in place to collide with the first
    let mut data = data;
    let pos = data
        .windows(9)
        .position(|w| w == b"other.bin")
        .unwrap();
    data[pos..pos + 9].copy_from_slice(b"dup.bin\0\0");
    // Name lengths are recorded separately; patch the length field too
    let len_pos = pos - 0x10 - 4;
    data[len_pos..len_pos + 4].copy_from_slice(&7u32.to_le_bytes());

    let err = ArchiveContainer::from_bytes(data).unwrap_err();
    assert!(matches!(err, Error::DuplicateEntry(ref name) if name == "dup.bin"));
    assert!(err.is_corruption());
}

#[test]
fn test_parse_limits() {
    let dir = temp_dir();
    let path = create_container(
        dir.path(),
        "many.wad",
        ContainerKind::Wad,
        &[("a", 1, 0), ("b", 1, 0), ("c", 1, 0)],
    );

    let strict = ParseLimits {
        max_entry_count: 2,
        ..ParseLimits::default()
    };
    assert!(matches!(
        ArchiveContainer::open_with_limits(&path, &strict),
        Err(Error::InvalidFormat(_))
    ));
    assert!(ArchiveContainer::open_with_limits(&path, &ParseLimits::default()).is_ok());
}

#[test]
fn test_truncated_containers_rejected() {
    for kind in ContainerKind::ALL {
        let data = ContainerBuilder::new(kind)
            .add_entry("payload.bin", generate_test_data(256))
            .build_to_vec()
            .unwrap();
        let truncated = data[..data.len() / 2].to_vec();
        let err = ArchiveContainer::from_bytes(truncated).unwrap_err();
        assert!(err.is_corruption() || matches!(err, Error::Io(_)), "{kind}: {err}");
    }
}
