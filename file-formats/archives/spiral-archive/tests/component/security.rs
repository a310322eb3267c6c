//! Hostile container tables

use spiral_archive::security::{validate_entry_bounds, validate_entry_name};
use spiral_archive::{ArchiveContainer, Error, ParseLimits};

fn wad_with_entry(name: &[u8], size: u64, offset: u64, data_len: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"AGAR");
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(name.len() as u32).to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend(vec![0xEEu8; data_len]);
    out
}

#[test]
fn test_well_formed_hand_built_wad() {
    let container = ArchiveContainer::from_bytes(wad_with_entry(b"ok.bin", 4, 2, 8)).unwrap();
    assert_eq!(container.read_entry("ok.bin").unwrap(), [0xEE; 4]);
}

#[test]
fn test_entry_past_end_rejected() {
    let result = ArchiveContainer::from_bytes(wad_with_entry(b"evil.bin", 16, 4, 8));
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}

#[test]
fn test_offset_overflow_rejected() {
    let result = ArchiveContainer::from_bytes(wad_with_entry(b"evil.bin", 1, u64::MAX, 8));
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}

#[test]
fn test_non_utf8_name_rejected() {
    let result = ArchiveContainer::from_bytes(wad_with_entry(&[0xFF, 0xFE], 0, 0, 0));
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
}

#[test]
fn test_huge_name_length_rejected_before_allocation() {
    let mut data = wad_with_entry(b"x", 0, 0, 0);
    // name_len field of the first entry
    data[20..24].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        ArchiveContainer::from_bytes(data),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_huge_entry_count_rejected() {
    let mut data = wad_with_entry(b"x", 0, 0, 0);
    data[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        ArchiveContainer::from_bytes(data),
        Err(Error::InvalidFormat(_))
    ));
    assert!(ParseLimits::default().check_count("file", u32::MAX).is_err());
}

#[test]
fn test_extraction_names() {
    assert!(validate_entry_name("script/e00_001.lin").is_ok());
    assert!(validate_entry_name("../../.bashrc").is_err());
    assert!(validate_entry_name("/absolute").is_err());
    assert!(validate_entry_bounds("a", 8, 8, 16).is_ok());
    assert!(validate_entry_bounds("a", 9, 8, 16).is_err());
}
