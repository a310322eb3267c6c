//! Common test utilities and fixtures

#![allow(dead_code)]

use spiral_archive::srd::SrdBuilder;
use spiral_archive::{ContainerBuilder, ContainerKind};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a temporary directory for tests
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Generate test data of a specific size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Write a container with `(name, size, priority)` entries filled with test data
pub fn create_container(
    dir: &Path,
    name: &str,
    kind: ContainerKind,
    entries: &[(&str, usize, i32)],
) -> PathBuf {
    let path = dir.join(name);
    let mut builder = ContainerBuilder::new(kind);
    for (entry, size, priority) in entries {
        builder = builder.add_entry_with_priority(*entry, generate_test_data(*size), *priority);
    }
    builder.build(&path).expect("Failed to build container");
    path
}

/// The prioritized layout used by threshold tests: highest priority 10
pub fn prioritized_container(dir: &Path, kind: ContainerKind) -> PathBuf {
    create_container(
        dir,
        &format!("prioritized.{}", kind.capabilities().extension),
        kind,
        &[
            ("script/e00_001.lin", 64, 10),
            ("bg/bg_006.tga", 32, 6),
            ("bg/bg_005.tga", 32, 5),
            ("font/font.spc", 16, 0),
        ],
    )
}

/// Structural and bulk bytes of a model with three textures
pub fn model_pair() -> (Vec<u8>, Vec<u8>) {
    let structural = SrdBuilder::new()
        .resource("skin.tex", &[(0, 16)])
        .resource("face.tex", &[(16, 8), (40, 8)])
        .resource("hair.tex", &[(24, 16)])
        .build();
    let mut bulk = Vec::new();
    bulk.extend_from_slice(&[b'S'; 16]);
    bulk.extend_from_slice(&[b'F'; 8]);
    bulk.extend_from_slice(&[b'H'; 16]);
    bulk.extend_from_slice(&[b'f'; 8]);
    (structural, bulk)
}

/// Write a model container holding one companion pair plus unrelated entries
pub fn create_model_container(dir: &Path, kind: ContainerKind, extra_pair: bool) -> PathBuf {
    let (structural, bulk) = model_pair();
    let path = dir.join(format!("model.{}", kind.capabilities().extension));
    let mut builder = ContainerBuilder::new(kind)
        .add_entry_with_priority("stand_00.srd", structural.clone(), 2)
        .add_entry_with_priority("stand_00.srdv", bulk.clone(), 2)
        .add_entry("readme.txt", b"model pack".to_vec());
    if extra_pair {
        builder = builder
            .add_entry("stand_01.srd", structural)
            .add_entry("stand_01.srdv", bulk);
    }
    builder.build(&path).expect("Failed to build model container");
    path
}

/// Writer that fails once more than `limit` bytes have been written
#[derive(Debug)]
pub struct FailAfter<W> {
    inner: W,
    written: usize,
    limit: usize,
}

impl<W> FailAfter<W> {
    pub fn new(inner: W, limit: usize) -> Self {
        Self {
            inner,
            written: 0,
            limit,
        }
    }
}

impl<W: Write> Write for FailAfter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.limit {
            return Err(io::Error::other("simulated disk full"));
        }
        let allowed = buf.len().min(self.limit - self.written);
        let n = self.inner.write(&buf[..allowed])?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Seek> Seek for FailAfter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
