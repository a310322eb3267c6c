//! Level 2: Component Integration Tests
//!
//! These tests verify that individual components work together correctly.

pub mod formats;
pub mod security;
