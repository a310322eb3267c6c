//! Level 4: End-to-End Scenario Tests
//!
//! These tests verify real-world usage scenarios and failure handling.

pub mod failures;
