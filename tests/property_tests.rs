//! Property-based tests for the eight testable invariants in the design's
//! §8 ("Testable Properties").
//!
//! Run with: cargo test --test property_tests

mod property;
