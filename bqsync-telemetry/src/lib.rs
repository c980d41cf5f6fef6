//! Tracing initialisation for bqsync binaries and tests.

pub mod tracing;
