//! Password-hashing benchmarks: compute time, brute-force time and memory
//! footprint, each trial measured in its own forked process.

pub mod algorithms;
pub mod analysis;
pub mod config;
pub mod harness;
pub mod hugepage;
pub mod hwinfo;
pub mod isolate;
pub mod report;
pub mod stats;
pub mod sweep;
pub mod ui;
pub mod version;
