//! Quiver CLI Library
//!
//! Reusable pieces of the `quiver` binary: configuration loading, JSONL input
//! and bulk import.

pub mod config;
pub mod filters;
pub mod import;
pub mod input;
