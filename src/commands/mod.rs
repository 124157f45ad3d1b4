//! CLI command implementations.

pub mod changelog;
