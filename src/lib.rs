//! LHBOT: Lighthouse bundle watcher and one-shot auto-purchaser
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod cloud;
pub mod notify;
pub mod engine;
pub mod storage;

#[cfg(test)]
mod test_support;
