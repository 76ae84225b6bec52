//! scrivener - incremental transcript fusion for streaming speech-to-text
//!
//! Consumes overlapping token-window updates from an inference engine and
//! maintains a single, monotonically improving transcript.

pub mod config;
pub mod error;
pub mod manager;
pub mod stream;
pub mod tokens;
pub mod transcript;
