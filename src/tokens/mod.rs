//! Token-message boundary: wire types and deserialization into words.

pub mod deserializer;
pub mod joiner;
pub mod message;

pub use deserializer::{TS_TO_MS_RATIO, deserialize_tokens};
pub use message::{AudioTranscript, TokenMessage};
