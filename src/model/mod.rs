//! Core data model types: message identifiers and decoded result records.

pub mod id;
pub mod mail;

pub use id::MessageId;
pub use mail::FetchedMessage;
