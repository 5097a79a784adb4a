//! Message decoding: header decoding, transfer decoding and MIME tree handling.

pub mod header;
pub mod mime;
pub mod transfer;
