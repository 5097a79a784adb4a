//! Writing extracted parts to disk.

pub mod attachment;
