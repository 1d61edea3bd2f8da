//! Value types shared by the storage service and the HTTP handlers.
//!
//! Nothing here is persisted on its own: the filesystem is the only record,
//! these types describe what was written or found there.

pub mod entry;
pub mod object;
