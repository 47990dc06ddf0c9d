//! # qcoord-meta: the durable key-prefixed meta store
//!
//! Holds the coordinator's only durable state: load intent (collection and
//! partition load records, replicas) and the handoff inbox. Everything else
//! in the workspace is a write-through cache rebuilt from this store at
//! startup.
//!
//! The [`MetaStore`] trait is the contract every caller programs against;
//! [`MemoryMetaStore`] backs tests and [`FileMetaStore`] backs single-node
//! deployment. Both guarantee linearizable writes per key and atomic
//! multi-key writes within one [`MetaStore::multi_save`] batch.

mod error;
mod file;
mod keys;
mod memory;
mod store;

pub use error::MetaError;
pub use file::FileMetaStore;
pub use keys::KeyLayout;
pub use memory::MemoryMetaStore;
pub use store::{MetaStore, WatchEvent, WatchOp};
