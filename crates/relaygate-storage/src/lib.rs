//! relaygate-storage: Storage abstraction layer
//!
//! This crate provides the storage side of relaygate, including:
//! - RecordStore trait for snapshot reads and atomic batch commits
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             relaygate-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - RecordStore, WriteBatch      │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryRecordStore, MemorySnapshot};
pub use traits::{RecordStore, WriteBatch, WriteOp};
