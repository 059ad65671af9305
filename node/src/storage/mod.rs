pub mod blocks;
pub mod bridge;
pub mod kv;
pub mod oracle;
pub mod receipts;
pub mod tx;

pub use kv::{AccountRecord, Storage, StorageError};
