//! Store and gateway adapters.

pub mod in_memory;
pub mod mock_gateway;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
