// # Record Store Implementations
//
// Implementations of the RecordStore trait for different persistence
// strategies.

pub mod file;
pub mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
