//! Store implementations:
//! - `memory`: records in a map, gone on restart
//! - `file`: one JSON document per notification, atomic rename on write
//! - `test`: memory store that lets tests wait for writes

pub mod file;
pub mod memory;

pub use file::FileNotificationStore;
pub use memory::MemoryNotificationStore;
pub use test::TestNotificationStore;
