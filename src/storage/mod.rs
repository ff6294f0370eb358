//! Table storage: the in-memory table, its CSV codec, load/save sources and
//! the table cache

pub mod cache;
pub mod csv;
pub mod memory;
pub mod source;
pub mod table;
