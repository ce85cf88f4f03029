//! Implementations of the ports.
//!
//! - **JsonlEventLog**: file-backed log, one JSON entry per line
//! - **InMemoryEventLog**: tests and dry runs

pub mod file_log;
pub mod inmem_log;

pub use self::file_log::JsonlEventLog;
pub use self::inmem_log::InMemoryEventLog;
