pub mod core;
pub mod error;
pub mod job;
pub mod mapping;
pub mod records;
