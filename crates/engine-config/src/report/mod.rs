pub mod finding;
pub mod mapping;
pub mod preview;
