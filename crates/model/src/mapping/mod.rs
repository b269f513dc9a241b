pub mod field;
pub mod registry;
