pub mod env;
pub mod error;
pub mod mapping_table;
pub mod report;
pub mod settings;
