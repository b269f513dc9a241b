pub mod error;
pub mod import;
pub mod preview;
pub mod transform;
