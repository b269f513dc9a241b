pub mod engine;
pub mod issue;
pub mod record;
pub mod validation;
