pub mod bitrix;
pub mod error;
pub mod local;
