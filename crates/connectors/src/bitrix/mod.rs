pub mod client;
pub mod fields;
pub mod filter;

pub use client::BitrixClient;
pub use fields::BitrixFieldCache;
pub use filter::FilterFields;
