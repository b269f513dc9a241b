pub mod actor;
pub mod controller;
pub mod error;
pub mod reconcile;
