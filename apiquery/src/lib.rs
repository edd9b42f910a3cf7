pub mod app;
pub mod core;
pub mod data;
pub mod query;
