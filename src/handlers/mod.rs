pub mod api;
pub mod executor;
