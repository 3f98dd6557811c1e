pub mod backup;
pub mod common;
pub mod config;
pub mod expense;
pub mod goal;
pub mod limit;
pub mod target;
