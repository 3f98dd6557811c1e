//! Shared service wrappers used across clients.

mod local_data;

pub use local_data::LocalDataService;
