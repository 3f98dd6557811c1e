//! Database layer for Purse

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LibSqlRecordRepository, RecordKey};
