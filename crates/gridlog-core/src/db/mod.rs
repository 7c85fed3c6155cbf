//! Durable local queue layer for Gridlog

mod connection;
mod migrations;
mod photo_queue;
mod reading_queue;

pub use connection::Database;
pub use photo_queue::LibSqlPhotoQueue;
pub use reading_queue::LibSqlReadingQueue;
