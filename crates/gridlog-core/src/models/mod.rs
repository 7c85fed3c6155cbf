//! Data models for Gridlog

mod pending;
mod photo;
mod reading;

pub use pending::{PendingReading, TempId};
pub use photo::{decode_photo_content, encode_photo_content, QueuedPhoto, PENDING_READING_ID};
pub use reading::{
    Activity, CustomerAccess, Phase, Reading, ReadingStatus, TariffClass,
};
