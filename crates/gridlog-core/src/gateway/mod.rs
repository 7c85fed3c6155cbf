//! Remote gateway contracts and their HTTP/S3 implementations.

mod blob;
mod record;

pub use blob::{BlobGateway, S3BlobGateway, S3Config};
pub use record::{HttpRecordGateway, RecordGateway, RecordsApiConfig};
