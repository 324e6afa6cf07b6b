//! Upload of finished recordings to the media ingestion endpoint.

mod client;
mod http;

pub use client::{IngestTransport, UploadAck, UploadClient, UploadError, UploadPayload};
pub use http::HttpIngestTransport;
