//! Storage module for issue photos
//!
//! Provides a MinIO/S3-compatible client for uploads, deletes and public URLs.

mod minio_client;
mod sigv4;

pub use minio_client::MinIOClient;
